//! Staff and parent accounts: one row per account tagged with its role, plus
//! a profile row created alongside it.

use crate::db::now_rfc3339;
use crate::error::{conflict, Result, ResultsError};
use rusqlite::{Connection, ErrorCode, OptionalExtension};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    Teacher,
    HeadTeacher,
    Bursar,
    Secretary,
    Academic,
    Parent,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::Teacher => "teacher",
            Self::HeadTeacher => "head_teacher",
            Self::Bursar => "bursar",
            Self::Secretary => "secretary",
            Self::Academic => "academic",
            Self::Parent => "parent",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "admin" => Some(Self::Admin),
            "teacher" => Some(Self::Teacher),
            "head_teacher" => Some(Self::HeadTeacher),
            "bursar" => Some(Self::Bursar),
            "secretary" => Some(Self::Secretary),
            "academic" => Some(Self::Academic),
            "parent" => Some(Self::Parent),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub phone: Option<String>,
    pub email: Option<String>,
    #[serde(default)]
    pub bio: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    pub id: String,
    pub username: String,
    pub display_name: String,
    pub role: Role,
    pub created_at: String,
    pub profile: Profile,
}

fn is_unique_violation(e: &rusqlite::Error) -> bool {
    matches!(
        e,
        rusqlite::Error::SqliteFailure(err, _) if err.code == ErrorCode::ConstraintViolation
    )
}

/// Inserts the account and its profile in one transaction.
pub fn create_account_with_profile(
    conn: &Connection,
    username: &str,
    display_name: &str,
    role: Role,
    profile: &Profile,
) -> Result<Account> {
    let username = username.trim();
    let id = Uuid::new_v4().to_string();
    let created_at = now_rfc3339();

    let tx = conn.unchecked_transaction()?;
    if let Err(e) = tx.execute(
        "INSERT INTO accounts(id, username, display_name, role, created_at)
         VALUES(?, ?, ?, ?, ?)",
        (&id, username, display_name, role.as_str(), &created_at),
    ) {
        return Err(if is_unique_violation(&e) {
            ResultsError::DuplicateAccount(username.to_string())
        } else {
            conflict(e)
        });
    }
    tx.execute(
        "INSERT INTO account_profiles(account_id, phone, email, bio) VALUES(?, ?, ?, ?)",
        (&id, profile.phone.as_deref(), profile.email.as_deref(), &profile.bio),
    )
    .map_err(conflict)?;
    tx.commit().map_err(conflict)?;

    Ok(Account {
        id,
        username: username.to_string(),
        display_name: display_name.to_string(),
        role,
        created_at,
        profile: profile.clone(),
    })
}

const ACCOUNT_SELECT: &str = "SELECT a.id, a.username, a.display_name, a.role, a.created_at,
        p.phone, p.email, COALESCE(p.bio, '')
     FROM accounts a
     LEFT JOIN account_profiles p ON p.account_id = a.id";

fn account_from_row(r: &rusqlite::Row<'_>) -> rusqlite::Result<Account> {
    let role: String = r.get(3)?;
    let role = Role::parse(&role).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            3,
            rusqlite::types::Type::Text,
            format!("unknown role {role}").into(),
        )
    })?;
    Ok(Account {
        id: r.get(0)?,
        username: r.get(1)?,
        display_name: r.get(2)?,
        role,
        created_at: r.get(4)?,
        profile: Profile {
            phone: r.get(5)?,
            email: r.get(6)?,
            bio: r.get(7)?,
        },
    })
}

pub fn get_account(conn: &Connection, username: &str) -> Result<Option<Account>> {
    Ok(conn
        .query_row(
            &format!("{ACCOUNT_SELECT} WHERE a.username = ?"),
            [username],
            account_from_row,
        )
        .optional()?)
}

/// Accounts ordered by username, optionally restricted to one role.
pub fn list_accounts(conn: &Connection, role: Option<Role>) -> Result<Vec<Account>> {
    let mut out = Vec::new();
    match role {
        Some(role) => {
            let mut stmt = conn.prepare(&format!(
                "{ACCOUNT_SELECT} WHERE a.role = ? ORDER BY a.username"
            ))?;
            for row in stmt.query_map([role.as_str()], account_from_row)? {
                out.push(row?);
            }
        }
        None => {
            let mut stmt = conn.prepare(&format!("{ACCOUNT_SELECT} ORDER BY a.username"))?;
            for row in stmt.query_map([], account_from_row)? {
                out.push(row?);
            }
        }
    }
    Ok(out)
}

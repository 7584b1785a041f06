//! CRUD operations for [`Account`] records and sign-in tokens.

use chrono::{DateTime, Utc};
use hearth_shared::UserId;
use rusqlite::{params, OptionalExtension};

use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::models::Account;

const ACCOUNT_COLUMNS: &str =
    "uid, email, display_name, password_salt, password_hash, is_anonymous, created_at";

impl Database {
    // ------------------------------------------------------------------
    // Create
    // ------------------------------------------------------------------

    /// Insert a new account.  Returns `false` if the uid or email is taken.
    pub fn create_account(&self, account: &Account) -> Result<bool> {
        let affected = self.conn().execute(
            "INSERT OR IGNORE INTO accounts
                (uid, email, display_name, password_salt, password_hash, is_anonymous, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                account.uid.as_str(),
                account.email,
                account.display_name,
                account.password_salt,
                account.password_hash,
                account.is_anonymous,
                account.created_at.to_rfc3339(),
            ],
        )?;
        Ok(affected > 0)
    }

    /// Record a sign-in token for `uid`.
    pub fn store_auth_token(&self, token: &str, uid: &UserId) -> Result<()> {
        self.conn().execute(
            "INSERT INTO auth_tokens (token, uid, issued_at) VALUES (?1, ?2, ?3)",
            params![token, uid.as_str(), Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Read
    // ------------------------------------------------------------------

    /// Fetch an account by uid.
    pub fn find_account(&self, uid: &UserId) -> Result<Account> {
        self.conn()
            .query_row(
                &format!("SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE uid = ?1"),
                params![uid.as_str()],
                row_to_account,
            )
            .map_err(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => StoreError::NotFound,
                other => StoreError::Sqlite(other),
            })
    }

    /// Fetch an account by (case-insensitive) email.
    pub fn find_account_by_email(&self, email: &str) -> Result<Option<Account>> {
        let account = self
            .conn()
            .query_row(
                &format!(
                    "SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE email = ?1 COLLATE NOCASE"
                ),
                params![email],
                row_to_account,
            )
            .optional()?;
        Ok(account)
    }

    /// Resolve a sign-in token to its account.
    pub fn account_for_token(&self, token: &str) -> Result<Option<Account>> {
        let uid: Option<String> = self
            .conn()
            .query_row(
                "SELECT uid FROM auth_tokens WHERE token = ?1",
                params![token],
                |row| row.get(0),
            )
            .optional()?;

        match uid {
            Some(uid) => self.find_account(&UserId(uid)).map(Some),
            None => Ok(None),
        }
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Map a `rusqlite::Row` to an [`Account`].
fn row_to_account(row: &rusqlite::Row<'_>) -> rusqlite::Result<Account> {
    let created_str: String = row.get(6)?;
    let created_at: DateTime<Utc> = DateTime::parse_from_rfc3339(&created_str)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(6, rusqlite::types::Type::Text, Box::new(e))
        })?;

    Ok(Account {
        uid: UserId(row.get(0)?),
        email: row.get(1)?,
        display_name: row.get(2)?,
        password_salt: row.get(3)?,
        password_hash: row.get(4)?,
        is_anonymous: row.get(5)?,
        created_at,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn account(uid: &str, email: Option<&str>) -> Account {
        Account {
            uid: UserId::from(uid),
            email: email.map(str::to_string),
            display_name: Some("Alpha".into()),
            password_salt: Some("00".into()),
            password_hash: Some("11".into()),
            is_anonymous: email.is_none(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn create_and_find() {
        let db = Database::open_in_memory().unwrap();
        assert!(db.create_account(&account("u1", Some("a@example.com"))).unwrap());

        let found = db.find_account_by_email("A@Example.com").unwrap().unwrap();
        assert_eq!(found.uid, UserId::from("u1"));
        assert_eq!(db.find_account(&found.uid).unwrap().email, found.email);
    }

    #[test]
    fn duplicate_email_is_refused() {
        let db = Database::open_in_memory().unwrap();
        assert!(db.create_account(&account("u1", Some("a@example.com"))).unwrap());
        assert!(!db.create_account(&account("u2", Some("a@example.com"))).unwrap());
    }

    #[test]
    fn anonymous_accounts_do_not_collide() {
        let db = Database::open_in_memory().unwrap();
        assert!(db.create_account(&account("u1", None)).unwrap());
        assert!(db.create_account(&account("u2", None)).unwrap());
    }

    #[test]
    fn tokens_resolve_to_accounts() {
        let db = Database::open_in_memory().unwrap();
        db.create_account(&account("u1", Some("a@example.com"))).unwrap();
        db.store_auth_token("tok", &UserId::from("u1")).unwrap();

        let found = db.account_for_token("tok").unwrap().unwrap();
        assert_eq!(found.uid, UserId::from("u1"));
        assert!(db.account_for_token("nope").unwrap().is_none());
    }

    #[test]
    fn missing_account_is_not_found() {
        let db = Database::open_in_memory().unwrap();
        assert!(matches!(
            db.find_account(&UserId::from("ghost")),
            Err(StoreError::NotFound)
        ));
    }
}

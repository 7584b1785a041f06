//! Identity provider.
//!
//! [`IdentityProvider`] is the authentication contract the rest of the client
//! depends on.  [`LocalIdentity`] implements it on top of the local store's
//! account tables, which is enough for development and self-contained
//! deployments; a hosted provider can replace it behind the same trait.

use async_trait::async_trait;
use chrono::Utc;
use hearth_shared::constants::{KDF_CONTEXT_PASSWORD, MIN_PASSWORD_LEN};
use hearth_shared::UserId;
use hearth_store::{Account, Database, StoreError};
use rand::RngCore;
use serde::Serialize;
use thiserror::Error;
use tokio::sync::watch;
use tracing::info;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("Email already in use")]
    EmailInUse,

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Password too weak")]
    WeakPassword,

    #[error("Authentication failed: {0}")]
    Unknown(String),
}

impl AuthError {
    /// Text shown next to the sign-in / sign-up form.
    pub fn user_message(&self) -> String {
        match self {
            AuthError::EmailInUse => "This email is already registered.".to_string(),
            AuthError::InvalidCredentials => "Invalid email or password.".to_string(),
            AuthError::WeakPassword => {
                format!("Password must be at least {MIN_PASSWORD_LEN} characters.")
            }
            AuthError::Unknown(reason) => format!("Authentication failed: {reason}"),
        }
    }
}

impl From<StoreError> for AuthError {
    fn from(e: StoreError) -> Self {
        AuthError::Unknown(e.to_string())
    }
}

/// The authenticated user as reported by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthUser {
    pub uid: UserId,
    pub display_name: Option<String>,
    pub is_anonymous: bool,
}

impl AuthUser {
    /// Name shown to other users.
    pub fn username(&self) -> String {
        match &self.display_name {
            Some(name) if !name.trim().is_empty() => name.trim().to_string(),
            _ => format!("Guest-{}", self.uid.short()),
        }
    }
}

impl From<&Account> for AuthUser {
    fn from(account: &Account) -> Self {
        Self {
            uid: account.uid.clone(),
            display_name: account.display_name.clone(),
            is_anonymous: account.is_anonymous,
        }
    }
}

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn register(
        &self,
        email: &str,
        password: &str,
        display_name: &str,
    ) -> Result<AuthUser, AuthError>;

    async fn sign_in(&self, email: &str, password: &str) -> Result<AuthUser, AuthError>;

    async fn sign_in_with_token(&self, token: &str) -> Result<AuthUser, AuthError>;

    async fn sign_in_anonymously(&self) -> Result<AuthUser, AuthError>;

    async fn sign_out(&self) -> Result<(), AuthError>;

    fn current_user(&self) -> Option<AuthUser>;

    /// Sign-in / sign-out transitions.  The receiver always holds the
    /// current state; `None` means signed out.
    fn watch(&self) -> watch::Receiver<Option<AuthUser>>;
}

/// Identity provider backed by the local database.
pub struct LocalIdentity {
    db: Database,
    current: watch::Sender<Option<AuthUser>>,
}

impl LocalIdentity {
    pub fn new(db: Database) -> Self {
        let (current, _) = watch::channel(None);
        Self { db, current }
    }

    /// Issue a token that [`IdentityProvider::sign_in_with_token`] accepts
    /// for the currently signed-in user.
    pub fn issue_token(&self) -> Result<String, AuthError> {
        let user = self
            .current_user()
            .ok_or_else(|| AuthError::Unknown("not signed in".into()))?;

        let mut bytes = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut bytes);
        let token = hex::encode(bytes);

        self.db.store_auth_token(&token, &user.uid)?;
        Ok(token)
    }

    fn set_current(&self, user: Option<AuthUser>) {
        self.current.send_replace(user);
    }
}

#[async_trait]
impl IdentityProvider for LocalIdentity {
    async fn register(
        &self,
        email: &str,
        password: &str,
        display_name: &str,
    ) -> Result<AuthUser, AuthError> {
        let email = normalize_email(email)?;
        if password.chars().count() < MIN_PASSWORD_LEN {
            return Err(AuthError::WeakPassword);
        }

        let display_name = match display_name.trim() {
            "" => email.split('@').next().unwrap_or_default().to_string(),
            name => name.to_string(),
        };

        let salt = random_salt();
        let account = Account {
            uid: UserId::generate(),
            email: Some(email.clone()),
            display_name: Some(display_name),
            password_hash: Some(hash_password(&salt, password).to_hex().to_string()),
            password_salt: Some(salt),
            is_anonymous: false,
            created_at: Utc::now(),
        };

        if self.db.find_account_by_email(&email)?.is_some() || !self.db.create_account(&account)? {
            return Err(AuthError::EmailInUse);
        }

        let user = AuthUser::from(&account);
        info!(uid = %user.uid, "Account registered");
        self.set_current(Some(user.clone()));
        Ok(user)
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<AuthUser, AuthError> {
        let email = normalize_email(email)?;
        let account = self
            .db
            .find_account_by_email(&email)?
            .ok_or(AuthError::InvalidCredentials)?;

        let (Some(salt), Some(stored)) = (&account.password_salt, &account.password_hash) else {
            return Err(AuthError::InvalidCredentials);
        };
        let stored = blake3::Hash::from_hex(stored).map_err(|_| AuthError::InvalidCredentials)?;

        // blake3::Hash equality is constant-time.
        if hash_password(salt, password) != stored {
            return Err(AuthError::InvalidCredentials);
        }

        let user = AuthUser::from(&account);
        info!(uid = %user.uid, "Signed in");
        self.set_current(Some(user.clone()));
        Ok(user)
    }

    async fn sign_in_with_token(&self, token: &str) -> Result<AuthUser, AuthError> {
        let account = self
            .db
            .account_for_token(token.trim())?
            .ok_or(AuthError::InvalidCredentials)?;

        let user = AuthUser::from(&account);
        info!(uid = %user.uid, "Signed in with token");
        self.set_current(Some(user.clone()));
        Ok(user)
    }

    async fn sign_in_anonymously(&self) -> Result<AuthUser, AuthError> {
        let account = Account {
            uid: UserId::generate(),
            email: None,
            display_name: None,
            password_salt: None,
            password_hash: None,
            is_anonymous: true,
            created_at: Utc::now(),
        };
        if !self.db.create_account(&account)? {
            return Err(AuthError::Unknown("could not allocate a guest account".into()));
        }

        let user = AuthUser::from(&account);
        info!(uid = %user.uid, "Signed in anonymously");
        self.set_current(Some(user.clone()));
        Ok(user)
    }

    async fn sign_out(&self) -> Result<(), AuthError> {
        if let Some(user) = self.current_user() {
            info!(uid = %user.uid, "Signed out");
        }
        self.set_current(None);
        Ok(())
    }

    fn current_user(&self) -> Option<AuthUser> {
        self.current.borrow().clone()
    }

    fn watch(&self) -> watch::Receiver<Option<AuthUser>> {
        self.current.subscribe()
    }
}

fn normalize_email(email: &str) -> Result<String, AuthError> {
    let email = email.trim().to_lowercase();
    match email.split_once('@') {
        Some((local, domain))
            if !local.is_empty() && !domain.is_empty() && !domain.contains('@') =>
        {
            Ok(email)
        }
        _ => Err(AuthError::InvalidCredentials),
    }
}

fn random_salt() -> String {
    let mut salt = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut salt);
    hex::encode(salt)
}

fn hash_password(salt_hex: &str, password: &str) -> blake3::Hash {
    let mut hasher = blake3::Hasher::new_derive_key(KDF_CONTEXT_PASSWORD);
    hasher.update(salt_hex.as_bytes());
    hasher.update(password.as_bytes());
    hasher.finalize()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider() -> LocalIdentity {
        LocalIdentity::new(Database::open_in_memory().unwrap())
    }

    #[tokio::test]
    async fn register_then_sign_in() {
        let auth = provider();
        let registered = auth
            .register("Alpha@Example.com", "hunter22", "Alpha")
            .await
            .unwrap();
        assert_eq!(registered.display_name.as_deref(), Some("Alpha"));
        assert!(!registered.is_anonymous);

        auth.sign_out().await.unwrap();
        assert!(auth.current_user().is_none());

        let signed_in = auth.sign_in("alpha@example.com", "hunter22").await.unwrap();
        assert_eq!(signed_in.uid, registered.uid);
        assert_eq!(auth.current_user(), Some(signed_in));
    }

    #[tokio::test]
    async fn register_errors() {
        let auth = provider();
        assert_eq!(
            auth.register("a@example.com", "short", "A").await,
            Err(AuthError::WeakPassword)
        );
        assert_eq!(
            auth.register("not-an-email", "longenough", "A").await,
            Err(AuthError::InvalidCredentials)
        );

        auth.register("a@example.com", "longenough", "A").await.unwrap();
        assert_eq!(
            auth.register("A@example.com", "longenough", "B").await,
            Err(AuthError::EmailInUse)
        );
    }

    #[tokio::test]
    async fn wrong_password_is_rejected() {
        let auth = provider();
        auth.register("a@example.com", "longenough", "A").await.unwrap();
        auth.sign_out().await.unwrap();

        assert_eq!(
            auth.sign_in("a@example.com", "wrongpass").await,
            Err(AuthError::InvalidCredentials)
        );
        assert_eq!(
            auth.sign_in("b@example.com", "longenough").await,
            Err(AuthError::InvalidCredentials)
        );
        assert!(auth.current_user().is_none());
    }

    #[tokio::test]
    async fn token_round_trip() {
        let auth = provider();
        let user = auth.register("a@example.com", "longenough", "A").await.unwrap();
        let token = auth.issue_token().unwrap();
        auth.sign_out().await.unwrap();

        let again = auth.sign_in_with_token(&token).await.unwrap();
        assert_eq!(again.uid, user.uid);
        assert_eq!(
            auth.sign_in_with_token("bogus").await,
            Err(AuthError::InvalidCredentials)
        );
    }

    #[tokio::test]
    async fn anonymous_users_get_guest_names() {
        let auth = provider();
        let guest = auth.sign_in_anonymously().await.unwrap();
        assert!(guest.is_anonymous);
        assert!(guest.username().starts_with("Guest-"));
    }

    #[tokio::test]
    async fn watch_reports_transitions() {
        let auth = provider();
        let mut rx = auth.watch();
        assert!(rx.borrow().is_none());

        let user = auth.register("a@example.com", "longenough", "A").await.unwrap();
        rx.changed().await.unwrap();
        assert_eq!(rx.borrow().as_ref(), Some(&user));

        auth.sign_out().await.unwrap();
        rx.changed().await.unwrap();
        assert!(rx.borrow().is_none());
    }

    #[test]
    fn user_messages_are_readable() {
        assert_eq!(
            AuthError::WeakPassword.user_message(),
            "Password must be at least 6 characters."
        );
    }
}

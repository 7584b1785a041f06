//! Application context.
//!
//! [`AppContext`] holds every long-lived handle the client needs: the
//! document store, the identity provider, the user directory, the optional
//! GIF source, the configuration and the event bus.  It is constructed once,
//! shared by `Arc`, and is the only way to reach those handles.

use std::sync::Arc;

use tracing::{debug, info, warn};

use hearth_shared::CurrentUser;
use hearth_store::{
    to_body, Database, DirectoryEntry, DocumentStore, Paths, UserProfile, UserStatus,
};

use crate::commands::created_or_kept;
use crate::config::ClientConfig;
use crate::directory::{StoreDirectory, UserDirectory};
use crate::error::{ClientError, Result};
use crate::events::{ClientEvent, EventBus};
use crate::gif::{GifClient, GifError, GifSource};
use crate::identity::{AuthUser, IdentityProvider, LocalIdentity};
use crate::session::ChatSession;

pub struct AppContext {
    config: ClientConfig,
    paths: Paths,
    store: Arc<dyn DocumentStore>,
    identity: Arc<dyn IdentityProvider>,
    directory: Arc<dyn UserDirectory>,
    gifs: Option<Arc<dyn GifSource>>,
    events: EventBus,
}

impl AppContext {
    pub fn new(
        config: ClientConfig,
        store: Arc<dyn DocumentStore>,
        identity: Arc<dyn IdentityProvider>,
        directory: Arc<dyn UserDirectory>,
        gifs: Option<Arc<dyn GifSource>>,
    ) -> Arc<Self> {
        let paths = Paths::new(config.app_id.as_str());
        Arc::new(Self {
            config,
            paths,
            store,
            identity,
            directory,
            gifs,
            events: EventBus::new(),
        })
    }

    /// Open the local database named by the configuration and build the
    /// local identity provider and directory on top of it.
    pub fn open(config: ClientConfig) -> Result<Arc<Self>> {
        let db = match &config.database_path {
            Some(path) => Database::open_at(path)?,
            None => Database::new()?,
        };
        Ok(Self::local(config, db))
    }

    /// Build a context over an already open database.
    pub fn local(config: ClientConfig, db: Database) -> Arc<Self> {
        let gifs: Option<Arc<dyn GifSource>> = match GifClient::from_config(&config) {
            Ok(client) => Some(Arc::new(client)),
            Err(GifError::MissingApiKey) => {
                info!("No GIF API key configured, GIF search disabled");
                None
            }
            Err(e) => {
                warn!(error = %e, "GIF client unavailable");
                None
            }
        };

        let paths = Paths::new(config.app_id.as_str());
        let store: Arc<dyn DocumentStore> = Arc::new(db.clone());
        let identity = Arc::new(LocalIdentity::new(db));
        let directory = Arc::new(StoreDirectory::new(store.clone(), paths));
        Self::new(config, store, identity, directory, gifs)
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn paths(&self) -> &Paths {
        &self.paths
    }

    pub fn store(&self) -> Arc<dyn DocumentStore> {
        self.store.clone()
    }

    pub fn identity(&self) -> Arc<dyn IdentityProvider> {
        self.identity.clone()
    }

    pub fn directory(&self) -> Arc<dyn UserDirectory> {
        self.directory.clone()
    }

    pub fn gifs(&self) -> Option<Arc<dyn GifSource>> {
        self.gifs.clone()
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    // ------------------------------------------------------------------
    // Authentication
    // ------------------------------------------------------------------

    /// Create an account, publish its profile and directory entry, and
    /// start a session.
    ///
    /// If publishing fails the identity is signed out again; signing in
    /// later completes the profile.
    pub async fn register(
        self: &Arc<Self>,
        email: &str,
        password: &str,
        username: &str,
    ) -> Result<ChatSession> {
        let username = username.trim();
        if username.is_empty() {
            return Err(ClientError::validation("Username cannot be empty."));
        }

        let user = self.identity.register(email, password, username).await?;
        self.enter(user, Some(email)).await
    }

    pub async fn sign_in(self: &Arc<Self>, email: &str, password: &str) -> Result<ChatSession> {
        let user = self.identity.sign_in(email, password).await?;
        self.enter(user, Some(email)).await
    }

    pub async fn sign_in_with_token(self: &Arc<Self>, token: &str) -> Result<ChatSession> {
        let user = self.identity.sign_in_with_token(token).await?;
        self.enter(user, None).await
    }

    /// Sign in anonymously.  Guests are listed in the directory under their
    /// generated name so they can be added as friends.
    pub async fn guest(self: &Arc<Self>) -> Result<ChatSession> {
        let user = self.identity.sign_in_anonymously().await?;
        self.enter(user, None).await
    }

    /// Re-enter a session for the user the identity provider already has
    /// signed in.
    pub async fn resume(self: &Arc<Self>) -> Result<ChatSession> {
        let user = self
            .identity
            .current_user()
            .ok_or(ClientError::NotSignedIn)?;
        self.enter(user, None).await
    }

    /// Make sure the user's profile and directory entry exist, then start
    /// the session.  On failure the user is left signed out.
    async fn enter(self: &Arc<Self>, user: AuthUser, email: Option<&str>) -> Result<ChatSession> {
        let email = email.map(|e| e.trim().to_lowercase());
        if let Err(e) = self.ensure_profile(&user, email).await {
            warn!(uid = %user.uid, error = %e, "Profile unavailable, signing out");
            if let Err(sign_out) = self.identity.sign_out().await {
                warn!(error = %sign_out, "Sign-out after failed profile write failed");
            }
            return Err(e);
        }
        self.start(user)
    }

    /// Create the profile and directory entry if missing.  Existing records
    /// are left untouched.
    async fn ensure_profile(&self, user: &AuthUser, email: Option<String>) -> Result<()> {
        let profile = UserProfile {
            uid: user.uid.clone(),
            username: user.username(),
            email,
            status: UserStatus::Online,
        };
        let path = self.paths.profile(&user.uid);
        if created_or_kept(self.store.create(&path, to_body(&profile)?).await)? {
            debug!(uid = %user.uid, "Profile created");
        }

        if self.directory.lookup(&user.uid).await?.is_none() {
            self.directory
                .publish(&DirectoryEntry::new(user.uid.clone(), user.username()))
                .await?;
        }
        Ok(())
    }

    fn start(self: &Arc<Self>, user: AuthUser) -> Result<ChatSession> {
        let me = CurrentUser::new(user.uid.as_str(), user.username());
        info!(uid = %me.uid, username = %me.username, "Session started");
        self.events.emit(ClientEvent::AuthChanged(Some(user)));
        ChatSession::start(self.clone(), me)
    }
}

//! Local account and session management
//!
//! Accounts live entirely on the device: a users table and a
//! current-session pointer, both JSON records in the key-value store.
//! Passwords are stored as argon2 hashes, never plaintext. The in-memory
//! session is hydrated from the persisted pointer by [`AuthService::init`]
//! and survives app restarts until an explicit logout.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use storage::{SharedStore, StorageError};
use thiserror::Error;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::progress::ProgressRepository;
use crate::repository::{RepositoryError, AUTH_USERS_KEY, SESSION_KEY};

/// Authentication error types
#[derive(Debug, Error)]
pub enum AuthError {
    /// Repository read/write failure
    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),

    /// Password hashing or verification machinery failed
    #[error("Password hashing error: {0}")]
    PasswordHash(String),

    /// An account with this email already exists
    #[error("Email already registered: {0}")]
    EmailTaken(String),

    /// Unknown email or wrong password
    ///
    /// One variant for both cases, so a caller cannot probe which emails
    /// have accounts.
    #[error("Invalid email or password")]
    InvalidCredentials,
}

impl From<StorageError> for AuthError {
    fn from(e: StorageError) -> Self {
        Self::Repository(RepositoryError::Storage(e))
    }
}

impl From<serde_json::Error> for AuthError {
    fn from(e: serde_json::Error) -> Self {
        Self::Repository(RepositoryError::Serialization(e))
    }
}

/// Result type for auth operations
pub type Result<T> = std::result::Result<T, AuthError>;

/// A stored account record, including the password hash
///
/// Never leaves this module; callers see [`LocalUser`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LocalAuthUser {
    id: String,
    username: String,
    email: String,
    password_hash: String,
    created_at: DateTime<Utc>,
}

/// The signed-in identity exposed to the rest of the app
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalUser {
    /// Unique user id
    pub id: String,
    /// Display name
    pub username: String,
    /// Registered email; synthetic for guests
    pub email: String,
    /// Whether this is an ephemeral guest identity
    #[serde(default)]
    pub is_guest: bool,
}

/// Local authentication and session service
pub struct AuthService {
    store: SharedStore,
    progress: ProgressRepository,
    session: RwLock<Option<LocalUser>>,
}

impl AuthService {
    /// Create a service over the given store
    ///
    /// The in-memory session starts empty; call [`init`](Self::init) to
    /// hydrate it from the persisted pointer.
    pub fn new(store: SharedStore) -> Self {
        Self {
            progress: ProgressRepository::new(store.clone()),
            store,
            session: RwLock::new(None),
        }
    }

    /// Hydrate the in-memory session from the persisted pointer
    ///
    /// Returns the restored user, if any. An unreadable pointer is
    /// discarded rather than blocking startup.
    pub async fn init(&self) -> Result<Option<LocalUser>> {
        let user = match self.store.get(SESSION_KEY).await? {
            Some(json) => match serde_json::from_str::<LocalUser>(&json) {
                Ok(user) => Some(user),
                Err(e) => {
                    tracing::warn!(error = %e, "discarding unreadable session pointer");
                    self.store.remove(SESSION_KEY).await?;
                    None
                }
            },
            None => None,
        };

        *self.session.write().await = user.clone();
        if let Some(ref u) = user {
            tracing::debug!(user_id = %u.id, "restored session");
        }
        Ok(user)
    }

    /// Drop the in-memory session state at app shutdown
    ///
    /// The persisted pointer is left in place, so the next
    /// [`init`](Self::init) restores the same session.
    pub async fn teardown(&self) {
        *self.session.write().await = None;
        tracing::debug!("auth session torn down");
    }

    /// Create an account and sign it in
    ///
    /// Rejects an email that already has an account. On success a
    /// zero-valued progress record is created for the new user.
    pub async fn register(&self, username: &str, email: &str, password: &str) -> Result<LocalUser> {
        let _guard = self.store.lock(AUTH_USERS_KEY).await;

        let mut users = self.read_users().await?;
        if users.iter().any(|u| u.email == email) {
            return Err(AuthError::EmailTaken(email.to_string()));
        }

        let record = LocalAuthUser {
            id: Uuid::new_v4().to_string(),
            username: username.to_string(),
            email: email.to_string(),
            password_hash: hash_password(password)?,
            created_at: Utc::now(),
        };
        users.push(record.clone());
        self.write_users(&users).await?;

        self.progress
            .create_default(&record.id, username, email)
            .await?;

        let user = LocalUser {
            id: record.id,
            username: record.username,
            email: record.email,
            is_guest: false,
        };
        self.set_session(user.clone()).await?;
        tracing::info!(user_id = %user.id, "registered local account");
        Ok(user)
    }

    /// Sign in with email and password
    ///
    /// The single progress slot may belong to whoever signed in last; when
    /// no record for this user is resident, a zero-valued one is created.
    /// A resident record for this user is left untouched.
    pub async fn login(&self, email: &str, password: &str) -> Result<LocalUser> {
        let users = self.read_users().await?;
        let Some(record) = users.iter().find(|u| u.email == email) else {
            return Err(AuthError::InvalidCredentials);
        };

        if !verify_password(password, &record.password_hash)? {
            return Err(AuthError::InvalidCredentials);
        }

        if self.progress.load(&record.id).await?.is_none() {
            self.progress
                .create_default(&record.id, &record.username, &record.email)
                .await?;
        }

        let user = LocalUser {
            id: record.id.clone(),
            username: record.username.clone(),
            email: record.email.clone(),
            is_guest: false,
        };
        self.set_session(user.clone()).await?;
        tracing::info!(user_id = %user.id, "logged in");
        Ok(user)
    }

    /// Sign in as an ephemeral guest
    ///
    /// No account record is created; every call produces a fresh identity
    /// with its own zero-valued progress record.
    pub async fn login_as_guest(&self) -> Result<LocalUser> {
        let id = format!("guest-{}", Uuid::new_v4());
        let email = format!("{id}@local");
        let user = LocalUser {
            id: id.clone(),
            username: "Guest".to_string(),
            email: email.clone(),
            is_guest: true,
        };

        self.progress.create_default(&id, "Guest", &email).await?;
        self.set_session(user.clone()).await?;
        tracing::info!(user_id = %user.id, "logged in as guest");
        Ok(user)
    }

    /// Sign out, clearing both the in-memory and persisted session
    pub async fn logout(&self) -> Result<()> {
        *self.session.write().await = None;
        self.store.remove(SESSION_KEY).await?;
        tracing::info!("logged out");
        Ok(())
    }

    /// The currently signed-in user, if any
    pub async fn current_user(&self) -> Option<LocalUser> {
        self.session.read().await.clone()
    }

    /// Whether a session is active
    pub async fn is_authenticated(&self) -> bool {
        self.session.read().await.is_some()
    }

    async fn set_session(&self, user: LocalUser) -> Result<()> {
        let json = serde_json::to_string(&user)?;
        self.store.set(SESSION_KEY, &json).await?;
        *self.session.write().await = Some(user);
        Ok(())
    }

    async fn read_users(&self) -> Result<Vec<LocalAuthUser>> {
        match self.store.get(AUTH_USERS_KEY).await? {
            Some(json) => Ok(serde_json::from_str(&json)?),
            None => Ok(Vec::new()),
        }
    }

    async fn write_users(&self, users: &[LocalAuthUser]) -> Result<()> {
        let json = serde_json::to_string(users)?;
        self.store.set(AUTH_USERS_KEY, &json).await?;
        Ok(())
    }
}

fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| AuthError::PasswordHash(e.to_string()))?;
    Ok(hash.to_string())
}

fn verify_password(password: &str, hash: &str) -> Result<bool> {
    let parsed = PasswordHash::new(hash).map_err(|e| AuthError::PasswordHash(e.to_string()))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}

//! In-memory authentication provider
//!
//! Passwords are stored as salted SHA-256 digests. Sessions are opaque
//! tokens with a fixed lifetime.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use sha2::{Digest, Sha256};
use tokio::sync::{broadcast, RwLock};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use crate::facade::{AuthEvent, AuthProvider, AuthSession, AuthUser};

/// Shortest accepted password
pub const MIN_PASSWORD_LEN: usize = 6;

const EVENT_CAPACITY: usize = 64;

#[derive(Debug, Clone)]
struct Credential {
    user: AuthUser,
    salt: String,
    password_hash: String,
}

fn hash_password(salt: &str, password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(password.as_bytes());
    hex::encode(hasher.finalize())
}

#[derive(Debug, Clone)]
pub struct MemoryAuth {
    /// Keyed by lowercase email
    credentials: Arc<RwLock<HashMap<String, Credential>>>,
    sessions: Arc<RwLock<HashMap<String, AuthSession>>>,
    session_ttl: Duration,
    events: broadcast::Sender<AuthEvent>,
}

impl Default for MemoryAuth {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryAuth {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            credentials: Arc::new(RwLock::new(HashMap::new())),
            sessions: Arc::new(RwLock::new(HashMap::new())),
            session_ttl: Duration::hours(1),
            events,
        }
    }

    pub fn with_session_ttl(mut self, ttl: Duration) -> Self {
        self.session_ttl = ttl;
        self
    }

    /// Number of live sessions
    pub async fn session_count(&self) -> usize {
        let now = Utc::now();
        self.sessions
            .read()
            .await
            .values()
            .filter(|s| !s.is_expired(now))
            .count()
    }
}

#[async_trait]
impl AuthProvider for MemoryAuth {
    async fn sign_in_with_password(&self, email: &str, password: &str) -> DbResult<AuthSession> {
        let key = email.trim().to_lowercase();
        let user = {
            let credentials = self.credentials.read().await;
            match credentials.get(&key) {
                Some(c) if hash_password(&c.salt, password) == c.password_hash => c.user.clone(),
                _ => {
                    warn!(email = %key, "Sign-in rejected");
                    return Err(DbError::Auth("Invalid login credentials".to_string()));
                }
            }
        };

        let session = AuthSession {
            access_token: format!("mem-{}", Uuid::new_v4().simple()),
            expires_at: Utc::now() + self.session_ttl,
            user,
        };
        {
            let mut sessions = self.sessions.write().await;
            let now = Utc::now();
            let before = sessions.len();
            sessions.retain(|_, s| !s.is_expired(now));
            if sessions.len() < before {
                debug!(count = before - sessions.len(), "Expired sessions pruned");
            }
            sessions.insert(session.access_token.clone(), session.clone());
        }
        info!(user_id = %session.user.id, "User signed in");
        // no subscribers is fine
        let _ = self.events.send(AuthEvent::SignedIn(session.clone()));
        Ok(session)
    }

    async fn sign_up(&self, email: &str, password: &str) -> DbResult<AuthUser> {
        let key = email.trim().to_lowercase();
        if !key.contains('@') {
            return Err(DbError::Auth(format!("Invalid email address: {}", email)));
        }
        if password.chars().count() < MIN_PASSWORD_LEN {
            return Err(DbError::Auth(format!(
                "Password should be at least {} characters",
                MIN_PASSWORD_LEN
            )));
        }

        let mut credentials = self.credentials.write().await;
        if credentials.contains_key(&key) {
            return Err(DbError::AlreadyExists(format!("user {}", key)));
        }
        let user = AuthUser {
            id: Uuid::new_v4(),
            email: key.clone(),
        };
        let salt = Uuid::new_v4().simple().to_string();
        credentials.insert(
            key,
            Credential {
                user: user.clone(),
                password_hash: hash_password(&salt, password),
                salt,
            },
        );
        debug!(user_id = %user.id, "User registered");
        Ok(user)
    }

    async fn get_session(&self, access_token: &str) -> DbResult<Option<AuthSession>> {
        {
            let sessions = self.sessions.read().await;
            match sessions.get(access_token) {
                None => return Ok(None),
                Some(s) if !s.is_expired(Utc::now()) => return Ok(Some(s.clone())),
                Some(_) => {}
            }
        }
        self.sessions.write().await.remove(access_token);
        debug!("Expired session dropped");
        Ok(None)
    }

    async fn get_user(&self, access_token: &str) -> DbResult<AuthUser> {
        self.get_session(access_token)
            .await?
            .map(|s| s.user)
            .ok_or_else(|| DbError::unauthorized("invalid or expired session"))
    }

    async fn sign_out(&self, access_token: &str) -> DbResult<()> {
        let removed = self.sessions.write().await.remove(access_token);
        if let Some(session) = removed {
            info!(user_id = %session.user.id, "User signed out");
            let _ = self.events.send(AuthEvent::SignedOut {
                user_id: session.user.id,
            });
        }
        Ok(())
    }

    fn on_auth_state_change(&self) -> broadcast::Receiver<AuthEvent> {
        self.events.subscribe()
    }
}

//! Session context
//!
//! Holds the signed-in user for one portal instance. The session token is
//! persisted through a [`SessionStore`] so a restart can restore it; a
//! restored token is always re-checked with the auth provider first.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::fs;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use hdims_core::{Collection, FrontendRole, Permission, UserProfile};
use hdims_db::{AuthEvent, AuthSession, Caller, Platform, Query};

use crate::error::{PortalError, PortalResult};

/// Where a session survives between runs
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn load(&self) -> PortalResult<Option<AuthSession>>;

    async fn save(&self, session: &AuthSession) -> PortalResult<()>;

    async fn clear(&self) -> PortalResult<()>;
}

/// Process-local session store
#[derive(Debug, Clone, Default)]
pub struct MemorySessionStore {
    session: Arc<RwLock<Option<AuthSession>>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn load(&self) -> PortalResult<Option<AuthSession>> {
        Ok(self.session.read().await.clone())
    }

    async fn save(&self, session: &AuthSession) -> PortalResult<()> {
        *self.session.write().await = Some(session.clone());
        Ok(())
    }

    async fn clear(&self) -> PortalResult<()> {
        *self.session.write().await = None;
        Ok(())
    }
}

/// Session kept as JSON in a single file
#[derive(Debug, Clone)]
pub struct FileSessionStore {
    path: PathBuf,
}

impl FileSessionStore {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl SessionStore for FileSessionStore {
    async fn load(&self) -> PortalResult<Option<AuthSession>> {
        let json = match fs::read_to_string(&self.path).await {
            Ok(json) => json,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        match serde_json::from_str(&json) {
            Ok(session) => Ok(Some(session)),
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Discarding unreadable session file");
                Ok(None)
            }
        }
    }

    async fn save(&self, session: &AuthSession) -> PortalResult<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).await?;
        }
        let json = serde_json::to_string_pretty(session)?;
        fs::write(&self.path, json).await?;
        Ok(())
    }

    async fn clear(&self) -> PortalResult<()> {
        match fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Signed-in user with their profile
#[derive(Debug, Clone, PartialEq)]
pub struct CurrentUser {
    pub session: AuthSession,
    pub profile: UserProfile,
}

impl CurrentUser {
    pub fn caller(&self) -> Caller {
        self.session.caller()
    }

    pub fn role(&self) -> FrontendRole {
        self.profile.frontend_role()
    }

    pub fn require(&self, permission: Permission) -> PortalResult<()> {
        if self.profile.can(permission) {
            Ok(())
        } else {
            Err(PortalError::forbidden(format!(
                "{} lacks permission {:?}",
                self.profile.role, permission
            )))
        }
    }
}

/// Session state of one portal instance
pub struct SessionContext {
    platform: Platform,
    store: Arc<dyn SessionStore>,
    current: Option<CurrentUser>,
}

impl SessionContext {
    pub fn new(platform: Platform, store: Arc<dyn SessionStore>) -> Self {
        Self {
            platform,
            store,
            current: None,
        }
    }

    pub fn platform(&self) -> &Platform {
        &self.platform
    }

    pub fn current(&self) -> Option<&CurrentUser> {
        self.current.as_ref()
    }

    /// The signed-in user, or [`PortalError::NotSignedIn`]
    pub fn user(&self) -> PortalResult<&CurrentUser> {
        self.current.as_ref().ok_or(PortalError::NotSignedIn)
    }

    /// Restore a persisted session
    ///
    /// The token must still be accepted by the auth provider and belong to
    /// an active profile; otherwise the persisted copy is dropped.
    pub async fn hydrate(&mut self) -> PortalResult<Option<&CurrentUser>> {
        self.current = None;
        let Some(saved) = self.store.load().await? else {
            return Ok(None);
        };

        let live = match self.platform.auth.get_session(&saved.access_token).await {
            Ok(Some(session)) if !session.is_expired(Utc::now()) => session,
            Ok(_) => {
                debug!(user_id = %saved.user.id, "Persisted session no longer valid");
                self.store.clear().await?;
                return Ok(None);
            }
            Err(e) => {
                warn!(error = %e, "Could not re-validate persisted session");
                return Err(e.into());
            }
        };

        match self.load_profile(&live).await {
            Ok(profile) => {
                self.current = Some(CurrentUser {
                    session: live,
                    profile,
                });
                Ok(self.current.as_ref())
            }
            Err(e) => {
                self.store.clear().await?;
                Err(e)
            }
        }
    }

    /// Password sign-in; inactive accounts are signed straight back out
    pub async fn sign_in(&mut self, email: &str, password: &str) -> PortalResult<&CurrentUser> {
        let session = self
            .platform
            .auth
            .sign_in_with_password(email, password)
            .await?;

        let profile = match self.load_profile(&session).await {
            Ok(profile) => profile,
            Err(e) => {
                if let Err(sign_out) = self.platform.auth.sign_out(&session.access_token).await {
                    warn!(error = %sign_out, "Sign-out after rejected sign-in failed");
                }
                return Err(e);
            }
        };

        self.store.save(&session).await?;
        info!(user_id = %profile.id, role = %profile.role, "Signed in");
        Ok(self.current.insert(CurrentUser { session, profile }))
    }

    /// Sign out and forget the session in memory and in storage
    pub async fn sign_out(&mut self) -> PortalResult<()> {
        if let Some(user) = self.current.take() {
            if let Err(e) = self.platform.auth.sign_out(&user.session.access_token).await {
                warn!(error = %e, "Remote sign-out failed; clearing local session anyway");
            }
            info!(user_id = %user.profile.id, "Signed out");
        }
        self.store.clear().await
    }

    /// React to an auth event broadcast by the provider
    ///
    /// A sign-out of the current user from elsewhere clears this context.
    pub async fn apply_event(&mut self, event: &AuthEvent) -> PortalResult<()> {
        if let AuthEvent::SignedOut { user_id } = event {
            if self.current.as_ref().map(|u| u.profile.id) == Some(*user_id) {
                self.current = None;
                self.store.clear().await?;
                debug!(user_id = %user_id, "Session ended elsewhere");
            }
        }
        Ok(())
    }

    async fn load_profile(&self, session: &AuthSession) -> PortalResult<UserProfile> {
        let row = self
            .platform
            .store
            .select(
                Collection::Profiles,
                &Query::new().eq("id", session.user.id.to_string()),
            )
            .await?
            .data
            .into_iter()
            .next()
            .ok_or_else(|| PortalError::ProfileMissing(session.user.email.clone()))?;
        let profile: UserProfile = serde_json::from_value(row)?;
        if !profile.is_active {
            return Err(PortalError::InactiveAccount);
        }
        Ok(profile)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hdims_core::Role;
    use hdims_db::{AuthProvider, DataStore, MemoryPlatform, NewUser};
    use serde_json::json;

    async fn platform_with_user(active: bool) -> MemoryPlatform {
        let platform = MemoryPlatform::new();
        let profile = platform
            .create_user(NewUser::new("dho@example.org", "secret123", Role::DistrictAdmin))
            .await
            .unwrap();
        if !active {
            platform
                .store
                .update(
                    Collection::Profiles,
                    json!({ "is_active": false }),
                    &Query::new().eq("id", profile.id.to_string()),
                )
                .await
                .unwrap();
        }
        platform
    }

    #[tokio::test]
    async fn test_sign_in_persists_session() {
        let platform = platform_with_user(true).await;
        let store = Arc::new(MemorySessionStore::new());
        let mut ctx = SessionContext::new(platform.platform(), store.clone());

        let user = ctx.sign_in("dho@example.org", "secret123").await.unwrap();
        assert_eq!(user.role(), FrontendRole::District);
        assert!(store.load().await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_wrong_password() {
        let platform = platform_with_user(true).await;
        let mut ctx = SessionContext::new(platform.platform(), Arc::new(MemorySessionStore::new()));

        assert!(ctx.sign_in("dho@example.org", "nope-nope").await.is_err());
        assert!(ctx.current().is_none());
    }

    #[tokio::test]
    async fn test_inactive_user_denied() {
        let platform = platform_with_user(false).await;
        let store = Arc::new(MemorySessionStore::new());
        let mut ctx = SessionContext::new(platform.platform(), store.clone());

        let err = ctx.sign_in("dho@example.org", "secret123").await.unwrap_err();
        assert!(matches!(err, PortalError::InactiveAccount));
        assert!(store.load().await.unwrap().is_none());
        assert_eq!(platform.auth.session_count().await, 0);
    }

    #[tokio::test]
    async fn test_hydrate_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        let platform = platform_with_user(true).await;

        let mut first = SessionContext::new(
            platform.platform(),
            Arc::new(FileSessionStore::new(&path)),
        );
        first.sign_in("dho@example.org", "secret123").await.unwrap();
        assert!(path.exists());

        let mut second = SessionContext::new(
            platform.platform(),
            Arc::new(FileSessionStore::new(&path)),
        );
        let restored = second.hydrate().await.unwrap().unwrap();
        assert_eq!(restored.profile.email, "dho@example.org");
    }

    #[tokio::test]
    async fn test_hydrate_drops_revoked_session() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        let platform = platform_with_user(true).await;
        let store = Arc::new(FileSessionStore::new(&path));

        let mut ctx = SessionContext::new(platform.platform(), store.clone());
        let token = ctx
            .sign_in("dho@example.org", "secret123")
            .await
            .unwrap()
            .session
            .access_token
            .clone();
        platform.auth.sign_out(&token).await.unwrap();

        let mut fresh = SessionContext::new(platform.platform(), store);
        assert!(fresh.hydrate().await.unwrap().is_none());
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_sign_out_clears_everything() {
        let platform = platform_with_user(true).await;
        let store = Arc::new(MemorySessionStore::new());
        let mut ctx = SessionContext::new(platform.platform(), store.clone());
        ctx.sign_in("dho@example.org", "secret123").await.unwrap();

        ctx.sign_out().await.unwrap();
        assert!(ctx.current().is_none());
        assert!(store.load().await.unwrap().is_none());
        assert!(matches!(ctx.user(), Err(PortalError::NotSignedIn)));
    }

    #[tokio::test]
    async fn test_signed_out_event() {
        let platform = platform_with_user(true).await;
        let mut events = platform.auth.on_auth_state_change();
        let mut ctx = SessionContext::new(platform.platform(), Arc::new(MemorySessionStore::new()));
        let token = ctx
            .sign_in("dho@example.org", "secret123")
            .await
            .unwrap()
            .session
            .access_token
            .clone();

        platform.auth.sign_out(&token).await.unwrap();
        // skip the sign-in event
        let _ = events.recv().await.unwrap();
        let event = events.recv().await.unwrap();
        ctx.apply_event(&event).await.unwrap();
        assert!(ctx.current().is_none());
    }
}

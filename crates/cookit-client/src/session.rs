//! Session lifecycle: exactly one authenticated identity per process,
//! with every transition broadcast to subscribers before the
//! triggering call returns.

use std::sync::{Arc, RwLock};

use tokio::sync::broadcast;
use tracing::{debug, info, warn};
use uuid::Uuid;

use cookit_types::api::{Session, SignUpMetadata, TokenResponse};
use cookit_types::error::{AuthError, DataError};
use cookit_types::models::{NewProfile, Profile};

use crate::gateway::{Gateway, Query};

/// Bio given to every freshly created profile.
pub const DEFAULT_BIO: &str = "Welcome to CooKit!";

/// The session as currently known. `Unknown` is the state before the
/// first asynchronous check completes; callers can tell it apart from
/// a known-absent session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    Unknown,
    SignedOut,
    SignedIn(Session),
}

impl SessionState {
    pub fn session(&self) -> Option<&Session> {
        match self {
            SessionState::SignedIn(session) => Some(session),
            _ => None,
        }
    }

    /// False until the initial resolution has happened.
    pub fn is_resolved(&self) -> bool {
        !matches!(self, SessionState::Unknown)
    }
}

/// Session transitions delivered to subscribers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// The initial check completed; the session is now known.
    Resolved { session: Option<Session> },
    SignedIn { session: Session },
    SignedOut,
}

/// Owns the current identity and its lifecycle. Cheap to clone; every
/// domain collection takes one at construction so the dependency is
/// explicit.
#[derive(Clone)]
pub struct SessionManager {
    inner: Arc<SessionInner>,
}

struct SessionInner {
    gateway: Gateway,
    state: RwLock<SessionState>,
    events: broadcast::Sender<SessionEvent>,
}

impl SessionManager {
    pub fn new(gateway: Gateway) -> Self {
        let (events, _) = broadcast::channel(64);
        Self {
            inner: Arc::new(SessionInner {
                gateway,
                state: RwLock::new(SessionState::Unknown),
                events,
            }),
        }
    }

    /// Snapshot of the current state, synchronously.
    pub fn state(&self) -> SessionState {
        self.inner.state.read().expect("session lock poisoned").clone()
    }

    /// The active session, if one is known.
    pub fn current(&self) -> Option<Session> {
        self.state().session().cloned()
    }

    /// True while the initial resolution is still pending.
    pub fn is_loading(&self) -> bool {
        !self.state().is_resolved()
    }

    /// Subscribe to session transitions, including the initial
    /// resolution from unknown to known.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.inner.events.subscribe()
    }

    /// Resolve the initial state from a token restored by the
    /// platform's secure storage (or none). Transitions out of
    /// `Unknown` exactly once per token handed in.
    pub async fn resolve_initial(
        &self,
        stored_token: Option<String>,
    ) -> Result<Option<Session>, AuthError> {
        let Some(token) = stored_token else {
            self.transition(SessionState::SignedOut, SessionEvent::Resolved { session: None });
            return Ok(None);
        };

        match self.inner.gateway.auth_current_user(&token).await? {
            Some(user) => {
                let session = Session {
                    access_token: token,
                    user_id: user.id,
                    email: user.email,
                };
                self.inner.gateway.set_bearer(Some(session.access_token.clone()));
                if let Err(err) = self.ensure_profile(&session, user.user_metadata).await {
                    warn!("profile check on session restore failed: {err}");
                }
                self.transition(
                    SessionState::SignedIn(session.clone()),
                    SessionEvent::Resolved {
                        session: Some(session.clone()),
                    },
                );
                Ok(Some(session))
            }
            None => {
                debug!("stored token no longer valid");
                self.transition(SessionState::SignedOut, SessionEvent::Resolved { session: None });
                Ok(None)
            }
        }
    }

    pub async fn sign_in(&self, email: &str, password: &str) -> Result<Session, AuthError> {
        let response = self
            .inner
            .gateway
            .auth_password_grant(email.trim(), password)
            .await?;
        let session = session_from(&response);
        self.inner.gateway.set_bearer(Some(session.access_token.clone()));

        // An identity can exist without its profile row when sign-up
        // was interrupted; recreate it here from the identity metadata.
        if let Err(err) = self
            .ensure_profile(&session, response.user.user_metadata.clone())
            .await
        {
            warn!("profile recovery on sign-in failed: {err}");
        }

        info!(user_id = %session.user_id, "signed in");
        self.transition(
            SessionState::SignedIn(session.clone()),
            SessionEvent::SignedIn {
                session: session.clone(),
            },
        );
        Ok(session)
    }

    /// Create a new identity plus its paired profile row. The username
    /// uniqueness pre-check happens before the identity is created, so
    /// a taken username never leaves an orphaned identity behind. A
    /// profile insert that fails afterwards is reported as
    /// `ProfileCreationFailed`: the identity exists, the session is
    /// kept, and the profile is recreated on the next sign-in.
    pub async fn sign_up(
        &self,
        email: &str,
        password: &str,
        username: &str,
        full_name: &str,
    ) -> Result<Session, AuthError> {
        let username = username.trim();
        if username.is_empty() {
            return Err(AuthError::Unknown("username must not be empty".into()));
        }

        let existing: Option<serde_json::Value> = self
            .inner
            .gateway
            .select_optional(
                "profiles",
                Query::new().select("username").eq("username", username),
            )
            .await
            .map_err(|err| AuthError::Unknown(err.to_string()))?;
        if existing.is_some() {
            return Err(AuthError::UsernameTaken);
        }

        let metadata = SignUpMetadata {
            username: username.to_string(),
            full_name: full_name.to_string(),
        };
        let response = self
            .inner
            .gateway
            .auth_sign_up(email.trim(), password, metadata)
            .await?;
        let session = session_from(&response);
        self.inner.gateway.set_bearer(Some(session.access_token.clone()));

        let profile_result = self
            .create_profile(session.user_id, username, full_name)
            .await;

        info!(user_id = %session.user_id, username, "signed up");
        self.transition(
            SessionState::SignedIn(session.clone()),
            SessionEvent::SignedIn {
                session: session.clone(),
            },
        );

        match profile_result {
            Ok(_) => Ok(session),
            Err(err) => {
                warn!(user_id = %session.user_id, "profile creation failed after sign-up: {err}");
                Err(AuthError::ProfileCreationFailed(err.to_string()))
            }
        }
    }

    /// Invalidate the session with the backend and locally. Local state
    /// clears even when the backend call fails, since the token may
    /// already be dead on the server side.
    pub async fn sign_out(&self) -> Result<(), AuthError> {
        let token = match self.current() {
            Some(session) => session.access_token,
            None => {
                self.transition(SessionState::SignedOut, SessionEvent::SignedOut);
                return Ok(());
            }
        };

        let result = self.inner.gateway.auth_logout(&token).await;
        self.inner.gateway.set_bearer(None);
        self.transition(SessionState::SignedOut, SessionEvent::SignedOut);
        info!("signed out");
        result
    }

    /// Create the profile row for an identity when it is missing.
    async fn ensure_profile(
        &self,
        session: &Session,
        metadata: Option<SignUpMetadata>,
    ) -> Result<(), DataError> {
        let existing: Option<Profile> = self
            .inner
            .gateway
            .select_optional("profiles", Query::new().select("*").eq("id", session.user_id))
            .await?;
        if existing.is_some() {
            return Ok(());
        }

        let (username, full_name) = match metadata {
            Some(metadata) => (metadata.username, metadata.full_name),
            // No metadata to recover from: fall back to the email's
            // local part so the account stays usable.
            None => {
                let local = session.email.split('@').next().unwrap_or("user");
                (local.to_string(), local.to_string())
            }
        };

        warn!(user_id = %session.user_id, "profile missing, recreating");
        self.create_profile(session.user_id, &username, &full_name)
            .await
            .map(|_| ())
    }

    async fn create_profile(
        &self,
        user_id: Uuid,
        username: &str,
        full_name: &str,
    ) -> Result<Profile, DataError> {
        let row = NewProfile {
            id: user_id,
            username: username.to_string(),
            full_name: full_name.to_string(),
            bio: DEFAULT_BIO.to_string(),
        };
        self.inner.gateway.insert("profiles", &row, "*").await
    }

    /// Apply a transition and notify subscribers synchronously with
    /// respect to the triggering call.
    fn transition(&self, state: SessionState, event: SessionEvent) {
        *self.inner.state.write().expect("session lock poisoned") = state;
        let _ = self.inner.events.send(event);
    }
}

fn session_from(response: &TokenResponse) -> Session {
    Session {
        access_token: response.access_token.clone(),
        user_id: response.user.id,
        email: response.user.email.clone(),
    }
}

//! A single profile record: the viewed user's account row, including
//! the backend-maintained follower/following/post counters.

use std::sync::Mutex;

use tracing::debug;
use uuid::Uuid;

use cookit_types::error::DataError;
use cookit_types::models::{Profile, ProfilePatch};

use crate::gateway::{Gateway, Query};
use crate::session::SessionManager;

use super::actor;

struct ProfileState {
    profile: Option<Profile>,
    loading: bool,
    last_error: Option<DataError>,
    epoch: u64,
}

pub struct ProfileView {
    gateway: Gateway,
    session: SessionManager,
    state: Mutex<ProfileState>,
}

impl ProfileView {
    pub fn new(gateway: Gateway, session: SessionManager) -> Self {
        Self {
            gateway,
            session,
            state: Mutex::new(ProfileState {
                profile: None,
                loading: false,
                last_error: None,
                epoch: 0,
            }),
        }
    }

    pub fn profile(&self) -> Option<Profile> {
        self.lock().profile.clone()
    }

    pub fn is_loading(&self) -> bool {
        self.lock().loading
    }

    pub fn last_error(&self) -> Option<DataError> {
        self.lock().last_error.clone()
    }

    /// Drop the held profile, e.g. when the session ends. Advancing the
    /// epoch also discards any fetch still in flight.
    pub fn clear(&self) {
        let mut state = self.lock();
        state.epoch += 1;
        state.profile = None;
        state.loading = false;
        state.last_error = None;
    }

    /// Load one user's profile row, replacing whatever was held. The
    /// epoch guard drops a slow fetch that resolves after a newer one
    /// started.
    pub async fn refresh(&self, user_id: Uuid) -> Result<Profile, DataError> {
        let epoch = {
            let mut state = self.lock();
            state.epoch += 1;
            state.loading = true;
            state.epoch
        };

        let result: Result<Option<Profile>, _> = self
            .gateway
            .select_optional("profiles", Query::new().select("*").eq("id", user_id))
            .await;
        let result = result.and_then(|profile| profile.ok_or(DataError::NotFound));

        let mut state = self.lock();
        if state.epoch != epoch {
            debug!("dropping stale profile fetch");
            return result;
        }
        state.loading = false;
        match result {
            Ok(profile) => {
                state.profile = Some(profile.clone());
                state.last_error = None;
                Ok(profile)
            }
            Err(err) => {
                state.last_error = Some(err.clone());
                Err(err)
            }
        }
    }

    /// Patch the acting user's own profile and hold the updated row.
    /// Usernames cannot be patched; the payload type has no such field.
    pub async fn update(&self, patch: ProfilePatch) -> Result<Profile, DataError> {
        let user_id = match actor(&self.session) {
            Ok(user_id) => user_id,
            Err(err) => {
                self.lock().last_error = Some(err.clone());
                return Err(err);
            }
        };

        let result: Result<Profile, _> = self
            .gateway
            .update("profiles", Query::new().eq("id", user_id), &patch, "*")
            .await;

        let mut state = self.lock();
        match result {
            Ok(profile) => {
                state.profile = Some(profile.clone());
                state.last_error = None;
                Ok(profile)
            }
            Err(err) => {
                state.last_error = Some(err.clone());
                Err(err)
            }
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ProfileState> {
        self.state.lock().expect("profile lock poisoned")
    }
}

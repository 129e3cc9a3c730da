//! Domain collections: one module per entity, each owning the
//! in-memory snapshot of its currently loaded rows plus a loading flag
//! and the last error seen. Mutations apply locally only after the
//! backend acknowledges them (apply-on-confirm); the sole local
//! mutations are the splices the operations themselves define.

mod comments;
mod follows;
mod posts;
mod profile;
mod recipes;
mod saves;

pub use comments::CommentThread;
pub use follows::FollowGraph;
pub use posts::{PostFeed, PostScope};
pub use profile::ProfileView;
pub use recipes::{RecipeFeed, RecipeScope};
pub use saves::SavedRecipes;

use std::sync::Mutex;

use tracing::debug;
use uuid::Uuid;

use cookit_types::error::DataError;

use crate::session::SessionManager;

/// The acting identity for a write. Writes without a session are
/// rejected here rather than bounced by the backend's access rules.
pub(crate) fn actor(session: &SessionManager) -> Result<Uuid, DataError> {
    session
        .current()
        .map(|session| session.user_id)
        .ok_or(DataError::PermissionDenied)
}

/// Outcome of a relation toggle: the row was inserted or removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelationChange {
    Added,
    Removed,
}

struct SnapshotState<S, T> {
    scope: S,
    items: Vec<T>,
    loading: bool,
    last_error: Option<DataError>,
    epoch: u64,
}

/// Scope-keyed snapshot shared by the collections. Refreshes are
/// epoch-guarded: a refresh started under an older scope finds the
/// epoch advanced when it resolves and drops its rows instead of
/// overwriting newer state. Nothing here cancels an in-flight call;
/// stale results are simply never applied.
pub(crate) struct SnapshotCell<S, T> {
    state: Mutex<SnapshotState<S, T>>,
}

impl<S: Clone, T: Clone> SnapshotCell<S, T> {
    pub(crate) fn new(scope: S) -> Self {
        Self {
            state: Mutex::new(SnapshotState {
                scope,
                items: Vec::new(),
                loading: false,
                last_error: None,
                epoch: 0,
            }),
        }
    }

    /// Start a refresh for the given scope: advances the epoch, marks
    /// loading, and returns the ticket the refresh must present when it
    /// completes.
    pub(crate) fn begin(&self, scope: S) -> u64 {
        let mut state = self.lock();
        state.epoch += 1;
        state.scope = scope;
        state.loading = true;
        state.epoch
    }

    /// Apply a finished refresh, unless a newer one has started since.
    pub(crate) fn complete(
        &self,
        epoch: u64,
        result: Result<Vec<T>, DataError>,
    ) -> Result<(), DataError> {
        let mut state = self.lock();
        if state.epoch != epoch {
            debug!("dropping stale refresh result");
            return result.map(|_| ());
        }
        state.loading = false;
        match result {
            Ok(items) => {
                state.items = items;
                state.last_error = None;
                Ok(())
            }
            Err(err) => {
                state.last_error = Some(err.clone());
                Err(err)
            }
        }
    }

    /// Record a mutation outcome in the passive error slot, passing the
    /// per-call result through unchanged.
    pub(crate) fn track<V>(&self, result: Result<V, DataError>) -> Result<V, DataError> {
        if let Err(err) = &result {
            self.lock().last_error = Some(err.clone());
        }
        result
    }

    /// Splice the held items after a confirmed mutation.
    pub(crate) fn mutate(&self, apply: impl FnOnce(&mut Vec<T>)) {
        apply(&mut self.lock().items);
    }

    /// Drop everything held, e.g. on sign-out. Advancing the epoch also
    /// discards any refresh still in flight.
    pub(crate) fn clear(&self) {
        let mut state = self.lock();
        state.epoch += 1;
        state.items.clear();
        state.loading = false;
        state.last_error = None;
    }

    pub(crate) fn items(&self) -> Vec<T> {
        self.lock().items.clone()
    }

    pub(crate) fn scope(&self) -> S {
        self.lock().scope.clone()
    }

    pub(crate) fn is_loading(&self) -> bool {
        self.lock().loading
    }

    pub(crate) fn last_error(&self) -> Option<DataError> {
        self.lock().last_error.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, SnapshotState<S, T>> {
        self.state.lock().expect("snapshot lock poisoned")
    }
}

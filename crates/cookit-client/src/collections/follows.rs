//! The follow graph around the acting user: who a user follows, plus
//! the follow/unfollow toggle. Follower counters live on the profile
//! rows and only move on a profile refresh.

use tracing::debug;
use uuid::Uuid;

use cookit_types::error::DataError;
use cookit_types::models::{Follow, NewFollow};

use crate::gateway::{Gateway, Order, Query};
use crate::session::SessionManager;

use super::{RelationChange, SnapshotCell, actor};

pub struct FollowGraph {
    gateway: Gateway,
    session: SessionManager,
    state: SnapshotCell<Option<Uuid>, Follow>,
}

impl FollowGraph {
    pub fn new(gateway: Gateway, session: SessionManager) -> Self {
        Self {
            gateway,
            session,
            state: SnapshotCell::new(None),
        }
    }

    /// The follow rows loaded by the last refresh: everyone the scoped
    /// user follows.
    pub fn following(&self) -> Vec<Follow> {
        self.state.items()
    }

    pub fn is_loading(&self) -> bool {
        self.state.is_loading()
    }

    pub fn last_error(&self) -> Option<DataError> {
        self.state.last_error()
    }

    /// Drop the loaded snapshot, e.g. when the session ends.
    pub fn clear(&self) {
        self.state.clear();
    }

    /// Load the set of profiles the given user follows.
    pub async fn refresh(&self, user_id: Uuid) -> Result<(), DataError> {
        let epoch = self.state.begin(Some(user_id));
        let query = Query::new()
            .select("*")
            .eq("follower_id", user_id)
            .order("created_at", Order::Descending);
        let result = self.gateway.select("follows", query).await;
        self.state.complete(epoch, result)
    }

    /// Probe whether the acting user follows the target.
    pub async fn is_following(&self, target_id: Uuid) -> Result<bool, DataError> {
        let user_id = actor(&self.session)?;
        let existing: Option<Follow> = self
            .gateway
            .select_optional(
                "follows",
                Query::new()
                    .select("*")
                    .eq("follower_id", user_id)
                    .eq("following_id", target_id),
            )
            .await?;
        Ok(existing.is_some())
    }

    /// Flip the acting user's follow on the target profile. Follower
    /// counters are backend-derived; refresh the profile to see them
    /// move.
    pub async fn toggle_follow(&self, target_id: Uuid) -> Result<RelationChange, DataError> {
        let user_id = match actor(&self.session) {
            Ok(user_id) => user_id,
            Err(err) => return self.state.track(Err(err)),
        };
        if user_id == target_id {
            return self.state.track(Err(DataError::ValidationFailed(
                "you cannot follow yourself".into(),
            )));
        }

        let existing: Option<Follow> = self
            .state
            .track(
                self.gateway
                    .select_optional(
                        "follows",
                        Query::new()
                            .select("*")
                            .eq("follower_id", user_id)
                            .eq("following_id", target_id),
                    )
                    .await,
            )?;

        match existing {
            Some(follow) => {
                debug!(%target_id, "unfollowing");
                self.state.track(
                    self.gateway
                        .delete("follows", Query::new().eq("id", follow.id))
                        .await,
                )?;
                self.state
                    .mutate(|items| items.retain(|item| item.id != follow.id));
                Ok(RelationChange::Removed)
            }
            None => {
                debug!(%target_id, "following");
                let row = NewFollow {
                    follower_id: user_id,
                    following_id: target_id,
                };
                let result: Result<Follow, _> = self.gateway.insert("follows", &row, "*").await;
                let created = self.state.track(result)?;
                self.state.mutate(|items| items.insert(0, created));
                Ok(RelationChange::Added)
            }
        }
    }
}

//! The post feed: image/video/short posts with their author embed and
//! the optional linked recipe.

use tracing::debug;
use uuid::Uuid;

use cookit_types::error::DataError;
use cookit_types::models::{Like, NewLike, NewPost, PostInsert, PostWithAuthor};

use crate::gateway::{Gateway, Order, Query};
use crate::session::SessionManager;

use super::{RelationChange, SnapshotCell, actor};

/// Column/embed list every post read returns.
const POST_COLUMNS: &str =
    "*,profiles(username,avatar_url,is_verified,is_private),recipes(name,category)";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PostScope {
    /// Posts from public profiles only; the privacy filter rides on the
    /// embedded author row.
    PublicFeed,
    /// Everything posted by one user.
    ByUser(Uuid),
}

pub struct PostFeed {
    gateway: Gateway,
    session: SessionManager,
    state: SnapshotCell<PostScope, PostWithAuthor>,
}

impl PostFeed {
    pub fn new(gateway: Gateway, session: SessionManager) -> Self {
        Self {
            gateway,
            session,
            state: SnapshotCell::new(PostScope::PublicFeed),
        }
    }

    pub fn posts(&self) -> Vec<PostWithAuthor> {
        self.state.items()
    }

    pub fn scope(&self) -> PostScope {
        self.state.scope()
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

    /// Replace the snapshot with a fresh fetch, newest first. Also the
    /// way like/comment counters catch up after a toggle or a comment
    /// write.
    pub async fn refresh(&self, scope: PostScope) -> Result<(), DataError> {
        let epoch = self.state.begin(scope.clone());
        let mut query = Query::new()
            .select(POST_COLUMNS)
            .order("created_at", Order::Descending);
        query = match &scope {
            PostScope::PublicFeed => query.eq("profiles.is_private", false),
            PostScope::ByUser(user_id) => query.eq("user_id", user_id),
        };
        let result = self.gateway.select("posts", query).await;
        self.state.complete(epoch, result)
    }

    /// Insert a post and prepend the stored row, author embed included.
    pub async fn create(&self, draft: NewPost) -> Result<PostWithAuthor, DataError> {
        if draft.media_url.trim().is_empty() {
            return self.state.track(Err(DataError::ValidationFailed(
                "a media reference is required".into(),
            )));
        }
        let user_id = match actor(&self.session) {
            Ok(user_id) => user_id,
            Err(err) => return self.state.track(Err(err)),
        };

        let row = PostInsert {
            user_id,
            post: draft,
        };
        let result: Result<PostWithAuthor, _> =
            self.gateway.insert("posts", &row, POST_COLUMNS).await;
        let created = self.state.track(result)?;
        self.state.mutate(|items| items.insert(0, created.clone()));
        Ok(created)
    }

    /// Delete an owned post and drop it from the snapshot.
    pub async fn delete_post(&self, id: Uuid) -> Result<(), DataError> {
        let result = self.gateway.delete("posts", Query::new().eq("id", id)).await;
        self.state.track(result)?;
        self.state.mutate(|items| items.retain(|item| item.post.id != id));
        Ok(())
    }

    /// Flip the acting user's like on a post. Check-then-act in two
    /// round trips; counters only move on the next refresh.
    pub async fn toggle_like(&self, post_id: Uuid) -> Result<RelationChange, DataError> {
        let user_id = match actor(&self.session) {
            Ok(user_id) => user_id,
            Err(err) => return self.state.track(Err(err)),
        };

        let existing: Option<Like> = self
            .state
            .track(
                self.gateway
                    .select_optional(
                        "likes",
                        Query::new()
                            .select("*")
                            .eq("post_id", post_id)
                            .eq("user_id", user_id),
                    )
                    .await,
            )?;

        match existing {
            Some(like) => {
                debug!(%post_id, "removing post like");
                self.state
                    .track(self.gateway.delete("likes", Query::new().eq("id", like.id)).await)?;
                Ok(RelationChange::Removed)
            }
            None => {
                debug!(%post_id, "adding post like");
                let row = NewLike {
                    user_id,
                    post_id: Some(post_id),
                    recipe_id: None,
                };
                let result: Result<Like, _> = self.gateway.insert("likes", &row, "*").await;
                self.state.track(result)?;
                Ok(RelationChange::Added)
            }
        }
    }
}

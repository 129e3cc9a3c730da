//! One post's comment thread, oldest first. Comment counts live on the
//! post row, so the thread appends and removes locally without a
//! re-fetch.

use uuid::Uuid;

use cookit_types::error::DataError;
use cookit_types::models::{CommentInsert, CommentWithAuthor};

use crate::gateway::{Gateway, Order, Query};
use crate::session::SessionManager;

use super::{SnapshotCell, actor};

const COMMENT_COLUMNS: &str = "*,profiles(username,avatar_url,is_verified)";

pub struct CommentThread {
    gateway: Gateway,
    session: SessionManager,
    post_id: Uuid,
    state: SnapshotCell<Uuid, CommentWithAuthor>,
}

impl CommentThread {
    pub fn new(gateway: Gateway, session: SessionManager, post_id: Uuid) -> Self {
        Self {
            gateway,
            session,
            post_id,
            state: SnapshotCell::new(post_id),
        }
    }

    pub fn post_id(&self) -> Uuid {
        self.post_id
    }

    pub fn comments(&self) -> Vec<CommentWithAuthor> {
        self.state.items()
    }

    pub fn is_loading(&self) -> bool {
        self.state.is_loading()
    }

    pub fn last_error(&self) -> Option<DataError> {
        self.state.last_error()
    }

    /// Drop the loaded thread, e.g. when the session ends.
    pub fn clear(&self) {
        self.state.clear();
    }

    pub async fn refresh(&self) -> Result<(), DataError> {
        let epoch = self.state.begin(self.post_id);
        let query = Query::new()
            .select(COMMENT_COLUMNS)
            .eq("post_id", self.post_id)
            .order("created_at", Order::Ascending);
        let result = self.gateway.select("comments", query).await;
        self.state.complete(epoch, result)
    }

    /// Insert a comment and append it, keeping oldest-first order.
    pub async fn create(&self, content: &str) -> Result<CommentWithAuthor, DataError> {
        let content = content.trim();
        if content.is_empty() {
            return self.state.track(Err(DataError::ValidationFailed(
                "a comment needs some text".into(),
            )));
        }
        let user_id = match actor(&self.session) {
            Ok(user_id) => user_id,
            Err(err) => return self.state.track(Err(err)),
        };

        let row = CommentInsert {
            user_id,
            post_id: self.post_id,
            content: content.to_string(),
        };
        let result: Result<CommentWithAuthor, _> =
            self.gateway.insert("comments", &row, COMMENT_COLUMNS).await;
        let created = self.state.track(result)?;
        self.state.mutate(|items| items.push(created.clone()));
        Ok(created)
    }

    /// Delete an owned comment and drop it from the thread.
    pub async fn delete(&self, comment_id: Uuid) -> Result<(), DataError> {
        let result = self
            .gateway
            .delete("comments", Query::new().eq("id", comment_id))
            .await;
        self.state.track(result)?;
        self.state
            .mutate(|items| items.retain(|item| item.comment.id != comment_id));
        Ok(())
    }
}

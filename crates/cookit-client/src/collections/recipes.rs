//! The recipe feed: a newest-first snapshot of recipes for one scope,
//! with owner-scoped writes and the like/save relation toggles.

use tracing::debug;
use uuid::Uuid;

use cookit_types::error::DataError;
use cookit_types::models::{
    Like, NewLike, NewRecipe, NewSave, RecipeInsert, RecipePatch, RecipeWithAuthor, Save,
};

use crate::gateway::{Gateway, Order, Query};
use crate::session::SessionManager;

use super::{RelationChange, SnapshotCell, actor};

/// Column/embed list every recipe read returns.
const RECIPE_COLUMNS: &str = "*,profiles(username,avatar_url,is_verified)";

/// Which rows the feed holds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecipeScope {
    /// Everything publicly visible. Private recipes are excluded at
    /// the query level; the backend's access rules are the backstop.
    PublicFeed,
    /// Everything owned by one user, private rows included. Whether the
    /// caller may see them is the backend's decision, not a client
    /// filter.
    ByUser(Uuid),
}

pub struct RecipeFeed {
    gateway: Gateway,
    session: SessionManager,
    state: SnapshotCell<RecipeScope, RecipeWithAuthor>,
}

impl RecipeFeed {
    pub fn new(gateway: Gateway, session: SessionManager) -> Self {
        Self {
            gateway,
            session,
            state: SnapshotCell::new(RecipeScope::PublicFeed),
        }
    }

    pub fn recipes(&self) -> Vec<RecipeWithAuthor> {
        self.state.items()
    }

    pub fn scope(&self) -> RecipeScope {
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

    /// Replace the snapshot with a fresh fetch for the scope. This is
    /// also how like/save counters catch up after a toggle: the
    /// counters are backend-derived, so only a re-fetch can update them.
    pub async fn refresh(&self, scope: RecipeScope) -> Result<(), DataError> {
        let epoch = self.state.begin(scope.clone());
        let mut query = Query::new()
            .select(RECIPE_COLUMNS)
            .order("created_at", Order::Descending);
        query = match &scope {
            RecipeScope::PublicFeed => query.eq("is_private", false),
            RecipeScope::ByUser(user_id) => query.eq("user_id", user_id),
        };
        let result = self.gateway.select("recipes", query).await;
        self.state.complete(epoch, result)
    }

    /// Validate and insert a recipe, then prepend the stored row so the
    /// feed keeps newest-first order without a round trip.
    pub async fn create(&self, draft: NewRecipe) -> Result<RecipeWithAuthor, DataError> {
        let draft = match validate_draft(draft) {
            Ok(draft) => draft,
            Err(err) => return self.state.track(Err(err)),
        };
        let user_id = match actor(&self.session) {
            Ok(user_id) => user_id,
            Err(err) => return self.state.track(Err(err)),
        };

        let row = RecipeInsert {
            user_id,
            recipe: draft,
        };
        let result: Result<RecipeWithAuthor, _> =
            self.gateway.insert("recipes", &row, RECIPE_COLUMNS).await;
        let created = self.state.track(result)?;
        self.state.mutate(|items| items.insert(0, created.clone()));
        Ok(created)
    }

    /// Patch an owned recipe and replace it in place.
    pub async fn update_recipe(
        &self,
        id: Uuid,
        patch: RecipePatch,
    ) -> Result<RecipeWithAuthor, DataError> {
        let result: Result<RecipeWithAuthor, _> = self
            .gateway
            .update("recipes", Query::new().eq("id", id), &patch, RECIPE_COLUMNS)
            .await;
        let updated = self.state.track(result)?;
        self.state.mutate(|items| {
            if let Some(slot) = items.iter_mut().find(|item| item.recipe.id == id) {
                *slot = updated.clone();
            }
        });
        Ok(updated)
    }

    /// Delete an owned recipe and drop it from the snapshot.
    pub async fn delete_recipe(&self, id: Uuid) -> Result<(), DataError> {
        let result = self
            .gateway
            .delete("recipes", Query::new().eq("id", id))
            .await;
        self.state.track(result)?;
        self.state.mutate(|items| items.retain(|item| item.recipe.id != id));
        Ok(())
    }

    /// Flip the acting user's like on a recipe: insert the relation if
    /// absent, delete it if present. The existence check and the write
    /// are two round trips, so two concurrent toggles on the same
    /// target can race; last write wins. Counters are not touched here,
    /// so call [`refresh`](Self::refresh) to pick up the backend's
    /// recount.
    pub async fn toggle_like(&self, recipe_id: Uuid) -> Result<RelationChange, DataError> {
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
                            .eq("recipe_id", recipe_id)
                            .eq("user_id", user_id),
                    )
                    .await,
            )?;

        match existing {
            Some(like) => {
                debug!(%recipe_id, "removing recipe like");
                self.state
                    .track(self.gateway.delete("likes", Query::new().eq("id", like.id)).await)?;
                Ok(RelationChange::Removed)
            }
            None => {
                debug!(%recipe_id, "adding recipe like");
                let row = NewLike {
                    user_id,
                    post_id: None,
                    recipe_id: Some(recipe_id),
                };
                let result: Result<Like, _> = self.gateway.insert("likes", &row, "*").await;
                self.state.track(result)?;
                Ok(RelationChange::Added)
            }
        }
    }

    /// Flip the acting user's save on a recipe. Same contract as
    /// [`toggle_like`](Self::toggle_like).
    pub async fn toggle_save(&self, recipe_id: Uuid) -> Result<RelationChange, DataError> {
        let user_id = match actor(&self.session) {
            Ok(user_id) => user_id,
            Err(err) => return self.state.track(Err(err)),
        };

        let existing: Option<Save> = self
            .state
            .track(
                self.gateway
                    .select_optional(
                        "saves",
                        Query::new()
                            .select("*")
                            .eq("recipe_id", recipe_id)
                            .eq("user_id", user_id),
                    )
                    .await,
            )?;

        match existing {
            Some(save) => {
                debug!(%recipe_id, "removing recipe save");
                self.state
                    .track(self.gateway.delete("saves", Query::new().eq("id", save.id)).await)?;
                Ok(RelationChange::Removed)
            }
            None => {
                debug!(%recipe_id, "adding recipe save");
                let row = NewSave { user_id, recipe_id };
                let result: Result<Save, _> = self.gateway.insert("saves", &row, "*").await;
                self.state.track(result)?;
                Ok(RelationChange::Added)
            }
        }
    }
}

/// A recipe draft must keep at least one non-blank ingredient and one
/// non-blank direction once whitespace-only entries are dropped; the
/// dropped entries are not sent.
fn validate_draft(mut draft: NewRecipe) -> Result<NewRecipe, DataError> {
    if draft.name.trim().is_empty() {
        return Err(DataError::ValidationFailed("recipe name is required".into()));
    }
    draft.ingredients.retain(|entry| !entry.trim().is_empty());
    draft.directions.retain(|entry| !entry.trim().is_empty());
    if draft.ingredients.is_empty() {
        return Err(DataError::ValidationFailed(
            "at least one ingredient is required".into(),
        ));
    }
    if draft.directions.is_empty() {
        return Err(DataError::ValidationFailed(
            "at least one direction is required".into(),
        ));
    }
    Ok(draft)
}

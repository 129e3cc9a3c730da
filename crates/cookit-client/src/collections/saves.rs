//! One user's saved recipes: save rows with the full recipe (and its
//! author) embedded, newest save first.

use uuid::Uuid;

use cookit_types::error::DataError;
use cookit_types::models::{Save, SavedRecipe};

use crate::gateway::{Gateway, Order, Query};
use crate::session::SessionManager;

use super::{SnapshotCell, actor};

const SAVE_COLUMNS: &str = "*,recipes(id,name,description,image_url,category,is_veg,prep_time,\
                            likes_count,saves_count,profiles(username,avatar_url))";

pub struct SavedRecipes {
    gateway: Gateway,
    session: SessionManager,
    state: SnapshotCell<Option<Uuid>, SavedRecipe>,
}

impl SavedRecipes {
    pub fn new(gateway: Gateway, session: SessionManager) -> Self {
        Self {
            gateway,
            session,
            state: SnapshotCell::new(None),
        }
    }

    pub fn saved(&self) -> Vec<SavedRecipe> {
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

    /// Load the given user's saves, newest first.
    pub async fn refresh(&self, user_id: Uuid) -> Result<(), DataError> {
        let epoch = self.state.begin(Some(user_id));
        let query = Query::new()
            .select(SAVE_COLUMNS)
            .eq("user_id", user_id)
            .order("created_at", Order::Descending);
        let result = self.gateway.select("saves", query).await;
        self.state.complete(epoch, result)
    }

    /// Probe whether the acting user has saved a recipe, without
    /// touching the held snapshot.
    pub async fn is_saved(&self, recipe_id: Uuid) -> Result<bool, DataError> {
        let user_id = actor(&self.session)?;
        let existing: Option<Save> = self
            .gateway
            .select_optional(
                "saves",
                Query::new()
                    .select("*")
                    .eq("recipe_id", recipe_id)
                    .eq("user_id", user_id),
            )
            .await?;
        Ok(existing.is_some())
    }
}

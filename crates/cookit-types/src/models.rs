use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

/// Backend counter columns are nullable; absent or null both read as the
/// type's default so callers never see an `Option` around a count.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

// -- Rows --

/// One row of the `profiles` table. Paired 1:1 with an identity; the
/// counter columns are denormalized and maintained by the backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Profile {
    pub id: Uuid,
    pub username: String,
    pub full_name: String,
    pub avatar_url: Option<String>,
    pub bio: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub followers_count: i64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub following_count: i64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub posts_count: i64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub is_verified: bool,
    #[serde(default, deserialize_with = "null_as_default")]
    pub is_private: bool,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

/// One row of the `recipes` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Recipe {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub description: String,
    pub image_url: String,
    pub ingredients: Vec<String>,
    pub directions: Vec<String>,
    pub prep_time: String,
    pub calories: Option<i64>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub is_veg: bool,
    pub category: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub is_private: bool,
    #[serde(default, deserialize_with = "null_as_default")]
    pub likes_count: i64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub saves_count: i64,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

/// The `type` column of the `posts` table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PostKind {
    Image,
    Video,
    Short,
}

/// One row of the `posts` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Post {
    pub id: Uuid,
    pub user_id: Uuid,
    #[serde(rename = "type")]
    pub kind: PostKind,
    pub media_url: String,
    pub caption: Option<String>,
    pub recipe_id: Option<Uuid>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub likes_count: i64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub comments_count: i64,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

/// One row of the `comments` table, attached to exactly one post.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Comment {
    pub id: Uuid,
    pub user_id: Uuid,
    pub post_id: Uuid,
    pub content: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub likes_count: i64,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

/// One row of the `likes` table. Exactly one of `post_id` / `recipe_id`
/// is set; presence of the row is the whole relation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Like {
    pub id: Uuid,
    pub user_id: Uuid,
    pub post_id: Option<Uuid>,
    pub recipe_id: Option<Uuid>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

/// One row of the `saves` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Save {
    pub id: Uuid,
    pub user_id: Uuid,
    pub recipe_id: Uuid,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

/// One row of the `follows` table: `follower_id` follows `following_id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Follow {
    pub id: Uuid,
    pub follower_id: Uuid,
    pub following_id: Uuid,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

// -- Joined read models --
//
// List reads embed the owning profile (and, for posts, the linked
// recipe) under the foreign table's name, so the feed can render
// author fields without a second query.

/// Author columns embedded on recipe and comment reads.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthorBrief {
    pub username: String,
    pub avatar_url: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub is_verified: bool,
}

/// Author columns embedded on post reads; `is_private` rides along so a
/// public feed can be filtered on the author's visibility.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostAuthor {
    pub username: String,
    pub avatar_url: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub is_verified: bool,
    #[serde(default, deserialize_with = "null_as_default")]
    pub is_private: bool,
}

/// Linked-recipe columns embedded on post reads.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecipeBrief {
    pub name: String,
    pub category: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecipeWithAuthor {
    #[serde(flatten)]
    pub recipe: Recipe,
    #[serde(rename = "profiles")]
    pub author: AuthorBrief,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostWithAuthor {
    #[serde(flatten)]
    pub post: Post,
    #[serde(rename = "profiles")]
    pub author: PostAuthor,
    #[serde(rename = "recipes", default)]
    pub recipe: Option<RecipeBrief>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommentWithAuthor {
    #[serde(flatten)]
    pub comment: Comment,
    #[serde(rename = "profiles")]
    pub author: AuthorBrief,
}

/// Recipe columns embedded on a save read, including the recipe's own
/// author embed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SavedRecipeDetails {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub image_url: String,
    pub category: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub is_veg: bool,
    pub prep_time: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub likes_count: i64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub saves_count: i64,
    #[serde(rename = "profiles")]
    pub author: SaveAuthor,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SaveAuthor {
    pub username: String,
    pub avatar_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SavedRecipe {
    #[serde(flatten)]
    pub save: Save,
    #[serde(rename = "recipes")]
    pub recipe: SavedRecipeDetails,
}

// -- Insert / patch payloads --
//
// Distinct from the row types: the backend assigns ids and timestamps,
// and patches must not be able to touch immutable columns.

/// Payload for creating a recipe. The acting user's id is attached by
/// the collection issuing the insert.
#[derive(Debug, Clone, Serialize)]
pub struct NewRecipe {
    pub name: String,
    pub description: String,
    pub image_url: String,
    pub ingredients: Vec<String>,
    pub directions: Vec<String>,
    pub prep_time: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub calories: Option<i64>,
    pub is_veg: bool,
    pub category: String,
    pub is_private: bool,
}

/// Patch for an owned recipe. Only the fields set are sent.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RecipePatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ingredients: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub directions: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prep_time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub calories: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_veg: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_private: Option<bool>,
}

/// Payload for creating a post.
#[derive(Debug, Clone, Serialize)]
pub struct NewPost {
    #[serde(rename = "type")]
    pub kind: PostKind,
    pub media_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub caption: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recipe_id: Option<Uuid>,
}

/// Patch for the caller's own profile. There is deliberately no
/// username field: a username is immutable once claimed.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ProfilePatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_private: Option<bool>,
}

/// Profile row created at sign-up; `id` matches the identity's id.
#[derive(Debug, Clone, Serialize)]
pub struct NewProfile {
    pub id: Uuid,
    pub username: String,
    pub full_name: String,
    pub bio: String,
}

/// Wire body for a recipe insert: the acting user plus the draft.
#[derive(Debug, Clone, Serialize)]
pub struct RecipeInsert {
    pub user_id: Uuid,
    #[serde(flatten)]
    pub recipe: NewRecipe,
}

/// Wire body for a post insert.
#[derive(Debug, Clone, Serialize)]
pub struct PostInsert {
    pub user_id: Uuid,
    #[serde(flatten)]
    pub post: NewPost,
}

/// Wire body for a comment insert.
#[derive(Debug, Clone, Serialize)]
pub struct CommentInsert {
    pub user_id: Uuid,
    pub post_id: Uuid,
    pub content: String,
}

/// Wire body for a like insert; exactly one target is set.
#[derive(Debug, Clone, Serialize)]
pub struct NewLike {
    pub user_id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub post_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recipe_id: Option<Uuid>,
}

/// Wire body for a save insert.
#[derive(Debug, Clone, Serialize)]
pub struct NewSave {
    pub user_id: Uuid,
    pub recipe_id: Uuid,
}

/// Wire body for a follow insert.
#[derive(Debug, Clone, Serialize)]
pub struct NewFollow {
    pub follower_id: Uuid,
    pub following_id: Uuid,
}

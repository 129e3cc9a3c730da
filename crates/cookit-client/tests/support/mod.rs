//! In-process stand-in for the hosted backend: the auth endpoints plus
//! a table API over in-memory rows, listening on a loopback port.
//! Counters (likes, saves, comments, followers) are recomputed from the
//! relation tables on every read, the way the real backend's triggers
//! keep them derived.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{Value, json};
use uuid::Uuid;

#[derive(Clone)]
struct Identity {
    id: Uuid,
    email: String,
    password: String,
    metadata: Value,
}

#[derive(Default)]
struct BackendState {
    identities: Vec<Identity>,
    tokens: HashMap<String, Uuid>,
    tables: HashMap<String, Vec<Value>>,
    seq: u64,
    fail_next_profile_insert: bool,
}

type Shared = Arc<Mutex<BackendState>>;

pub struct StubBackend {
    pub base_url: String,
    state: Shared,
}

impl StubBackend {
    pub async fn spawn() -> Self {
        let state: Shared = Arc::new(Mutex::new(BackendState::default()));

        let app = Router::new()
            .route("/auth/v1/signup", post(auth_signup))
            .route("/auth/v1/token", post(auth_token))
            .route("/auth/v1/user", get(auth_user))
            .route("/auth/v1/logout", post(auth_logout))
            .route(
                "/rest/v1/{table}",
                get(rest_select)
                    .post(rest_insert)
                    .patch(rest_update)
                    .delete(rest_delete),
            )
            .with_state(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind loopback");
        let addr = listener.local_addr().expect("local addr");
        tokio::spawn(async move {
            axum::serve(listener, app).await.expect("stub backend serve");
        });

        Self {
            base_url: format!("http://{addr}"),
            state,
        }
    }

    pub fn identity_count(&self) -> usize {
        self.lock().identities.len()
    }

    pub fn table_len(&self, table: &str) -> usize {
        self.lock().tables.get(table).map_or(0, Vec::len)
    }

    /// Make the next profiles insert fail with a server error, to
    /// exercise the identity-created-but-profile-missing path.
    pub fn fail_next_profile_insert(&self) {
        self.lock().fail_next_profile_insert = true;
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BackendState> {
        self.state.lock().expect("stub state lock")
    }
}

impl BackendState {
    fn next_seq(&mut self) -> u64 {
        self.seq += 1;
        self.seq
    }

    fn rows(&self, table: &str) -> &[Value] {
        self.tables.get(table).map_or(&[], Vec::as_slice)
    }

    fn count_rows(&self, table: &str, column: &str, id: &str) -> i64 {
        self.rows(table)
            .iter()
            .filter(|row| row.get(column).and_then(Value::as_str) == Some(id))
            .count() as i64
    }

    fn profile_of(&self, user_id: &str) -> Option<Value> {
        self.rows("profiles")
            .iter()
            .find(|row| row.get("id").and_then(Value::as_str) == Some(user_id))
            .cloned()
    }

    fn actor(&self, headers: &HeaderMap) -> Option<Uuid> {
        let token = headers
            .get("authorization")?
            .to_str()
            .ok()?
            .strip_prefix("Bearer ")?;
        self.tokens.get(token).copied()
    }

    /// Recompute the derived counter columns for one row.
    fn enrich(&self, table: &str, row: &Value) -> Value {
        let mut row = row.clone();
        let id = row.get("id").and_then(Value::as_str).unwrap_or("").to_string();
        match table {
            "recipes" => {
                row["likes_count"] = json!(self.count_rows("likes", "recipe_id", &id));
                row["saves_count"] = json!(self.count_rows("saves", "recipe_id", &id));
            }
            "posts" => {
                row["likes_count"] = json!(self.count_rows("likes", "post_id", &id));
                row["comments_count"] = json!(self.count_rows("comments", "post_id", &id));
            }
            "profiles" => {
                row["followers_count"] = json!(self.count_rows("follows", "following_id", &id));
                row["following_count"] = json!(self.count_rows("follows", "follower_id", &id));
                row["posts_count"] = json!(self.count_rows("posts", "user_id", &id));
            }
            _ => {}
        }
        row
    }

    /// Attach the foreign-table embeds named in the select list.
    fn embed(&self, table: &str, select: &str, row: &mut Value) {
        if select.contains("profiles(") && matches!(table, "recipes" | "posts" | "comments") {
            let user_id = row.get("user_id").and_then(Value::as_str).unwrap_or("");
            row["profiles"] = self
                .profile_of(user_id)
                .map(|profile| self.enrich("profiles", &profile))
                .unwrap_or(Value::Null);
        }
        if select.contains("recipes(") && table == "posts" {
            let linked = row.get("recipe_id").and_then(Value::as_str).and_then(|rid| {
                self.rows("recipes")
                    .iter()
                    .find(|recipe| recipe.get("id").and_then(Value::as_str) == Some(rid))
                    .cloned()
            });
            row["recipes"] = linked.unwrap_or(Value::Null);
        }
        if select.contains("recipes(") && table == "saves" {
            let linked = row.get("recipe_id").and_then(Value::as_str).and_then(|rid| {
                self.rows("recipes")
                    .iter()
                    .find(|recipe| recipe.get("id").and_then(Value::as_str) == Some(rid))
                    .cloned()
            });
            row["recipes"] = match linked {
                Some(recipe) => {
                    let mut recipe = self.enrich("recipes", &recipe);
                    let owner = recipe.get("user_id").and_then(Value::as_str).unwrap_or("");
                    recipe["profiles"] = self.profile_of(owner).unwrap_or(Value::Null);
                    recipe
                }
                None => Value::Null,
            };
        }
    }
}

// -- Auth handlers --

async fn auth_signup(
    State(state): State<Shared>,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    let email = body.get("email").and_then(Value::as_str).unwrap_or("");
    let password = body.get("password").and_then(Value::as_str).unwrap_or("");
    let metadata = body.get("data").cloned().unwrap_or(Value::Null);

    if !email.contains('@') {
        return auth_error(
            StatusCode::BAD_REQUEST,
            "validation_failed",
            "Unable to validate email address",
        );
    }
    if password.len() < 6 {
        return auth_error(
            StatusCode::UNPROCESSABLE_ENTITY,
            "weak_password",
            "Password should be at least 6 characters",
        );
    }

    let mut state = state.lock().expect("stub state lock");
    if state.identities.iter().any(|identity| identity.email == email) {
        return auth_error(
            StatusCode::UNPROCESSABLE_ENTITY,
            "user_already_exists",
            "User already registered",
        );
    }

    let identity = Identity {
        id: Uuid::new_v4(),
        email: email.to_string(),
        password: password.to_string(),
        metadata,
    };
    let token = format!("tok-{}", Uuid::new_v4());
    state.tokens.insert(token.clone(), identity.id);
    let response = token_response(&identity, &token);
    state.identities.push(identity);
    (StatusCode::OK, Json(response))
}

async fn auth_token(
    State(state): State<Shared>,
    Query(params): Query<HashMap<String, String>>,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    assert_eq!(params.get("grant_type").map(String::as_str), Some("password"));
    let email = body.get("email").and_then(Value::as_str).unwrap_or("");
    let password = body.get("password").and_then(Value::as_str).unwrap_or("");

    let mut state = state.lock().expect("stub state lock");
    let Some(identity) = state
        .identities
        .iter()
        .find(|identity| identity.email == email && identity.password == password)
        .cloned()
    else {
        return auth_error(
            StatusCode::BAD_REQUEST,
            "invalid_credentials",
            "Invalid login credentials",
        );
    };

    let token = format!("tok-{}", Uuid::new_v4());
    state.tokens.insert(token.clone(), identity.id);
    (StatusCode::OK, Json(token_response(&identity, &token)))
}

async fn auth_user(State(state): State<Shared>, headers: HeaderMap) -> (StatusCode, Json<Value>) {
    let state = state.lock().expect("stub state lock");
    match state.actor(&headers) {
        Some(user_id) => {
            let identity = state
                .identities
                .iter()
                .find(|identity| identity.id == user_id)
                .cloned()
                .expect("token maps to identity");
            (
                StatusCode::OK,
                Json(json!({
                    "id": identity.id,
                    "email": identity.email,
                    "user_metadata": identity.metadata,
                })),
            )
        }
        None => auth_error(StatusCode::UNAUTHORIZED, "bad_jwt", "invalid JWT"),
    }
}

async fn auth_logout(State(state): State<Shared>, headers: HeaderMap) -> StatusCode {
    let mut state = state.lock().expect("stub state lock");
    let token = headers
        .get("authorization")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::to_string);
    match token.and_then(|token| state.tokens.remove(&token)) {
        Some(_) => StatusCode::NO_CONTENT,
        None => StatusCode::UNAUTHORIZED,
    }
}

fn token_response(identity: &Identity, token: &str) -> Value {
    json!({
        "access_token": token,
        "token_type": "bearer",
        "user": {
            "id": identity.id,
            "email": identity.email,
            "user_metadata": identity.metadata,
        }
    })
}

fn auth_error(status: StatusCode, code: &str, message: &str) -> (StatusCode, Json<Value>) {
    (status, Json(json!({ "error_code": code, "msg": message })))
}

// -- Table handlers --

const RESERVED_PARAMS: &[&str] = &["select", "order", "limit"];

fn filters(params: &HashMap<String, String>) -> Vec<(String, String)> {
    params
        .iter()
        .filter(|(key, _)| !RESERVED_PARAMS.contains(&key.as_str()))
        .map(|(key, value)| {
            let predicate = value
                .strip_prefix("eq.")
                .unwrap_or_else(|| panic!("unsupported predicate {value:?}"));
            (key.clone(), predicate.to_string())
        })
        .collect()
}

fn value_matches(row: &Value, column: &str, expected: &str) -> bool {
    match row.get(column) {
        Some(Value::Bool(actual)) => expected.parse::<bool>() == Ok(*actual),
        Some(Value::String(actual)) => actual == expected,
        Some(Value::Number(actual)) => actual.to_string() == expected,
        _ => false,
    }
}

fn row_matches(state: &BackendState, row: &Value, column: &str, expected: &str) -> bool {
    // Embedded-resource filter: the predicate applies to the row's
    // author profile, not the row itself.
    if let Some(profile_column) = column.strip_prefix("profiles.") {
        let user_id = row.get("user_id").and_then(Value::as_str).unwrap_or("");
        return state
            .profile_of(user_id)
            .is_some_and(|profile| value_matches(&profile, profile_column, expected));
    }
    value_matches(row, column, expected)
}

fn owner_column(table: &str) -> Option<&'static str> {
    match table {
        "profiles" => Some("id"),
        "recipes" | "posts" | "comments" | "likes" | "saves" => Some("user_id"),
        "follows" => Some("follower_id"),
        _ => None,
    }
}

fn rest_error(status: StatusCode, code: &str, message: &str) -> (StatusCode, Json<Value>) {
    (status, Json(json!({ "code": code, "message": message })))
}

async fn rest_select(
    State(state): State<Shared>,
    Path(table): Path<String>,
    Query(params): Query<HashMap<String, String>>,
) -> (StatusCode, Json<Value>) {
    let state = state.lock().expect("stub state lock");
    let select = params.get("select").cloned().unwrap_or_else(|| "*".into());
    let filters = filters(&params);

    let mut rows: Vec<Value> = state
        .rows(&table)
        .iter()
        .filter(|row| {
            filters
                .iter()
                .all(|(column, expected)| row_matches(&state, row, column, expected))
        })
        .cloned()
        .collect();

    if let Some(order) = params.get("order") {
        let descending = order.ends_with(".desc");
        rows.sort_by_key(|row| row.get("_seq").and_then(Value::as_u64).unwrap_or(0));
        if descending {
            rows.reverse();
        }
    }
    if let Some(limit) = params.get("limit").and_then(|limit| limit.parse::<usize>().ok()) {
        rows.truncate(limit);
    }

    let rows: Vec<Value> = rows
        .into_iter()
        .map(|row| {
            let mut row = state.enrich(&table, &row);
            state.embed(&table, &select, &mut row);
            row
        })
        .collect();
    (StatusCode::OK, Json(Value::Array(rows)))
}

async fn rest_insert(
    State(state): State<Shared>,
    Path(table): Path<String>,
    Query(params): Query<HashMap<String, String>>,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    let mut state = state.lock().expect("stub state lock");
    let select = params.get("select").cloned().unwrap_or_else(|| "*".into());

    if table == "profiles" && state.fail_next_profile_insert {
        state.fail_next_profile_insert = false;
        return rest_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "XX000",
            "internal error",
        );
    }

    let mut row = body;
    if table == "profiles" {
        let username = row.get("username").and_then(Value::as_str).unwrap_or("");
        if state
            .rows("profiles")
            .iter()
            .any(|existing| existing.get("username").and_then(Value::as_str) == Some(username))
        {
            return rest_error(
                StatusCode::CONFLICT,
                "23505",
                "duplicate key value violates unique constraint \"profiles_username_key\"",
            );
        }
        // Column defaults the real schema applies on insert.
        if row.get("is_private").is_none() {
            row["is_private"] = json!(false);
        }
        if row.get("is_verified").is_none() {
            row["is_verified"] = json!(false);
        }
    }

    if row.get("id").is_none() {
        row["id"] = json!(Uuid::new_v4());
    }
    let seq = state.next_seq();
    row["_seq"] = json!(seq);
    row["created_at"] = json!(
        chrono::DateTime::from_timestamp(1_750_000_000 + seq as i64, 0)
            .expect("valid timestamp")
            .to_rfc3339()
    );

    state.tables.entry(table.clone()).or_default().push(row.clone());

    let mut stored = state.enrich(&table, &row);
    state.embed(&table, &select, &mut stored);
    (StatusCode::CREATED, Json(Value::Array(vec![stored])))
}

async fn rest_update(
    State(state): State<Shared>,
    Path(table): Path<String>,
    Query(params): Query<HashMap<String, String>>,
    headers: HeaderMap,
    Json(patch): Json<Value>,
) -> (StatusCode, Json<Value>) {
    let mut state = state.lock().expect("stub state lock");
    let select = params.get("select").cloned().unwrap_or_else(|| "*".into());
    let filters = filters(&params);
    let actor = state.actor(&headers).map(|id| id.to_string());

    let matching: Vec<Value> = state
        .rows(&table)
        .iter()
        .filter(|row| {
            filters
                .iter()
                .all(|(column, expected)| row_matches(&state, row, column, expected))
        })
        .cloned()
        .collect();

    if let Some(owner) = owner_column(&table) {
        let denied = matching.iter().any(|row| {
            row.get(owner).and_then(Value::as_str) != actor.as_deref()
        });
        if denied {
            return rest_error(
                StatusCode::FORBIDDEN,
                "42501",
                "permission denied by row-level security policy",
            );
        }
    }

    let ids: Vec<String> = matching
        .iter()
        .filter_map(|row| row.get("id").and_then(Value::as_str).map(str::to_string))
        .collect();

    let mut updated = Vec::new();
    if let Some(rows) = state.tables.get_mut(&table) {
        for row in rows.iter_mut() {
            let id = row.get("id").and_then(Value::as_str).unwrap_or("");
            if !ids.iter().any(|candidate| candidate == id) {
                continue;
            }
            if let (Some(target), Some(fields)) = (row.as_object_mut(), patch.as_object()) {
                for (key, value) in fields {
                    target.insert(key.clone(), value.clone());
                }
            }
            updated.push(row.clone());
        }
    }

    let updated: Vec<Value> = updated
        .into_iter()
        .map(|row| {
            let mut row = state.enrich(&table, &row);
            state.embed(&table, &select, &mut row);
            row
        })
        .collect();
    (StatusCode::OK, Json(Value::Array(updated)))
}

async fn rest_delete(
    State(state): State<Shared>,
    Path(table): Path<String>,
    Query(params): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> (StatusCode, Json<Value>) {
    let mut state = state.lock().expect("stub state lock");
    let filters = filters(&params);
    let actor = state.actor(&headers).map(|id| id.to_string());

    let matching: Vec<Value> = state
        .rows(&table)
        .iter()
        .filter(|row| {
            filters
                .iter()
                .all(|(column, expected)| row_matches(&state, row, column, expected))
        })
        .cloned()
        .collect();

    if let Some(owner) = owner_column(&table) {
        let denied = matching.iter().any(|row| {
            row.get(owner).and_then(Value::as_str) != actor.as_deref()
        });
        if denied {
            return rest_error(
                StatusCode::FORBIDDEN,
                "42501",
                "permission denied by row-level security policy",
            );
        }
    }

    let ids: Vec<String> = matching
        .iter()
        .filter_map(|row| row.get("id").and_then(Value::as_str).map(str::to_string))
        .collect();
    if let Some(rows) = state.tables.get_mut(&table) {
        rows.retain(|row| {
            let id = row.get("id").and_then(Value::as_str).unwrap_or("");
            !ids.iter().any(|candidate| candidate == id)
        });
    }

    (StatusCode::OK, Json(Value::Array(matching)))
}

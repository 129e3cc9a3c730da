use serde::{Deserialize, Serialize};
use uuid::Uuid;

// -- Auth --

/// An authenticated identity as held by the client: the bearer token
/// plus the identity's id and email. At most one is active per process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub access_token: String,
    pub user_id: Uuid,
    pub email: String,
}

/// Body for the password-grant token request.
#[derive(Debug, Serialize)]
pub struct PasswordGrantRequest {
    pub email: String,
    pub password: String,
}

/// Body for the sign-up request. `data` becomes the identity's metadata
/// and is what the profile-recovery path reads back.
#[derive(Debug, Serialize)]
pub struct SignUpRequest {
    pub email: String,
    pub password: String,
    pub data: SignUpMetadata,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignUpMetadata {
    pub username: String,
    pub full_name: String,
}

/// Identity fields returned by the auth endpoints.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthUser {
    pub id: Uuid,
    pub email: String,
    #[serde(default)]
    pub user_metadata: Option<SignUpMetadata>,
}

/// Successful response shape shared by sign-up and the password grant.
#[derive(Debug, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub user: AuthUser,
}

/// Error body shape of the auth endpoints. Older deployments use `msg`,
/// newer ones `message`; both are accepted.
#[derive(Debug, Default, Deserialize)]
pub struct AuthApiError {
    #[serde(default)]
    pub error_code: Option<String>,
    #[serde(default)]
    pub msg: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

impl AuthApiError {
    pub fn text(&self) -> &str {
        self.msg
            .as_deref()
            .or(self.message.as_deref())
            .unwrap_or("unknown auth error")
    }
}

// -- Table API --

/// Error body shape of the table endpoints.
#[derive(Debug, Default, Deserialize)]
pub struct RestApiError {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

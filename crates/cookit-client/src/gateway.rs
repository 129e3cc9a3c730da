//! Uniform request shaping for the backend's table API plus the auth
//! endpoints. Domain collections never touch HTTP directly; they build
//! a [`Query`] and hand it to the gateway.

use std::sync::{Arc, RwLock};

use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use cookit_types::api::{
    AuthApiError, AuthUser, PasswordGrantRequest, RestApiError, SignUpMetadata, SignUpRequest,
    TokenResponse,
};
use cookit_types::error::{AuthError, DataError};

use crate::config::ClientConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Order {
    Ascending,
    Descending,
}

/// One table request: a conjunction of column predicates, an optional
/// embed/column list, ordering, and a row limit.
#[derive(Debug, Clone, Default)]
pub struct Query {
    select: Option<String>,
    filters: Vec<(String, String)>,
    order: Option<(String, Order)>,
    limit: Option<u32>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    /// Columns to return, including foreign-table embeds, e.g.
    /// `"*,profiles(username,avatar_url)"`.
    pub fn select(mut self, columns: &str) -> Self {
        self.select = Some(columns.to_string());
        self
    }

    pub fn eq(mut self, column: &str, value: impl ToString) -> Self {
        self.filters
            .push((column.to_string(), format!("eq.{}", value.to_string())));
        self
    }

    /// Case-insensitive pattern match, `%` as the wildcard.
    pub fn ilike(mut self, column: &str, pattern: &str) -> Self {
        self.filters
            .push((column.to_string(), format!("ilike.{pattern}")));
        self
    }

    pub fn order(mut self, column: &str, order: Order) -> Self {
        self.order = Some((column.to_string(), order));
        self
    }

    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    fn into_params(self) -> Vec<(String, String)> {
        let mut params = Vec::new();
        if let Some(select) = self.select {
            params.push(("select".to_string(), select));
        }
        for (column, predicate) in self.filters {
            params.push((column, predicate));
        }
        if let Some((column, order)) = self.order {
            let direction = match order {
                Order::Ascending => "asc",
                Order::Descending => "desc",
            };
            params.push(("order".to_string(), format!("{column}.{direction}")));
        }
        if let Some(limit) = self.limit {
            params.push(("limit".to_string(), limit.to_string()));
        }
        params
    }
}

/// Shared HTTP access to the backend. Cheap to clone; all clones share
/// the connection pool and the current bearer token.
#[derive(Clone)]
pub struct Gateway {
    inner: Arc<GatewayInner>,
}

struct GatewayInner {
    http: Client,
    base_url: String,
    publishable_key: String,
    /// Bearer token of the signed-in identity. Written by the session
    /// manager on every transition; absent means requests ride on the
    /// publishable key alone.
    bearer: RwLock<Option<String>>,
}

impl Gateway {
    pub fn new(config: &ClientConfig) -> Self {
        Self {
            inner: Arc::new(GatewayInner {
                http: Client::new(),
                base_url: config.base_url().to_string(),
                publishable_key: config.publishable_key().to_string(),
                bearer: RwLock::new(None),
            }),
        }
    }

    /// Install or clear the signed-in identity's token. Session manager
    /// only.
    pub(crate) fn set_bearer(&self, token: Option<String>) {
        *self.inner.bearer.write().expect("bearer lock poisoned") = token;
    }

    fn bearer(&self) -> Option<String> {
        self.inner.bearer.read().expect("bearer lock poisoned").clone()
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.inner.base_url, table)
    }

    fn auth_url(&self, endpoint: &str) -> String {
        format!("{}/auth/v1/{}", self.inner.base_url, endpoint)
    }

    fn with_headers(&self, request: RequestBuilder) -> RequestBuilder {
        let token = self
            .bearer()
            .unwrap_or_else(|| self.inner.publishable_key.clone());
        request
            .header("apikey", &self.inner.publishable_key)
            .bearer_auth(token)
    }

    // -- Table operations --

    /// Fetch all rows matching the query.
    pub async fn select<T: DeserializeOwned>(
        &self,
        table: &str,
        query: Query,
    ) -> Result<Vec<T>, DataError> {
        debug!(table, "select");
        let response = self
            .with_headers(self.inner.http.get(self.table_url(table)))
            .query(&query.into_params())
            .send()
            .await
            .map_err(transport_error)?;
        read_rows(response).await
    }

    /// Fetch at most one row matching the query. Zero rows is `None`,
    /// not an error; this is the existence probe the relation toggles
    /// are built on.
    pub async fn select_optional<T: DeserializeOwned>(
        &self,
        table: &str,
        query: Query,
    ) -> Result<Option<T>, DataError> {
        let rows = self.select(table, query.limit(1)).await?;
        Ok(rows.into_iter().next())
    }

    /// Insert one row, returning the stored representation with the
    /// requested column/embed list.
    pub async fn insert<T: DeserializeOwned, B: Serialize>(
        &self,
        table: &str,
        row: &B,
        returning: &str,
    ) -> Result<T, DataError> {
        debug!(table, "insert");
        let response = self
            .with_headers(self.inner.http.post(self.table_url(table)))
            .header("Prefer", "return=representation")
            .query(&[("select", returning)])
            .json(row)
            .send()
            .await
            .map_err(transport_error)?;
        let rows: Vec<T> = read_rows(response).await?;
        rows.into_iter().next().ok_or_else(|| {
            DataError::backend("empty_representation", "insert returned no row")
        })
    }

    /// Patch the rows matching the query, returning the first updated
    /// row. A filter that matches nothing is `NotFound`.
    pub async fn update<T: DeserializeOwned, B: Serialize>(
        &self,
        table: &str,
        query: Query,
        patch: &B,
        returning: &str,
    ) -> Result<T, DataError> {
        debug!(table, "update");
        let mut params = query.into_params();
        params.push(("select".to_string(), returning.to_string()));
        let response = self
            .with_headers(self.inner.http.patch(self.table_url(table)))
            .header("Prefer", "return=representation")
            .query(&params)
            .json(patch)
            .send()
            .await
            .map_err(transport_error)?;
        let rows: Vec<T> = read_rows(response).await?;
        rows.into_iter().next().ok_or(DataError::NotFound)
    }

    /// Delete the rows matching the query. A filter that matches
    /// nothing is `NotFound`, so a repeated delete of the same id fails.
    pub async fn delete(&self, table: &str, query: Query) -> Result<(), DataError> {
        debug!(table, "delete");
        let response = self
            .with_headers(self.inner.http.delete(self.table_url(table)))
            .header("Prefer", "return=representation")
            .query(&query.into_params())
            .send()
            .await
            .map_err(transport_error)?;
        let rows: Vec<serde_json::Value> = read_rows(response).await?;
        if rows.is_empty() {
            return Err(DataError::NotFound);
        }
        Ok(())
    }

    // -- Auth operations --

    pub(crate) async fn auth_sign_up(
        &self,
        email: &str,
        password: &str,
        metadata: SignUpMetadata,
    ) -> Result<TokenResponse, AuthError> {
        let body = SignUpRequest {
            email: email.to_string(),
            password: password.to_string(),
            data: metadata,
        };
        let response = self
            .with_headers(self.inner.http.post(self.auth_url("signup")))
            .json(&body)
            .send()
            .await
            .map_err(auth_transport_error)?;
        if !response.status().is_success() {
            return Err(map_auth_error(response, false).await);
        }
        response
            .json()
            .await
            .map_err(|err| AuthError::Unknown(format!("malformed auth response: {err}")))
    }

    pub(crate) async fn auth_password_grant(
        &self,
        email: &str,
        password: &str,
    ) -> Result<TokenResponse, AuthError> {
        let body = PasswordGrantRequest {
            email: email.to_string(),
            password: password.to_string(),
        };
        let response = self
            .with_headers(self.inner.http.post(self.auth_url("token")))
            .query(&[("grant_type", "password")])
            .json(&body)
            .send()
            .await
            .map_err(auth_transport_error)?;
        if !response.status().is_success() {
            return Err(map_auth_error(response, true).await);
        }
        response
            .json()
            .await
            .map_err(|err| AuthError::Unknown(format!("malformed auth response: {err}")))
    }

    /// Look up the identity behind a stored token. An unauthorized
    /// response means the token is stale, which is a signed-out state,
    /// not an error.
    pub(crate) async fn auth_current_user(
        &self,
        token: &str,
    ) -> Result<Option<AuthUser>, AuthError> {
        let response = self
            .inner
            .http
            .get(self.auth_url("user"))
            .header("apikey", &self.inner.publishable_key)
            .bearer_auth(token)
            .send()
            .await
            .map_err(auth_transport_error)?;
        if response.status() == StatusCode::UNAUTHORIZED || response.status() == StatusCode::FORBIDDEN
        {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(map_auth_error(response, false).await);
        }
        let user = response
            .json()
            .await
            .map_err(|err| AuthError::Unknown(format!("malformed auth response: {err}")))?;
        Ok(Some(user))
    }

    pub(crate) async fn auth_logout(&self, token: &str) -> Result<(), AuthError> {
        let response = self
            .inner
            .http
            .post(self.auth_url("logout"))
            .header("apikey", &self.inner.publishable_key)
            .bearer_auth(token)
            .send()
            .await
            .map_err(auth_transport_error)?;
        // A token the backend no longer recognizes is already signed out.
        if response.status() == StatusCode::UNAUTHORIZED {
            return Ok(());
        }
        if !response.status().is_success() {
            return Err(map_auth_error(response, false).await);
        }
        Ok(())
    }
}

fn transport_error(err: reqwest::Error) -> DataError {
    DataError::backend("transport", err.to_string())
}

fn auth_transport_error(err: reqwest::Error) -> AuthError {
    AuthError::Unknown(err.to_string())
}

async fn read_rows<T: DeserializeOwned>(response: Response) -> Result<Vec<T>, DataError> {
    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|err| DataError::backend("transport", err.to_string()))?;
    if !status.is_success() {
        return Err(map_rest_error(status, &body));
    }
    serde_json::from_str(&body).map_err(|err| DataError::backend("decode", err.to_string()))
}

fn map_rest_error(status: StatusCode, body: &str) -> DataError {
    let parsed: RestApiError = serde_json::from_str(body).unwrap_or_default();
    let code = parsed.code.as_deref().unwrap_or("");

    // 42501 is the backend's row-level-security rejection.
    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN || code == "42501" {
        return DataError::PermissionDenied;
    }
    // PGRST116 is "zero rows where one was required".
    if status == StatusCode::NOT_FOUND || code == "PGRST116" {
        return DataError::NotFound;
    }

    DataError::Backend {
        code: if code.is_empty() {
            status.as_u16().to_string()
        } else {
            code.to_string()
        },
        message: parsed
            .message
            .unwrap_or_else(|| "unknown backend error".to_string()),
    }
}

async fn map_auth_error(response: Response, credentials_grant: bool) -> AuthError {
    let status = response.status();
    let parsed: AuthApiError = response.json().await.unwrap_or_default();
    map_auth_failure(status, &parsed, credentials_grant)
}

fn map_auth_failure(status: StatusCode, error: &AuthApiError, credentials_grant: bool) -> AuthError {
    match error.error_code.as_deref() {
        Some("invalid_credentials") | Some("invalid_grant") => {
            return AuthError::InvalidCredentials;
        }
        Some("over_request_rate_limit") | Some("over_email_send_rate_limit") => {
            return AuthError::RateLimited;
        }
        Some("user_already_exists") | Some("email_exists") => {
            return AuthError::EmailAlreadyRegistered;
        }
        Some("weak_password") => return AuthError::WeakPassword,
        Some("validation_failed") => return AuthError::InvalidEmail,
        _ => {}
    }
    if status == StatusCode::TOO_MANY_REQUESTS {
        return AuthError::RateLimited;
    }
    // The password grant reports bad credentials without a stable code
    // on older deployments.
    if credentials_grant
        && (status == StatusCode::BAD_REQUEST || status == StatusCode::UNAUTHORIZED)
    {
        return AuthError::InvalidCredentials;
    }
    AuthError::Unknown(error.text().to_string())
}

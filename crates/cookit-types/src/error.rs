use thiserror::Error;

/// Failures of the authentication lifecycle. Each variant's display
/// string is the user-facing message for that outcome.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("email or password is incorrect")]
    InvalidCredentials,

    #[error("too many attempts, please wait a moment and try again")]
    RateLimited,

    #[error("an account with this email already exists")]
    EmailAlreadyRegistered,

    #[error("password is too weak, use at least 6 characters")]
    WeakPassword,

    #[error("that doesn't look like a valid email address")]
    InvalidEmail,

    #[error("username is already taken, please choose a different one")]
    UsernameTaken,

    /// The identity was created but the paired profile row was not.
    /// The account exists; profile creation is retried on the next
    /// sign-in.
    #[error("account created, but setting up the profile failed: {0}")]
    ProfileCreationFailed(String),

    #[error("authentication failed: {0}")]
    Unknown(String),
}

/// Failures of table reads and writes, surfaced uniformly by the
/// gateway and every domain collection.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DataError {
    #[error("not found")]
    NotFound,

    #[error("permission denied")]
    PermissionDenied,

    #[error("validation failed: {0}")]
    ValidationFailed(String),

    #[error("backend error {code}: {message}")]
    Backend { code: String, message: String },
}

impl DataError {
    pub fn backend(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Backend {
            code: code.into(),
            message: message.into(),
        }
    }
}

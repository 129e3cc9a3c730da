//! Client data/session layer for the CooKit recipe-sharing app: a
//! session manager, a gateway onto the hosted backend's table API, and
//! per-entity domain collections holding the currently loaded rows.
//!
//! The view layer constructs one [`Gateway`] and one [`SessionManager`]
//! at startup, hands clones of both to each collection it needs, and
//! renders from the collections' snapshots:
//!
//! ```no_run
//! # async fn demo() -> anyhow::Result<()> {
//! use cookit_client::collections::{RecipeFeed, RecipeScope};
//! use cookit_client::{ClientConfig, Gateway, SessionManager};
//!
//! let config = ClientConfig::from_env()?;
//! let gateway = Gateway::new(&config);
//! let session = SessionManager::new(gateway.clone());
//! session.resolve_initial(None).await?;
//!
//! let session_handle = session.sign_in("maria@example.com", "secret6").await?;
//! let feed = RecipeFeed::new(gateway.clone(), session.clone());
//! feed.refresh(RecipeScope::ByUser(session_handle.user_id)).await?;
//! # Ok(())
//! # }
//! ```

pub mod collections;
pub mod config;
pub mod gateway;
pub mod session;

pub use config::{ClientConfig, ConfigError};
pub use gateway::{Gateway, Order, Query};
pub use session::{DEFAULT_BIO, SessionEvent, SessionManager, SessionState};

pub use cookit_types as types;

//! # cmdb-server
//!
//! HTTP/JSON front end for the [`cmdb`] store.
//!
//! Every endpoint lives under [`API_PREFIX`]:
//!
//! | Path            | GET                         | POST        | PATCH       | DELETE            |
//! |-----------------|-----------------------------|-------------|-------------|-------------------|
//! | `/all`          | full dump                   |             |             |                   |
//! | `/level`        | list, or one by `?id=`      | `{name}`    | `{id,name}` | `?id=`            |
//! | `/ci`           | filtered search, traversal  | one or many | one or many | `?id=`            |
//! | `/relationship` | filtered search             | one or many |             | by filter         |
//! | `/props`        | property names in use       |             |             |                   |
//!
//! Mutations answer `{"status": "success" | "failure", "message": ...}`.
//! Unknown paths under the prefix are 404, unsupported methods 405, and
//! anything outside the prefix gets an empty 204.
//!
//! ```rust,no_run
//! use cmdb::Cmdb;
//! use std::sync::Arc;
//!
//! # async fn serve() -> Result<(), Box<dyn std::error::Error>> {
//! let cmdb = Arc::new(Cmdb::open("cmdb.bin")?);
//! let listener = tokio::net::TcpListener::bind("127.0.0.1:8080").await?;
//! axum::serve(listener, cmdb_server::router(cmdb)).await?;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod config;
pub mod error;
pub mod payload;
mod routes;

pub use config::ServerConfig;
pub use error::ApiError;
pub use routes::{router, API_PREFIX};

use cmdb::Cmdb;
use std::sync::Arc;

/// Shared handler state.
pub type AppState = Arc<Cmdb>;

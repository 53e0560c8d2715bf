//! HTTP API.
//!
//! Exposes the case-management operations as JSON endpoints under
//! `/api/` and stored uploads under `/media/`. Every route except
//! health and login is protected by the middleware stack:
//! Auth → Audit → Handler.

pub mod endpoints;
pub mod error;
pub mod middleware;
pub mod router;
pub mod server;
pub mod types;

pub use router::api_router;
pub use server::{serve, start_server, ApiServer, ServerSession};
pub use types::ApiContext;

//! HTTP server for judoc.
//!
//! Exposes the chunked object engine over plain HTTP:
//!
//! | Method     | Path                                  | Operation |
//! |------------|---------------------------------------|-----------|
//! | POST / PUT | `/io/{namespace}/{key}`, `/set/{key}` | write     |
//! | GET        | `/io/{namespace}/{key}`, `/get/{key}` | read      |
//! | DELETE     | `/io/{namespace}/{key}`, `/delete/{key}` | delete |
//!
//! Uploads are streamed into the engine block by block and downloads are
//! streamed out as a chunked body, so neither side holds a whole object.
//! Writes and deletes answer `OK`; a missing object is 404 and every other
//! failure is 500 with the error text.

pub mod config;
pub mod error;
pub mod handler;
pub mod router;
pub mod server;

pub use config::{BackendKind, ServerConfig, TlsConfig};
pub use error::{ServerError, ServerResult};
pub use handler::{AppState, HealthResponse};
pub use router::build_router;
pub use server::{connect_store, JudocServer};

//! HTTP client for judoc servers.
//!
//! Issues the three request shapes the server understands: upload (`POST`),
//! download (`GET`) and removal (`DELETE`). A write or delete whose response
//! body is not the literal `OK` is an error, and so is any read that does not
//! answer 200.

pub mod client;
pub mod error;

pub use client::Client;
pub use error::{ClientError, ClientResult};

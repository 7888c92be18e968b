//! Foundation types for judoc.
//!
//! judoc stores arbitrarily large byte streams as fixed-size blocks inside a
//! wide-column row store. This crate defines the vocabulary every other
//! judoc crate shares.
//!
//! # Key Types
//!
//! - [`ObjectKey`] -- `(namespace, key)` address of a stored object
//! - [`BlockId`] -- Identifier of one block row, totally ordered
//! - [`Manifest`] -- Authoritative description of an object's current blocks
//! - [`BlockIndex`] -- How a manifest locates its blocks (listed or scanned)
//! - [`Consistency`] -- Per-row durability/visibility level of the backend

pub mod block;
pub mod consistency;
pub mod error;
pub mod key;
pub mod manifest;

pub use block::BlockId;
pub use consistency::Consistency;
pub use error::TypeError;
pub use key::ObjectKey;
pub use manifest::{BlockIndex, Manifest};

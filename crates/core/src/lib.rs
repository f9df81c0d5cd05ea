//! Domain logic for the Occlusmart backend.
//!
//! Nothing in this crate knows about HTTP. The API crate wires these pieces
//! into handlers.

pub mod analysis;
pub mod error;
pub mod hashing;
pub mod scan;
pub mod types;
pub mod upload;

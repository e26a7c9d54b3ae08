//! Core types: errors, tax ids, packets, tokens, and request context.
//!
//! Everything here is free of I/O; the [`crate::api`] layer builds on it.

mod context;
mod error;
mod invoice_id;
mod packet;
mod token;
mod verhoeff;

pub use context::*;
pub use error::*;
pub use invoice_id::*;
pub use packet::*;
pub use token::*;

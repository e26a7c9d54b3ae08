//! Typed invoice model in the authority's `INVOICE.V01` layout.
//!
//! All monetary values use [`rust_decimal::Decimal`] and are serialized as
//! JSON numbers. Use [`InvoiceBuilder`] to get consistent totals, then
//! [`crate::core::Packet::from_invoice`] to submit.

mod builder;
mod types;

pub use builder::*;
pub use types::*;

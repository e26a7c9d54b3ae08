//! # moadian
//!
//! Client for the Iranian national e-invoicing system (Moadian): tax id
//! generation, signed and encrypted invoice submission, token lifecycle, and
//! the read-only inquiry endpoints.
//!
//! All monetary values use [`rust_decimal::Decimal`]; amounts are whole Rials.
//!
//! ## Quick Start
//!
//! ```rust
//! use chrono::{TimeZone, Utc};
//! use moadian::invoice::*;
//! use moadian::{InvoiceIdGenerator, Packet};
//! use rust_decimal_macros::dec;
//!
//! let ids = InvoiceIdGenerator::new("A11216").unwrap();
//! let issued = Utc.with_ymd_and_hms(2023, 5, 21, 10, 30, 0).unwrap();
//! let taxid = ids.generate(issued, 1).unwrap();
//! assert_eq!(taxid.as_str(), "A1121604C2A00000000010");
//!
//! let invoice = InvoiceBuilder::new(taxid, issued, "14003778990")
//!     .buyer(BuyerType::LegalEntity, "10101010101")
//!     .add_item(ItemBuilder::new("2720000114542", "Consulting", dec!(2), "1627", dec!(150000)).build())
//!     .build()
//!     .unwrap();
//! assert_eq!(invoice.header.tbill, dec!(330000));
//!
//! let packet = Packet::from_invoice(&invoice).unwrap();
//! assert!(packet.canonical_bytes().is_ok());
//! ```
//!
//! Sending requires an [`InvoiceClient`] and a token; see its docs.
//!
//! ## Feature Flags
//!
//! | Feature | Description |
//! |---------|-------------|
//! | `http` (default) | Built-in blocking HTTPS [`api::HttpTransport`] |
//!
//! Without `http`, supply your own [`api::Transport`] to
//! [`InvoiceClientBuilder::transport`].

pub mod api;
pub mod core;
pub mod crypto;
pub mod invoice;

mod client;

pub use client::*;

// Re-export core types at crate root for convenience
pub use crate::core::*;

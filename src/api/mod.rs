//! Talking to the authority: configuration, transport, envelopes, response
//! types, and token lifecycle.
//!
//! [`crate::InvoiceClient`] wires these together; use them directly to plug
//! in a custom [`Transport`] or to inspect exactly what goes on the wire.

mod config;
mod dispatcher;
mod envelope;
mod responses;
mod token_manager;
mod transport;

pub use config::*;
pub use dispatcher::Dispatcher;
pub use envelope::*;
pub use responses::{
    EconomicCodeInfo, FiscalInfo, InquiryResult, PacketReceipt, RemoteMessage, SubmissionAck,
    SyncResponse, SyncResult,
};
pub use token_manager::*;
pub use transport::*;

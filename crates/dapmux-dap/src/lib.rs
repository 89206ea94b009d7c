//! dapmux-dap: Debug Adapter Protocol plumbing for dapmux.
//!
//! Message framing, protocol types, the async request/response client
//! and per-connection event processing. Session semantics live in
//! `dapmux-engine`.

pub mod capabilities;
pub mod client;
pub mod error;
pub mod events;
pub mod pending;
pub mod protocol;
pub mod transport;

// Re-export key types for convenience.
pub use capabilities::DapCapabilities;
pub use client::{ClientOptions, DapClient, PendingResponse};
pub use error::DapError;
pub use events::{
    Dispatch, EventHandler, EventInterceptor, EventProcessor, EventWaiter, SubscriptionId,
    WaitOutcome,
};
pub use protocol::*;
pub use transport::Transport;

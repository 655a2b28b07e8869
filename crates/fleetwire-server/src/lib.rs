//! Streaming Server (C4): accepts long-lived subscriber connections over
//! WebSocket, evaluates per-client filters against every Event Bus event,
//! and pushes only matching events, preserving per-connection order.

mod hub;
mod http;
mod types;

pub use http::{router, serve};
pub use hub::{HealthExtra, StreamingServer, StreamingStats};
pub use types::{
    event_matches, ClientFilter, ClientMessage, ClientSubscriptionView, ConnectionState,
    FilterType, ServerMessage,
};

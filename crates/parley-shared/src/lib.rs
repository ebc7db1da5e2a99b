//! # parley-shared
//!
//! Types shared by every Parley crate: identifier newtypes, the message
//! delivery state machine, the tagged client/server event model, and the
//! protocol constants (heartbeat cadence, TTLs, rate limits).

pub mod constants;
pub mod error;
pub mod events;
pub mod types;

pub use error::ProtocolError;
pub use events::{ClientEvent, ServerEvent};
pub use types::{ConnectionId, DeliveryState, GroupId, MessageId, UserId};

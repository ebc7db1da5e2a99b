//! # parley-coord
//!
//! The shared coordination store: a thin trait over a TTL-capable key-value
//! store plus a pattern pub/sub bus, with a Redis implementation for
//! production and an in-memory fake for tests.
//!
//! Built on top of it are the components every server process shares state
//! through:
//! - **presence directory** (socket mappings + online markers)
//! - **rate limiter** (fixed-window counters)
//! - **unread counters** (per-conversation hashes)
//! - **OTP store** (attempt-limited one-time codes)

pub mod memory;
pub mod otp;
pub mod presence;
pub mod rate_limit;
pub mod redis_store;
pub mod store;
pub mod unread;

mod error;

pub use error::{CoordError, CoordResult};
pub use memory::MemoryCoord;
pub use otp::{OtpOutcome, OtpStore};
pub use presence::PresenceDirectory;
pub use rate_limit::{FailurePolicy, RateLimiter};
pub use redis_store::RedisCoord;
pub use store::{BusMessage, CoordStore, MessageBus};
pub use unread::UnreadCounters;

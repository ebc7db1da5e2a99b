//! # parley-store
//!
//! Interfaces to the durable persistence collaborator. The messaging core
//! never talks to a database directly; it calls these traits, which a
//! deployment backs with its document store. The bundled [`MemoryStore`]
//! implements all of them for tests and single-process development.

pub mod groups;
pub mod memory;
pub mod messages;
pub mod models;
pub mod users;

mod error;

pub use error::{StoreError, StoreResult};
pub use groups::GroupStore;
pub use memory::MemoryStore;
pub use messages::{DeliveryTransition, GroupMessageStore, MessageStore};
pub use models::{Group, StoredGroupMessage, StoredMessage, User};
pub use users::UserStore;

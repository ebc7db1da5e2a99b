//! Message persistence interfaces.

use async_trait::async_trait;

use parley_shared::types::{DeliveryState, MessageId, UserId};

use crate::error::StoreResult;
use crate::models::{StoredGroupMessage, StoredMessage};

/// Outcome of a delivery-state update.
#[derive(Debug, Clone)]
pub struct DeliveryTransition {
    /// The message after the update.
    pub message: StoredMessage,
    /// Whether the state actually advanced. `false` means the transition
    /// was backward or repeated and nothing was written.
    pub changed: bool,
}

#[async_trait]
pub trait MessageStore: Send + Sync {
    async fn create_message(&self, message: &StoredMessage) -> StoreResult<()>;

    /// Advance a message's delivery state. Monotonic and idempotent: a
    /// backward or repeated transition leaves the record untouched and
    /// reports `changed: false`. Unknown ids yield `None` so callers can
    /// treat stray acknowledgments as no-ops.
    async fn advance_delivery_state(
        &self,
        id: MessageId,
        to: DeliveryState,
    ) -> StoreResult<Option<DeliveryTransition>>;

    async fn get_message(&self, id: MessageId) -> StoreResult<Option<StoredMessage>>;
}

#[async_trait]
pub trait GroupMessageStore: Send + Sync {
    async fn create_group_message(&self, message: &StoredGroupMessage) -> StoreResult<()>;

    /// Union `reader` into the message's reader set. Returns whether the
    /// reader was newly added; unknown ids and repeat reads are no-ops.
    async fn add_group_message_reader(
        &self,
        id: MessageId,
        reader: UserId,
    ) -> StoreResult<bool>;

    async fn get_group_message(&self, id: MessageId)
        -> StoreResult<Option<StoredGroupMessage>>;
}

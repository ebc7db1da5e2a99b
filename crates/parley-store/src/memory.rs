//! In-memory implementation of every persistence interface.
//!
//! Backs tests and single-process development; a real deployment swaps in
//! a document-store implementation behind the same traits.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use parley_shared::types::{DeliveryState, GroupId, MessageId, UserId};

use crate::error::StoreResult;
use crate::groups::GroupStore;
use crate::messages::{DeliveryTransition, GroupMessageStore, MessageStore};
use crate::models::{Group, StoredGroupMessage, StoredMessage, User};
use crate::users::UserStore;

#[derive(Default)]
struct Inner {
    users: HashMap<UserId, User>,
    groups: HashMap<GroupId, Group>,
    messages: HashMap<MessageId, StoredMessage>,
    group_messages: HashMap<MessageId, StoredGroupMessage>,
}

#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<RwLock<Inner>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MessageStore for MemoryStore {
    async fn create_message(&self, message: &StoredMessage) -> StoreResult<()> {
        let mut inner = self.inner.write().await;
        inner.messages.insert(message.id, message.clone());
        Ok(())
    }

    async fn advance_delivery_state(
        &self,
        id: MessageId,
        to: DeliveryState,
    ) -> StoreResult<Option<DeliveryTransition>> {
        let mut inner = self.inner.write().await;
        let Some(message) = inner.messages.get_mut(&id) else {
            return Ok(None);
        };

        let changed = message.state.advance(to);
        if changed && to == DeliveryState::Read {
            message.read_at = Some(Utc::now());
        }

        Ok(Some(DeliveryTransition {
            message: message.clone(),
            changed,
        }))
    }

    async fn get_message(&self, id: MessageId) -> StoreResult<Option<StoredMessage>> {
        let inner = self.inner.read().await;
        Ok(inner.messages.get(&id).cloned())
    }
}

#[async_trait]
impl GroupMessageStore for MemoryStore {
    async fn create_group_message(&self, message: &StoredGroupMessage) -> StoreResult<()> {
        let mut inner = self.inner.write().await;
        inner.group_messages.insert(message.id, message.clone());
        Ok(())
    }

    async fn add_group_message_reader(
        &self,
        id: MessageId,
        reader: UserId,
    ) -> StoreResult<bool> {
        let mut inner = self.inner.write().await;
        let Some(message) = inner.group_messages.get_mut(&id) else {
            return Ok(false);
        };
        Ok(message.read_by.insert(reader))
    }

    async fn get_group_message(
        &self,
        id: MessageId,
    ) -> StoreResult<Option<StoredGroupMessage>> {
        let inner = self.inner.read().await;
        Ok(inner.group_messages.get(&id).cloned())
    }
}

#[async_trait]
impl GroupStore for MemoryStore {
    async fn create_group(&self, group: &Group) -> StoreResult<()> {
        let mut inner = self.inner.write().await;
        inner.groups.insert(group.id, group.clone());
        Ok(())
    }

    async fn find_group(&self, id: GroupId) -> StoreResult<Option<Group>> {
        let inner = self.inner.read().await;
        Ok(inner.groups.get(&id).cloned())
    }

    async fn groups_for_member(&self, user: UserId) -> StoreResult<Vec<Group>> {
        let inner = self.inner.read().await;
        Ok(inner
            .groups
            .values()
            .filter(|g| g.is_member(user))
            .cloned()
            .collect())
    }

    async fn remove_member(&self, id: GroupId, user: UserId) -> StoreResult<()> {
        let mut inner = self.inner.write().await;
        if let Some(group) = inner.groups.get_mut(&id) {
            group.members.retain(|m| *m != user);
            group.admins.retain(|a| *a != user);
        }
        Ok(())
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn create_user(&self, user: &User) -> StoreResult<()> {
        let mut inner = self.inner.write().await;
        inner.users.insert(user.id, user.clone());
        Ok(())
    }

    async fn find_user(&self, id: UserId) -> StoreResult<Option<User>> {
        let inner = self.inner.read().await;
        Ok(inner.users.get(&id).cloned())
    }

    async fn find_user_by_mobile(&self, mobile: &str) -> StoreResult<Option<User>> {
        let inner = self.inner.read().await;
        Ok(inner
            .users
            .values()
            .find(|u| u.mobile_number == mobile)
            .cloned())
    }

    async fn touch_last_seen(&self, id: UserId) -> StoreResult<()> {
        let mut inner = self.inner.write().await;
        if let Some(user) = inner.users.get_mut(&id) {
            user.last_seen = Utc::now();
        }
        Ok(())
    }
}

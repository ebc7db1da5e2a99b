//! Group persistence interface.

use async_trait::async_trait;

use parley_shared::types::{GroupId, UserId};

use crate::error::StoreResult;
use crate::models::Group;

#[async_trait]
pub trait GroupStore: Send + Sync {
    async fn create_group(&self, group: &Group) -> StoreResult<()>;

    async fn find_group(&self, id: GroupId) -> StoreResult<Option<Group>>;

    /// Every group the user belongs to.
    async fn groups_for_member(&self, user: UserId) -> StoreResult<Vec<Group>>;

    /// Drop the user from the group's members and admins.
    async fn remove_member(&self, id: GroupId, user: UserId) -> StoreResult<()>;
}

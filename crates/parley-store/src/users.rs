//! User account persistence interface.

use async_trait::async_trait;

use parley_shared::types::UserId;

use crate::error::StoreResult;
use crate::models::User;

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn create_user(&self, user: &User) -> StoreResult<()>;

    async fn find_user(&self, id: UserId) -> StoreResult<Option<User>>;

    async fn find_user_by_mobile(&self, mobile: &str) -> StoreResult<Option<User>>;

    async fn touch_last_seen(&self, id: UserId) -> StoreResult<()>;
}

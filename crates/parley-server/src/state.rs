//! Shared application state.
//!
//! Everything the event handlers need, injected behind traits so tests
//! run the whole gateway against the in-memory store and bus.

use std::sync::Arc;
use std::time::Duration;

use parley_coord::{
    CoordStore, MessageBus, OtpStore, PresenceDirectory, RateLimiter, UnreadCounters,
};
use parley_store::{GroupMessageStore, GroupStore, MessageStore, UserStore};

use crate::auth::{AuthService, SmsSender, TokenKeys};
use crate::config::ServerConfig;
use crate::rooms::RoomRegistry;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServerConfig>,
    pub coord: Arc<dyn CoordStore>,
    pub bus: Arc<dyn MessageBus>,
    pub presence: PresenceDirectory,
    pub limiter: RateLimiter,
    pub unread: UnreadCounters,
    pub rooms: RoomRegistry,
    pub auth: AuthService,
    pub messages: Arc<dyn MessageStore>,
    pub group_messages: Arc<dyn GroupMessageStore>,
    pub groups: Arc<dyn GroupStore>,
    pub users: Arc<dyn UserStore>,
}

/// The persistence collaborator, split by concern.
pub struct Persistence {
    pub messages: Arc<dyn MessageStore>,
    pub group_messages: Arc<dyn GroupMessageStore>,
    pub groups: Arc<dyn GroupStore>,
    pub users: Arc<dyn UserStore>,
}

impl AppState {
    pub fn build(
        config: ServerConfig,
        coord: Arc<dyn CoordStore>,
        bus: Arc<dyn MessageBus>,
        persistence: Persistence,
        sms: Arc<dyn SmsSender>,
    ) -> Self {
        let presence = PresenceDirectory::new(coord.clone());
        let limiter = RateLimiter::new(coord.clone());
        let unread = UnreadCounters::new(coord.clone());
        let keys = TokenKeys::new(
            &config.jwt_secret,
            Duration::from_secs(config.token_ttl_secs),
        );
        let auth = AuthService::new(
            keys,
            OtpStore::new(coord.clone()),
            limiter.clone(),
            persistence.users.clone(),
            sms,
        );

        Self {
            config: Arc::new(config),
            coord,
            bus,
            presence,
            limiter,
            unread,
            rooms: RoomRegistry::new(),
            auth,
            messages: persistence.messages,
            group_messages: persistence.group_messages,
            groups: persistence.groups,
            users: persistence.users,
        }
    }
}

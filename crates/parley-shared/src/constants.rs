/// Interval at which a connected session re-marks its user online.
pub const HEARTBEAT_INTERVAL_SECS: u64 = 10;

/// TTL of the online marker. Must exceed the heartbeat interval by a
/// safety margin so one missed heartbeat does not report offline.
pub const ONLINE_TTL_SECS: u64 = 30;

/// Safety TTL on the socket mapping in case disconnect cleanup never runs.
pub const SOCKET_TTL_SECS: u64 = 86_400;

/// Private messages allowed per user per minute.
pub const PRIVATE_MESSAGE_LIMIT: u64 = 20;
pub const PRIVATE_MESSAGE_WINDOW_SECS: u64 = 60;

/// Group messages allowed per user per minute.
pub const GROUP_MESSAGE_LIMIT: u64 = 30;
pub const GROUP_MESSAGE_WINDOW_SECS: u64 = 60;

/// OTP requests allowed per phone number per hour.
pub const OTP_REQUEST_LIMIT: u64 = 3;
pub const OTP_REQUEST_WINDOW_SECS: u64 = 3_600;

/// How long an issued OTP stays valid.
pub const OTP_TTL_SECS: u64 = 300;

/// Verification attempts before an OTP is invalidated.
pub const OTP_MAX_ATTEMPTS: u32 = 3;

/// Pattern covering every group fan-out channel.
pub const GROUP_CHANNEL_PATTERN: &str = "group:*";

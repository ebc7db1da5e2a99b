//! Authentication: session tokens and the OTP login flow.
//!
//! Token verification is the gateway's credential collaborator: a token
//! that does not verify, or verifies to an unknown identity, never gets a
//! session. OTP issuance is rate limited fail-closed because every code
//! costs an outbound SMS.

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use parley_coord::{FailurePolicy, OtpOutcome, OtpStore, RateLimiter};
use parley_shared::constants::{OTP_REQUEST_LIMIT, OTP_REQUEST_WINDOW_SECS};
use parley_shared::types::UserId;
use parley_store::{User, UserStore};

use crate::error::GatewayError;

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    sub: String,
    iat: i64,
    exp: i64,
}

/// HS256 signing/verification keys for session tokens.
#[derive(Clone)]
pub struct TokenKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
}

impl TokenKeys {
    pub fn new(secret: &str, ttl: Duration) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            ttl,
        }
    }

    pub fn issue(&self, user: UserId) -> Result<String, GatewayError> {
        let now = chrono::Utc::now().timestamp();
        let claims = Claims {
            sub: user.to_string(),
            iat: now,
            exp: now + self.ttl.as_secs() as i64,
        };
        encode(&Header::default(), &claims, &self.encoding)
            .map_err(|_| GatewayError::InvalidCredential)
    }

    /// Verify signature and expiry; malformed, tampered, or expired
    /// tokens all come back as `InvalidCredential`.
    pub fn verify(&self, token: &str) -> Result<UserId, GatewayError> {
        let data = decode::<Claims>(token, &self.decoding, &Validation::default())
            .map_err(|_| GatewayError::InvalidCredential)?;
        UserId::from_str(&data.claims.sub).map_err(|_| GatewayError::InvalidCredential)
    }
}

/// Outbound SMS collaborator.
#[async_trait]
pub trait SmsSender: Send + Sync {
    async fn send_otp(&self, mobile: &str, code: &str) -> Result<(), GatewayError>;
}

/// Development sender: logs instead of dispatching.
pub struct LogSmsSender;

#[async_trait]
impl SmsSender for LogSmsSender {
    async fn send_otp(&self, mobile: &str, code: &str) -> Result<(), GatewayError> {
        info!(mobile = %mobile, code = %code, "OTP issued (log-only SMS sender)");
        Ok(())
    }
}

#[derive(Clone)]
pub struct AuthService {
    keys: TokenKeys,
    otp: OtpStore,
    limiter: RateLimiter,
    users: Arc<dyn UserStore>,
    sms: Arc<dyn SmsSender>,
}

impl AuthService {
    pub fn new(
        keys: TokenKeys,
        otp: OtpStore,
        limiter: RateLimiter,
        users: Arc<dyn UserStore>,
        sms: Arc<dyn SmsSender>,
    ) -> Self {
        Self {
            keys,
            otp,
            limiter,
            users,
            sms,
        }
    }

    /// Issue and deliver a one-time code. Returns the code so development
    /// deployments can surface it in the response.
    pub async fn request_otp(&self, mobile: &str) -> Result<String, GatewayError> {
        if !is_e164(mobile) {
            return Err(GatewayError::BadRequest(
                "Mobile number must be in E.164 format (e.g. +1234567890)".into(),
            ));
        }

        // Fail closed: when the limiter store is down we would rather
        // refuse than send unmetered SMS.
        let allowed = self
            .limiter
            .allow_or(
                mobile,
                "send_otp",
                OTP_REQUEST_LIMIT,
                Duration::from_secs(OTP_REQUEST_WINDOW_SECS),
                FailurePolicy::Closed,
            )
            .await;
        if !allowed {
            return Err(GatewayError::RateLimited);
        }

        let code = rand::thread_rng().gen_range(100_000..1_000_000u32).to_string();
        self.otp.issue(mobile, &code).await?;
        self.sms.send_otp(mobile, &code).await?;

        Ok(code)
    }

    /// Verify a code and log the account in, creating it on first login.
    pub async fn verify_otp(&self, mobile: &str, code: &str) -> Result<(User, String), GatewayError> {
        match self.otp.verify(mobile, code).await? {
            OtpOutcome::Valid => {}
            OtpOutcome::Expired => {
                return Err(GatewayError::BadRequest(
                    "OTP has expired. Please request a new one.".into(),
                ))
            }
            OtpOutcome::Invalid { remaining } => {
                return Err(GatewayError::BadRequest(format!(
                    "Invalid OTP. {remaining} attempts remaining."
                )))
            }
            OtpOutcome::MaxAttempts => {
                return Err(GatewayError::BadRequest(
                    "Maximum attempts exceeded. Please request a new OTP.".into(),
                ))
            }
        }

        let user = match self.users.find_user_by_mobile(mobile).await? {
            Some(user) => {
                self.users.touch_last_seen(user.id).await?;
                user
            }
            None => {
                let user = User::with_mobile(mobile);
                self.users.create_user(&user).await?;
                info!(user = %user.id, "New account created");
                user
            }
        };

        let token = self.keys.issue(user.id)?;
        Ok((user, token))
    }

    /// Resolve a bearer token to a known identity.
    pub async fn authenticate(&self, token: &str) -> Result<UserId, GatewayError> {
        let user = self.keys.verify(token)?;
        match self.users.find_user(user).await {
            Ok(Some(_)) => Ok(user),
            Ok(None) => Err(GatewayError::InvalidCredential),
            Err(e) => {
                warn!(error = %e, "User lookup failed during authentication");
                Err(GatewayError::InvalidCredential)
            }
        }
    }
}

/// `+`-prefixed E.164: first digit 1-9, at most 15 digits total.
fn is_e164(mobile: &str) -> bool {
    let digits = mobile.strip_prefix('+').unwrap_or(mobile);
    if digits.len() < 2 || digits.len() > 15 {
        return false;
    }
    let mut chars = digits.chars();
    matches!(chars.next(), Some('1'..='9')) && chars.all(|c| c.is_ascii_digit())
}

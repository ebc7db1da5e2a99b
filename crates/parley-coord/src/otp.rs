//! One-time passcode storage with attempt limiting.
//!
//! Codes live in the coordination store under a short TTL. Verification
//! is attempt-limited; the stored record is deleted on success or once
//! the attempt cap is hit, so a code can never be brute-forced or reused.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use parley_shared::constants::{OTP_MAX_ATTEMPTS, OTP_TTL_SECS};

use crate::error::CoordResult;
use crate::store::CoordStore;

fn otp_key(mobile: &str) -> String {
    format!("otp:{mobile}")
}

#[derive(Debug, Serialize, Deserialize)]
struct StoredOtp {
    code: String,
    attempts: u32,
}

/// Result of a verification attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OtpOutcome {
    Valid,
    /// No code stored (never issued, expired, or already consumed).
    Expired,
    /// Wrong code; `remaining` further attempts are left.
    Invalid { remaining: u32 },
    /// Attempt cap reached; the code has been invalidated.
    MaxAttempts,
}

#[derive(Clone)]
pub struct OtpStore {
    store: Arc<dyn CoordStore>,
    ttl: Duration,
}

impl OtpStore {
    pub fn new(store: Arc<dyn CoordStore>) -> Self {
        Self {
            store,
            ttl: Duration::from_secs(OTP_TTL_SECS),
        }
    }

    pub async fn issue(&self, mobile: &str, code: &str) -> CoordResult<()> {
        let record = StoredOtp {
            code: code.to_string(),
            attempts: 0,
        };
        self.store
            .set_ex(&otp_key(mobile), &serde_json::to_string(&record)?, self.ttl)
            .await?;
        debug!(mobile = %mobile, "Stored OTP");
        Ok(())
    }

    pub async fn verify(&self, mobile: &str, code: &str) -> CoordResult<OtpOutcome> {
        let key = otp_key(mobile);

        let Some(raw) = self.store.get(&key).await? else {
            return Ok(OtpOutcome::Expired);
        };
        let record: StoredOtp = serde_json::from_str(&raw)?;

        if record.attempts >= OTP_MAX_ATTEMPTS {
            self.store.del(&key).await?;
            return Ok(OtpOutcome::MaxAttempts);
        }

        if record.code != code {
            let updated = StoredOtp {
                code: record.code,
                attempts: record.attempts + 1,
            };
            self.store
                .set_ex(&key, &serde_json::to_string(&updated)?, self.ttl)
                .await?;
            return Ok(OtpOutcome::Invalid {
                remaining: OTP_MAX_ATTEMPTS - 1 - record.attempts,
            });
        }

        self.store.del(&key).await?;
        Ok(OtpOutcome::Valid)
    }
}

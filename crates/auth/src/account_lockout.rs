use crate::error::{AuthError, Result};
use chrono::{DateTime, Duration, Utc};
use sensicity_database::UserRepository;
use sensicity_models::User;
use uuid::Uuid;

/// Longest lock a policy will hand out (one year).
pub const MAX_LOCKOUT_MINUTES: i64 = 365 * 24 * 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockoutPolicy {
    pub max_failed_attempts: i32,
    pub lockout_minutes: i64,
}

impl Default for LockoutPolicy {
    fn default() -> Self {
        Self {
            max_failed_attempts: 5,
            lockout_minutes: 15,
        }
    }
}

impl LockoutPolicy {
    /// Counter value and lock expiry after one more failed attempt.
    pub fn after_failure(
        &self,
        failed_attempts: i32,
        now: DateTime<Utc>,
    ) -> (i32, Option<DateTime<Utc>>) {
        let attempts = failed_attempts.saturating_add(1);
        let locked_until = (attempts >= self.max_failed_attempts).then(|| {
            self.lock_duration()
                .and_then(|d| now.checked_add_signed(d))
                .unwrap_or(DateTime::<Utc>::MAX_UTC)
        });
        (attempts, locked_until)
    }

    fn lock_duration(&self) -> Option<Duration> {
        Duration::try_minutes(self.lockout_minutes.clamp(0, MAX_LOCKOUT_MINUTES))
    }
}

/// Failed-attempt counting and time-boxed locks, kept on the user row.
#[derive(Clone)]
pub struct AccountLockoutService {
    users: UserRepository,
    policy: LockoutPolicy,
}

impl AccountLockoutService {
    pub fn new(users: UserRepository, policy: LockoutPolicy) -> Self {
        Self { users, policy }
    }

    pub fn policy(&self) -> LockoutPolicy {
        self.policy
    }

    /// Reject the attempt if a lock is in force.
    pub fn ensure_not_locked(&self, user: &User, now: DateTime<Utc>) -> Result<()> {
        match user.active_lock(now) {
            Some(locked_until) => Err(AuthError::AccountLocked { locked_until }),
            None => Ok(()),
        }
    }

    /// Count a wrong password; returns the lock expiry when this attempt
    /// reached the threshold.
    pub async fn handle_failed_login(
        &self,
        user: &User,
        now: DateTime<Utc>,
    ) -> Result<Option<DateTime<Utc>>> {
        // An expired lock starts a fresh count
        let previous = if user.locked_until.is_some() && user.active_lock(now).is_none() {
            0
        } else {
            user.failed_login_attempts
        };
        let (attempts, locked_until) = self.policy.after_failure(previous, now);

        self.users
            .record_login_failure(user.id, attempts, locked_until)
            .await?;

        if let Some(until) = locked_until {
            tracing::warn!(
                user_id = %user.id,
                attempts,
                locked_until = %until,
                "Account locked after repeated failed logins"
            );
        } else {
            tracing::info!(user_id = %user.id, attempts, "Failed login attempt");
        }

        Ok(locked_until)
    }

    /// Manually unlock an account (admin action)
    pub async fn unlock_account(&self, user_id: Uuid) -> Result<()> {
        self.users.record_login_failure(user_id, 0, None).await?;
        tracing::info!(user_id = %user_id, "Account unlocked");
        Ok(())
    }
}

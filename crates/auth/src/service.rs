use crate::account_lockout::{AccountLockoutService, LockoutPolicy};
use crate::config::AuthConfig;
use crate::error::{AuthError, Result};
use crate::password::PasswordHasher;
use crate::session::{Session, SessionStore};
use chrono::Utc;
use sensicity_authz::{AuthzError, PermissionEvaluator, PermissionPolicy};
use sensicity_database::{AuditRepository, DatabaseError, SharedStore, UserRepository};
use sensicity_models::{AuditLogBuilder, NewUser, User, UserStatus};
use serde::Deserialize;
use std::sync::Arc;
use validator::Validate;

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 1))]
    pub password: String,
}

impl LoginRequest {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into().trim().to_string(),
            password: password.into(),
        }
    }
}

/// Login, logout and session restore on top of the entity store.
#[derive(Clone)]
pub struct AuthService {
    users: UserRepository,
    audit: AuditRepository,
    evaluator: PermissionEvaluator,
    lockout: AccountLockoutService,
    sessions: Arc<dyn SessionStore>,
    hasher: PasswordHasher,
    config: AuthConfig,
}

impl AuthService {
    pub fn new(store: SharedStore, sessions: Arc<dyn SessionStore>, config: AuthConfig) -> Self {
        let policy = if config.demo_mode {
            PermissionPolicy::Demo
        } else {
            PermissionPolicy::Strict
        };
        let users = UserRepository::new(store.clone());

        Self {
            lockout: AccountLockoutService::new(
                users.clone(),
                LockoutPolicy {
                    max_failed_attempts: config.max_failed_attempts,
                    lockout_minutes: config.lockout_minutes,
                },
            ),
            users,
            audit: AuditRepository::new(store.clone()),
            evaluator: PermissionEvaluator::new(store, policy),
            sessions,
            hasher: PasswordHasher::new(config.password_min_length),
            config,
        }
    }

    pub fn evaluator(&self) -> &PermissionEvaluator {
        &self.evaluator
    }

    pub fn hasher(&self) -> &PasswordHasher {
        &self.hasher
    }

    pub fn lockout(&self) -> &AccountLockoutService {
        &self.lockout
    }

    /// Login with email and password
    pub async fn login(&self, request: LoginRequest) -> Result<Session> {
        request.validate()?;

        // Find user
        let user = match self.users.find_by_email(&request.email).await {
            Ok(user) => user,
            Err(DatabaseError::NotFound(_)) => match self.provision_demo_user(&request).await? {
                Some(user) => user,
                None => return Err(AuthError::InvalidCredentials),
            },
            Err(e) => return Err(e.into()),
        };

        let now = Utc::now();
        self.lockout.ensure_not_locked(&user, now)?;

        if !user.can_sign_in() {
            return Err(AuthError::UserInactive);
        }

        // Verify password
        let password_hash = user
            .password_hash
            .as_deref()
            .ok_or(AuthError::InvalidCredentials)?;

        if !PasswordHasher::verify(&request.password, password_hash)? {
            let locked_until = self.lockout.handle_failed_login(&user, now).await?;
            self.record_audit(
                AuditLogBuilder::new("auth.login", "user", user.id.to_string())
                    .actor(Some(user.id))
                    .failure("invalid credentials"),
            )
            .await;

            return Err(match locked_until {
                Some(locked_until) => AuthError::AccountLocked { locked_until },
                None => AuthError::InvalidCredentials,
            });
        }

        // Identity confirmed; nothing below may leave a half-open session
        match self.establish(&user, &request.password).await {
            Ok(session) => {
                tracing::info!(user_id = %user.id, permissions = session.permissions().len(), "User logged in");
                Ok(session)
            }
            Err(e) => {
                tracing::error!(user_id = %user.id, error = %e, "Login aborted after password check");
                if let Err(clear_err) = self.sessions.clear().await {
                    tracing::warn!(error = %clear_err, "Failed to clear session mirror");
                }
                Err(e)
            }
        }
    }

    async fn establish(&self, user: &User, password: &str) -> Result<Session> {
        let (_, permissions) = self.evaluator.load_user(user.id).await?;
        let user = self.users.record_login_success(user.id, Utc::now()).await?;

        let session = Session::new(user.clone().into(), permissions);
        self.sessions.save(&session.mirror()).await?;

        if user.password_hash.as_deref().map_or(false, PasswordHasher::needs_rehash) {
            self.upgrade_hash(&user, password).await;
        }

        self.record_audit(
            AuditLogBuilder::new("auth.login", "user", user.id.to_string()).actor(Some(user.id)),
        )
        .await;

        Ok(session)
    }

    /// Clears the persisted mirror. The session is consumed.
    pub async fn logout(&self, session: Session) -> Result<()> {
        self.sessions.clear().await?;
        self.record_audit(
            AuditLogBuilder::new("auth.logout", "user", session.user_id().to_string())
                .actor(Some(session.user_id())),
        )
        .await;
        tracing::info!(user_id = %session.user_id(), "User logged out");
        Ok(())
    }

    /// Rebuild the session recorded in the local mirror, if it is still valid.
    pub async fn restore(&self) -> Result<Option<Session>> {
        let mirror = match self.sessions.load().await? {
            Some(mirror) => mirror,
            None => return Ok(None),
        };

        match self.evaluator.load_user(mirror.user_id).await {
            Ok((user, permissions)) if user.status == UserStatus::Active && user.is_active => {
                tracing::debug!(user_id = %user.id, "Session restored");
                Ok(Some(Session::new(user, permissions)))
            }
            Ok(_) | Err(AuthzError::NotFound(_)) => {
                tracing::info!(user_id = %mirror.user_id, "Discarding stale session mirror");
                self.sessions.clear().await?;
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }

    pub async fn refresh(&self, session: &mut Session) -> Result<()> {
        session.refresh(&self.evaluator).await
    }

    /// Create the configured demo account on its first login. Only in demo
    /// mode, and only with the configured demo credentials.
    async fn provision_demo_user(&self, request: &LoginRequest) -> Result<Option<User>> {
        if !self.config.demo_mode
            || !request.email.eq_ignore_ascii_case(&self.config.demo_email)
            || request.password != self.config.demo_password
        {
            return Ok(None);
        }

        // Other casings of the demo address resolve to the one canonical account
        match self.users.find_by_email(&self.config.demo_email).await {
            Ok(user) => return Ok(Some(user)),
            Err(DatabaseError::NotFound(_)) => {}
            Err(e) => return Err(e.into()),
        }

        tracing::warn!(email = %self.config.demo_email, "Demo mode: provisioning the demo account");
        let new_user = NewUser {
            first_name: "Demo".to_string(),
            last_name: "Administrator".to_string(),
            email: self.config.demo_email.clone(),
            phone: None,
            department: None,
            role_id: None,
            status: UserStatus::Active,
            is_active: true,
            email_verified: true,
        };
        let hash = PasswordHasher::digest(&request.password)?;
        let user = self.users.create(&new_user, Some(&hash)).await?;

        self.record_audit(
            AuditLogBuilder::new("user.create", "user", user.id.to_string())
                .new_values(&sensicity_models::UserProfile::from(user.clone())),
        )
        .await;
        Ok(Some(user))
    }

    async fn upgrade_hash(&self, user: &User, password: &str) {
        let result = match PasswordHasher::digest(password) {
            Ok(hash) => self.users.update_password(user.id, &hash).await.map_err(AuthError::from),
            Err(e) => Err(e),
        };
        match result {
            Ok(()) => tracing::info!(user_id = %user.id, "Password hash upgraded to Argon2id"),
            Err(e) => tracing::warn!(user_id = %user.id, error = %e, "Password hash upgrade failed"),
        }
    }

    async fn record_audit(&self, builder: AuditLogBuilder) {
        if let Err(e) = self.audit.create(&builder.build()).await {
            tracing::warn!(error = %e, "Failed to write audit log");
        }
    }
}

use crate::account_lockout::MAX_LOCKOUT_MINUTES;

/// Login, lockout and demo-mode settings.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// Grants every authenticated user the whole permission catalog and
    /// provisions the demo account on first use. Never on by default.
    pub demo_mode: bool,
    pub demo_email: String,
    pub demo_password: String,
    pub max_failed_attempts: i32,
    pub lockout_minutes: i64,
    pub password_min_length: usize,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            demo_mode: false,
            demo_email: "admin@sensicity.fr".to_string(),
            demo_password: "admin123".to_string(),
            max_failed_attempts: 5,
            lockout_minutes: 15,
            password_min_length: 8,
        }
    }
}

impl AuthConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            demo_mode: std::env::var("SENSICITY_DEMO_MODE")
                .map(|v| v.eq_ignore_ascii_case("true") || v == "1")
                .unwrap_or(defaults.demo_mode),
            demo_email: std::env::var("SENSICITY_DEMO_EMAIL").unwrap_or(defaults.demo_email),
            demo_password: std::env::var("SENSICITY_DEMO_PASSWORD")
                .unwrap_or(defaults.demo_password),
            max_failed_attempts: std::env::var("AUTH_MAX_FAILED_ATTEMPTS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.max_failed_attempts),
            lockout_minutes: std::env::var("AUTH_LOCKOUT_MINUTES")
                .ok()
                .and_then(|v| v.parse::<i64>().ok())
                .map(|m| m.clamp(0, MAX_LOCKOUT_MINUTES))
                .unwrap_or(defaults.lockout_minutes),
            password_min_length: std::env::var("PASSWORD_MIN_LENGTH")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.password_min_length),
        }
    }
}

use crate::error::{AuthError, Result};
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher as _, PasswordVerifier, SaltString},
    Argon2,
};
use rand::seq::SliceRandom;
use rand::Rng;

const TEMPORARY_PASSWORD_LENGTH: usize = 14;

#[derive(Debug, Clone)]
pub struct PasswordHasher {
    min_length: usize,
}

impl Default for PasswordHasher {
    fn default() -> Self {
        Self { min_length: 8 }
    }
}

impl PasswordHasher {
    pub fn new(min_length: usize) -> Self {
        Self { min_length }
    }

    /// Hash a password using Argon2id
    pub fn hash(&self, password: &str) -> Result<String> {
        self.validate_password(password)?;
        Self::digest(password)
    }

    /// Argon2id digest without the strength rules. Used to upgrade hashes of
    /// passwords chosen before the rules applied.
    pub(crate) fn digest(password: &str) -> Result<String> {
        let salt = SaltString::generate(&mut OsRng);
        let argon2 = Argon2::default();

        let password_hash = argon2
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| AuthError::PasswordHashError(e.to_string()))?
            .to_string();

        Ok(password_hash)
    }

    /// Verify a password against a hash. Legacy bcrypt hashes (`$2a$`,
    /// `$2b$`, `$2y$`) are still accepted.
    pub fn verify(password: &str, hash: &str) -> Result<bool> {
        if hash.starts_with("$2") {
            return Ok(bcrypt::verify(password, hash)?);
        }

        let parsed_hash = PasswordHash::new(hash)
            .map_err(|e| AuthError::PasswordHashError(e.to_string()))?;

        let argon2 = Argon2::default();

        match argon2.verify_password(password.as_bytes(), &parsed_hash) {
            Ok(_) => Ok(true),
            Err(argon2::password_hash::Error::Password) => Ok(false),
            Err(e) => Err(AuthError::PasswordHashError(e.to_string())),
        }
    }

    /// Validate password strength
    pub fn validate_password(&self, password: &str) -> Result<()> {
        if password.chars().count() < self.min_length {
            return Err(AuthError::WeakPassword(format!(
                "Password must be at least {} characters",
                self.min_length
            )));
        }

        if !password.chars().any(|c| c.is_uppercase()) {
            return Err(AuthError::WeakPassword(
                "Password must contain at least one uppercase letter".to_string(),
            ));
        }

        if !password.chars().any(|c| c.is_lowercase()) {
            return Err(AuthError::WeakPassword(
                "Password must contain at least one lowercase letter".to_string(),
            ));
        }

        if !password.chars().any(|c| c.is_numeric()) {
            return Err(AuthError::WeakPassword(
                "Password must contain at least one number".to_string(),
            ));
        }

        Ok(())
    }

    /// Anything that is not Argon2id gets rehashed at the next login.
    pub fn needs_rehash(hash: &str) -> bool {
        let parsed_hash = match PasswordHash::new(hash) {
            Ok(h) => h,
            Err(_) => return true,
        };

        parsed_hash.algorithm != argon2::Algorithm::Argon2id.ident()
    }

    /// Random password handed to a newly created user. Always satisfies the
    /// strength rules.
    pub fn generate_temporary(&self) -> String {
        const UPPER: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ";
        const LOWER: &[u8] = b"abcdefghijkmnopqrstuvwxyz";
        const DIGITS: &[u8] = b"23456789";
        const SYMBOLS: &[u8] = b"!@#$%*-_";

        let mut rng = rand::thread_rng();
        let length = self.min_length.max(TEMPORARY_PASSWORD_LENGTH);
        let pick = |rng: &mut rand::rngs::ThreadRng, set: &[u8]| set[rng.gen_range(0..set.len())];

        let mut chars = vec![
            pick(&mut rng, UPPER),
            pick(&mut rng, LOWER),
            pick(&mut rng, DIGITS),
            pick(&mut rng, SYMBOLS),
        ];
        let all: Vec<u8> = [UPPER, LOWER, DIGITS, SYMBOLS].concat();
        while chars.len() < length {
            chars.push(pick(&mut rng, &all));
        }
        chars.shuffle(&mut rng);

        chars.into_iter().map(char::from).collect()
    }
}

use argon2::{
    Algorithm, Argon2, Params, PasswordHash, PasswordHasher, PasswordVerifier, Version,
    password_hash::SaltString,
};
use rand_core::OsRng;

use chirpy_types::error::{Error, Result};

const PLACEHOLDER_PASSWORD: &str = "chirpy-placeholder";

/// Argon2id cost knobs. Defaults follow the argon2 crate (19 MiB, 2 passes, 1 lane).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PasswordParams {
    pub memory_kib: u32,
    pub iterations: u32,
    pub parallelism: u32,
}

impl Default for PasswordParams {
    fn default() -> Self {
        Self {
            memory_kib: Params::DEFAULT_M_COST,
            iterations: Params::DEFAULT_T_COST,
            parallelism: Params::DEFAULT_P_COST,
        }
    }
}

/// Password hashing. The only place that knows which algorithm is in use.
#[derive(Clone)]
pub struct Credentials {
    argon2: Argon2<'static>,
    // Verified against when there is no stored hash, so a missing account
    // costs the same as a wrong password.
    placeholder: Vec<u8>,
}

impl Credentials {
    pub fn new(params: PasswordParams) -> Result<Self> {
        let params = Params::new(
            params.memory_kib,
            params.iterations,
            params.parallelism,
            None,
        )
        .map_err(|e| Error::internal(format!("invalid argon2 parameters: {}", e)))?;

        let mut credentials = Self {
            argon2: Argon2::new(Algorithm::Argon2id, Version::V0x13, params),
            placeholder: Vec::new(),
        };
        credentials.placeholder = credentials.hash(PLACEHOLDER_PASSWORD)?;
        Ok(credentials)
    }

    /// Salted Argon2id hash in PHC string form, returned as bytes.
    pub fn hash(&self, plaintext: &str) -> Result<Vec<u8>> {
        let salt = SaltString::generate(&mut OsRng);
        let hash = self
            .argon2
            .hash_password(plaintext.as_bytes(), &salt)
            .map_err(|e| Error::internal(format!("password hashing failed: {}", e)))?;
        Ok(hash.to_string().into_bytes())
    }

    /// `false` for a wrong password and for an unreadable hash alike.
    pub fn verify(&self, plaintext: &str, hash: &[u8]) -> bool {
        let Ok(encoded) = std::str::from_utf8(hash) else {
            return false;
        };
        let Ok(parsed) = PasswordHash::new(encoded) else {
            return false;
        };
        self.argon2
            .verify_password(plaintext.as_bytes(), &parsed)
            .is_ok()
    }

    /// Spend one full verification on the placeholder hash. Always `false`.
    pub fn verify_missing(&self, plaintext: &str) -> bool {
        let _ = self.verify(plaintext, &self.placeholder);
        false
    }
}

use constant_time_eq::constant_time_eq;
use sha2::{Digest, Sha256};

/// Password assigned to seeded accounts that carry no credential column.
pub const DEFAULT_PASSWORD: &str = "password";

/// One-way hashing for stored account passwords.
pub trait CredentialHasher: Send + Sync {
    fn hash(&self, password: &str) -> String;

    fn verify(&self, password: &str, stored_hash: &str) -> bool {
        constant_time_eq(self.hash(password).as_bytes(), stored_hash.as_bytes())
    }
}

/// Lower-case hex SHA-256 digest.
#[derive(Debug, Clone, Copy, Default)]
pub struct Sha256Hasher;

impl CredentialHasher for Sha256Hasher {
    fn hash(&self, password: &str) -> String {
        hex::encode(Sha256::digest(password.as_bytes()))
    }
}

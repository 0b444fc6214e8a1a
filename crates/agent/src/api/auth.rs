#![forbid(unsafe_code)]

/// Narrow seam for password checks. Richer auth flows (sessions, lockouts)
/// live outside the engine.
pub trait PasswordVerifier: Send + Sync {
    fn has_password(&self) -> bool;

    /// True when `password` matches the configured secret. A verifier with no
    /// configured secret accepts anything.
    fn verify(&self, password: &str) -> bool;
}

/// Compares against a stored hex-encoded blake3 digest.
#[derive(Debug, Clone, Default)]
pub struct StoredHashVerifier {
    hash: Option<String>,
}

impl StoredHashVerifier {
    pub fn new(hash: Option<String>) -> Self {
        Self { hash }
    }

    /// Hex digest for storing a freshly chosen password.
    pub fn digest(password: &str) -> String {
        blake3::hash(password.as_bytes()).to_hex().to_string()
    }
}

impl PasswordVerifier for StoredHashVerifier {
    fn has_password(&self) -> bool {
        self.hash.is_some()
    }

    fn verify(&self, password: &str) -> bool {
        let Some(stored) = &self.hash else {
            return true;
        };
        match blake3::Hash::from_hex(stored) {
            // Hash equality is constant-time.
            Ok(stored) => blake3::hash(password.as_bytes()) == stored,
            Err(_) => false,
        }
    }
}

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct Auth {
    /// Hex-encoded blake3 digest of the administrator password. When unset,
    /// password-gated operations are open.
    pub password_hash: Option<String>,
}

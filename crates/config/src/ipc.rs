use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Ipc {
    /// Address the control server listens on. Loopback only; the protocol
    /// carries no transport-level authentication.
    pub listen_addr: String,
}

impl Default for Ipc {
    fn default() -> Self {
        Self {
            listen_addr: "127.0.0.1:48732".to_string(),
        }
    }
}

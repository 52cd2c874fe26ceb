use serde::{Deserialize, Serialize};

/// Network identity of one resolved instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceRecord {
    /// Provider-assigned instance ID (e.g. `i-096b191e5f3c0e94e`).
    pub identifier: String,
    /// Public IPv4 address or hostname. Empty when the provider reported none.
    pub public_address: String,
    /// Private (VPC) address. Empty when the provider reported none.
    pub private_address: String,
}

impl InstanceRecord {
    pub fn new(identifier: &str, public_address: &str, private_address: &str) -> Self {
        InstanceRecord {
            identifier: identifier.to_string(),
            public_address: public_address.to_string(),
            private_address: private_address.to_string(),
        }
    }
}

mod auction_request;
mod blinded_block;
mod builder_bid;
mod execution_payload;
mod primitives;
mod registration;

pub use auction_request::*;
pub use blinded_block::*;
pub use builder_bid::*;
pub use execution_payload::*;
pub use primitives::*;
pub use registration::*;

use serde::{Deserialize, Serialize};
use std::fmt;

pub type Slot = u64;

/// Fork versions this service recognizes on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Fork {
    Capella,
    Deneb,
}

impl fmt::Display for Fork {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Capella => write!(f, "capella"),
            Self::Deneb => write!(f, "deneb"),
        }
    }
}

/// Envelope used by the builder APIs: a fork tag next to the payload it
/// describes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VersionedValue<T> {
    pub version: Fork,
    pub data: T,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fork_wire_names() {
        assert_eq!(serde_json::to_string(&Fork::Deneb).unwrap(), "\"deneb\"");
        assert_eq!(serde_json::from_str::<Fork>("\"capella\"").unwrap(), Fork::Capella);
        assert!(serde_json::from_str::<Fork>("\"electra\"").is_err());
    }
}

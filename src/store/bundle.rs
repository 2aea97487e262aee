//! Versioned export bundle

use crate::error::{Result, SimError};
use crate::store::StoreState;
use crate::types::Timestamp;
use serde::{Deserialize, Serialize};

/// Current bundle schema version
pub const BUNDLE_VERSION: u32 = 1;

/// Portable copy of all stored collections
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateBundle {
    pub version: u32,
    pub exported_at: Timestamp,
    #[serde(flatten)]
    pub state: StoreState,
}

impl StateBundle {
    pub fn new(state: StoreState, exported_at: Timestamp) -> Self {
        Self {
            version: BUNDLE_VERSION,
            exported_at,
            state,
        }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(contents: &str) -> Result<Self> {
        Ok(serde_json::from_str(contents)?)
    }

    /// Unwrap the collections, rejecting unknown versions.
    ///
    /// The order counter is raised above every contained order id.
    pub fn into_state(self) -> Result<StoreState> {
        if self.version != BUNDLE_VERSION {
            return Err(SimError::UnsupportedBundleVersion {
                found: self.version,
                expected: BUNDLE_VERSION,
            });
        }
        let mut state = self.state;
        state.next_order_id = state.next_order_id.max(state.min_next_order_id());
        Ok(state)
    }
}

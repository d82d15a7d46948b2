use relink_core::AttachMode;
use serde::{Deserialize, Serialize};

/// Per-call settings of the batch driver.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtendOptions {
    /// Write associations into the caller's items instead of copies.
    pub mutate: bool,
}

impl ExtendOptions {
    pub fn mutating() -> Self {
        Self { mutate: true }
    }

    pub fn attach_mode(&self) -> AttachMode {
        if self.mutate {
            AttachMode::InPlace
        } else {
            AttachMode::Copy
        }
    }
}

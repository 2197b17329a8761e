// Path: crates/types/src/component.rs

//! The fixed set of long-lived process components and their identity bindings.

use serde::{Deserialize, Serialize};

/// Identifies one of the two cooperating server processes.
///
/// The component name determines the leaf-certificate filenames under the
/// certs directory and the peer-identity assertion applied during mTLS
/// verification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Component {
    /// The authoritative game core process.
    Core,
    /// The user-facing connection gateway process.
    Gateway,
}

impl Component {
    /// The canonical lowercase name, used in logs, RPC payloads, and filenames.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Core => "core",
            Self::Gateway => "gateway",
        }
    }

    /// The component on the far side of the core/gateway RPC link.
    pub fn peer(&self) -> Component {
        match self {
            Self::Core => Self::Gateway,
            Self::Gateway => Self::Core,
        }
    }

    /// Filename of this component's leaf certificate within the certs directory.
    pub fn cert_file(&self) -> String {
        format!("{}.crt", self.name())
    }

    /// Filename of this component's leaf private key within the certs directory.
    pub fn key_file(&self) -> String {
        format!("{}.key", self.name())
    }
}

impl std::fmt::Display for Component {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl std::str::FromStr for Component {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "core" => Ok(Self::Core),
            "gateway" => Ok(Self::Gateway),
            other => Err(format!("unknown component: {other}")),
        }
    }
}

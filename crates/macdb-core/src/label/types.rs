//! Label value types.

use std::fmt;
use std::num::NonZeroU32;

use serde::{Deserialize, Serialize};

/// Opaque label text understood by the policy authority.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SecurityLabel(String);

impl SecurityLabel {
    pub fn new(text: impl Into<String>) -> Self {
        Self(text.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for SecurityLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for SecurityLabel {
    fn from(text: String) -> Self {
        Self(text)
    }
}

impl From<&str> for SecurityLabel {
    fn from(text: &str) -> Self {
        Self(text.to_string())
    }
}

impl AsRef<str> for SecurityLabel {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Compact identifier standing for one label.
///
/// Ids are non-zero and fit in 24 bits so an object id can be packed into
/// an access-vector key next to a full 32-bit subject id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LabelId(NonZeroU32);

impl LabelId {
    /// Largest id the registry will issue.
    pub const MAX: u32 = (1 << 24) - 1;

    /// Wrap a raw id; `None` for zero or values beyond [`LabelId::MAX`].
    pub fn new(raw: u32) -> Option<Self> {
        if raw > Self::MAX {
            return None;
        }
        NonZeroU32::new(raw).map(Self)
    }

    /// Wrap a raw id coming from SQL, where integers are signed.
    pub fn from_i64(raw: i64) -> Option<Self> {
        u32::try_from(raw).ok().and_then(Self::new)
    }

    pub fn get(self) -> u32 {
        self.0.get()
    }

    pub(crate) fn to_bytes(self) -> [u8; 4] {
        self.get().to_be_bytes()
    }

    pub(crate) fn from_bytes(bytes: &[u8]) -> Option<Self> {
        let raw: [u8; 4] = bytes.get(..4)?.try_into().ok()?;
        Self::new(u32::from_be_bytes(raw))
    }
}

impl fmt::Display for LabelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

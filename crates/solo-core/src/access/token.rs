//! Holder tokens.

use std::fmt;
use uuid::Uuid;

/// Opaque proof of the current exclusive right to use the resource.
///
/// Minted from a random v4 UUID, so tokens are unguessable and never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HolderToken(Uuid);

impl HolderToken {
    pub fn mint() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn parse(s: &str) -> Option<Self> {
        Uuid::parse_str(s).ok().map(Self)
    }
}

impl fmt::Display for HolderToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.simple())
    }
}

//! Credential table for `/login`.

use solo_core::{Result, SoloError};
use std::collections::HashMap;
use std::path::Path;

/// Login → password table supplied at startup.
#[derive(Clone, Default)]
pub struct Credentials {
    table: HashMap<String, String>,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut logins: Vec<&str> = self.table.keys().map(String::as_str).collect();
        logins.sort_unstable();
        f.debug_struct("Credentials").field("logins", &logins).finish()
    }
}

impl Credentials {
    pub fn new(table: HashMap<String, String>) -> Self {
        Self { table }
    }

    /// Load a JSON object mapping each login to its password.
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| SoloError::Io {
            message: format!("failed to read credentials {}: {}", path.display(), e),
            source: Some(e),
        })?;
        Self::from_json(&text)
    }

    pub fn from_json(text: &str) -> Result<Self> {
        let table: HashMap<String, String> = serde_json::from_str(text)?;
        Ok(Self { table })
    }

    /// Check a login/password pair. Unknown logins never match.
    pub fn verify(&self, login: &str, password: &str) -> bool {
        match self.table.get(login) {
            Some(expected) => constant_time_eq(expected.as_bytes(), password.as_bytes()),
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }
}

/// Compare without short-circuiting on the first differing byte.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut diff: u8 = 0;
    for (x, y) in a.iter().zip(b) {
        diff |= x ^ y;
    }
    diff == 0
}

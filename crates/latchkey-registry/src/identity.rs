//! Identity records stored in the registry.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{RegistryError, Result};

/// Privilege class of a principal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IdentityRole {
    /// Privileged operator principal.
    Root,
    /// Ordinary user.
    Person,
}

impl IdentityRole {
    pub fn as_str(self) -> &'static str {
        match self {
            IdentityRole::Root => "ROOT",
            IdentityRole::Person => "PERSON",
        }
    }
}

impl fmt::Display for IdentityRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for IdentityRole {
    type Err = RegistryError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_uppercase().as_str() {
            "ROOT" => Ok(IdentityRole::Root),
            "PERSON" => Ok(IdentityRole::Person),
            other => Err(RegistryError::InvalidData(format!(
                "unknown identity role: {other}"
            ))),
        }
    }
}

/// The identity a registered public key resolves to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Identity {
    pub email: String,
    pub name: String,
    pub role: IdentityRole,
}

impl Identity {
    pub fn new(email: impl Into<String>, name: impl Into<String>, role: IdentityRole) -> Self {
        Self {
            email: email.into(),
            name: name.into(),
            role,
        }
    }

    /// An ordinary user.
    pub fn person(email: impl Into<String>, name: impl Into<String>) -> Self {
        Self::new(email, name, IdentityRole::Person)
    }

    /// A privileged operator.
    pub fn root(email: impl Into<String>, name: impl Into<String>) -> Self {
        Self::new(email, name, IdentityRole::Root)
    }

    pub fn is_root(&self) -> bool {
        self.role == IdentityRole::Root
    }

    /// CBOR encoding stored as the registry value.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        ciborium::into_writer(self, &mut buf)
            .map_err(|e| RegistryError::Serialization(e.to_string()))?;
        Ok(buf)
    }

    /// Decode a stored registry value.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        ciborium::from_reader(bytes).map_err(|e| RegistryError::Serialization(e.to_string()))
    }
}

/// One registry entry: a public key and the identity it maps to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryEntry {
    /// DER SubjectPublicKeyInfo bytes.
    pub key: Vec<u8>,
    pub identity: Identity,
}

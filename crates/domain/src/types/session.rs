//! Session credentials and authentication bookkeeping

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_with::base64::Base64;
use serde_with::serde_as;

/// Opaque credential material for the linked device.
///
/// The transport hands out credentials as a set of named files; they are kept
/// together and always copied as one unit.
#[serde_as]
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionMaterial {
    #[serde_as(as = "BTreeMap<_, Base64>")]
    files: BTreeMap<String, Vec<u8>>,
}

impl SessionMaterial {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_files<I, K>(files: I) -> Self
    where
        I: IntoIterator<Item = (K, Vec<u8>)>,
        K: Into<String>,
    {
        Self { files: files.into_iter().map(|(name, bytes)| (name.into(), bytes)).collect() }
    }

    pub fn insert(&mut self, name: impl Into<String>, bytes: Vec<u8>) {
        self.files.insert(name.into(), bytes);
    }

    pub fn get(&self, name: &str) -> Option<&[u8]> {
        self.files.get(name).map(Vec::as_slice)
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn file_names(&self) -> impl Iterator<Item = &str> {
        self.files.keys().map(String::as_str)
    }

    pub fn files(&self) -> &BTreeMap<String, Vec<u8>> {
        &self.files
    }

    /// Apply a credential rotation: updated files replace existing ones.
    pub fn merge(&mut self, update: SessionMaterial) {
        self.files.extend(update.files);
    }

    pub fn clear(&mut self) {
        self.files.clear();
    }
}

// Credential bytes never reach the logs.
impl fmt::Debug for SessionMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.files.iter().map(|(name, bytes)| (name, bytes.len()))).finish()
    }
}

/// Durable record of the last successful authentication.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthTimestampRecord {
    pub timestamp: DateTime<Utc>,
}

/// Snapshot answer to "should the operator relink soon?".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthStatus {
    pub last_authenticated: Option<DateTime<Utc>>,
    pub days_since: Option<i64>,
    pub refresh_needed: bool,
}

impl AuthStatus {
    /// Status reported when nothing is known about past authentication.
    pub fn unknown() -> Self {
        Self { last_authenticated: None, days_since: None, refresh_needed: true }
    }
}

// SPDX-License-Identifier: MIT OR Apache-2.0

use std::path::{Path, PathBuf};

use pep_access_store::Seed;
use serde::{Deserialize, Serialize};

pub const DEFAULT_DATA_ADMINISTRATOR: &str = "Data Administrator";

pub const DEFAULT_ACCESS_ADMINISTRATOR: &str = "Access Administrator";

/// Configuration for an Access Manager backend.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// User-group managing the data structure. Has implicit access to all participant-groups and
    /// can see the metadata of all column-groups.
    pub(crate) data_administrator: String,

    /// User-group managing the access rules.
    pub(crate) access_administrator: String,

    /// Location of the rule store snapshot. Without a path the store only lives in memory.
    pub(crate) storage_path: Option<PathBuf>,

    /// Content of a fresh store.
    pub(crate) seed: Option<Seed>,
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_storage_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.storage_path = Some(path.into());
        self
    }

    pub fn with_seed(mut self, seed: Seed) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_data_administrator(mut self, user_group: impl Into<String>) -> Self {
        self.data_administrator = user_group.into();
        self
    }

    pub fn with_access_administrator(mut self, user_group: impl Into<String>) -> Self {
        self.access_administrator = user_group.into();
        self
    }

    pub fn data_administrator(&self) -> &str {
        &self.data_administrator
    }

    pub fn access_administrator(&self) -> &str {
        &self.access_administrator
    }

    pub fn storage_path(&self) -> Option<&Path> {
        self.storage_path.as_deref()
    }

    pub fn seed(&self) -> Option<&Seed> {
        self.seed.as_ref()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_administrator: DEFAULT_DATA_ADMINISTRATOR.to_string(),
            access_administrator: DEFAULT_ACCESS_ADMINISTRATOR.to_string(),
            storage_path: None,
            seed: None,
        }
    }
}

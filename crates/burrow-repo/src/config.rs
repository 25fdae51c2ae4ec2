use serde::{Deserialize, Serialize};

use crate::error::{RepoError, RepoResult};

/// Configuration for opening a repository.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryConfig {
    /// The branch this repository instance tracks.
    #[serde(default = "default_branch")]
    pub branch: String,
    /// Author marker recorded in every commit.
    #[serde(default = "default_author")]
    pub author: String,
}

fn default_branch() -> String {
    "main".to_string()
}

fn default_author() -> String {
    "anonymous".to_string()
}

impl Default for RepositoryConfig {
    fn default() -> Self {
        Self {
            branch: default_branch(),
            author: default_author(),
        }
    }
}

impl RepositoryConfig {
    /// Default configuration on a specific branch.
    pub fn with_branch(branch: impl Into<String>) -> Self {
        Self {
            branch: branch.into(),
            ..Default::default()
        }
    }

    /// Parse from TOML text; missing fields take their defaults.
    pub fn from_toml(text: &str) -> RepoResult<Self> {
        toml::from_str(text).map_err(|e| RepoError::Config(e.to_string()))
    }

    /// Serialize to TOML text.
    pub fn to_toml(&self) -> RepoResult<String> {
        toml::to_string_pretty(self).map_err(|e| RepoError::Config(e.to_string()))
    }
}

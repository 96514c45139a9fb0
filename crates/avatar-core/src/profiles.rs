//! Policy profiles.
//!
//! A profile is a named [`PolicyConfig`] for one deployment. The stock
//! profiles are embedded at compile time from `contrib/profiles/*.toml`;
//! deployments can load their own with [`Profile::from_file`].

use crate::policy::{PolicyConfig, PolicyError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use thiserror::Error;

const PROFILE_STRICT: &str = include_str!("../../../contrib/profiles/strict.toml");
const PROFILE_PERMISSIVE: &str = include_str!("../../../contrib/profiles/permissive.toml");

static PROFILE_DB: OnceLock<Vec<Profile>> = OnceLock::new();

#[derive(Error, Debug)]
pub enum ProfileError {
    #[error("failed to read profile {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("bad profile TOML: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("invalid policy in profile '{name}': {source}")]
    Invalid {
        name: String,
        #[source]
        source: PolicyError,
    },
    #[error("unknown profile '{0}'")]
    NotFound(String),
}

/// A named policy, as stored in a profile TOML file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub policy: PolicyConfig,
}

impl Profile {
    /// Parse and validate a profile.
    pub fn from_toml(src: &str) -> Result<Self, ProfileError> {
        let profile: Profile = toml::from_str(src)?;
        profile.policy.validate().map_err(|source| ProfileError::Invalid {
            name: profile.name.clone(),
            source,
        })?;
        Ok(profile)
    }

    pub fn from_file(path: &Path) -> Result<Self, ProfileError> {
        let src = std::fs::read_to_string(path).map_err(|source| ProfileError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let profile = Self::from_toml(&src)?;
        tracing::info!(name = %profile.name, path = %path.display(), "loaded policy profile");
        Ok(profile)
    }
}

fn profile_db() -> &'static Vec<Profile> {
    PROFILE_DB.get_or_init(|| {
        let mut db = Vec::new();
        for src in [PROFILE_STRICT, PROFILE_PERMISSIVE] {
            match Profile::from_toml(src) {
                Ok(p) => db.push(p),
                Err(e) => tracing::error!(error = %e, "bad embedded profile"),
            }
        }
        db
    })
}

/// Look up an embedded profile by name.
pub fn lookup(name: &str) -> Option<&'static Profile> {
    profile_db().iter().find(|p| p.name == name)
}

/// Like [`lookup`], but an unknown name is an error.
pub fn require(name: &str) -> Result<&'static Profile, ProfileError> {
    lookup(name).ok_or_else(|| ProfileError::NotFound(name.to_string()))
}

/// All embedded profiles.
pub fn list() -> &'static [Profile] {
    profile_db()
}

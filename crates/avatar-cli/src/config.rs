use avatar_core::{profiles, EyeOpenEncoding, Profile, ProfileError, ProviderKind};
use std::path::PathBuf;
use std::str::FromStr;

/// CLI configuration, loaded from environment variables.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Embedded profile name (default: strict).
    pub profile: String,
    /// TOML profile file; takes precedence over `profile` when set.
    pub policy_file: Option<PathBuf>,
    /// Layout of provider response bodies.
    pub provider: ProviderKind,
    /// Polarity of the provider's eye-open code.
    pub eye_encoding: EyeOpenEncoding,
    /// Path to the JSON-lines item store.
    pub store_path: PathBuf,
    /// Overrides the profile's own `fail_fast` when set.
    pub fail_fast: Option<bool>,
}

impl Config {
    /// Load configuration from `AVATAR_*` environment variables with defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(var: impl Fn(&str) -> Option<String>) -> Self {
        let data_dir = var("XDG_DATA_HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|| {
                let home = var("HOME").unwrap_or_else(|| "/tmp".to_string());
                PathBuf::from(home).join(".local/share")
            })
            .join("avatar");

        let store_path = var("AVATAR_STORE_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|| data_dir.join("items.jsonl"));

        Self {
            profile: var("AVATAR_PROFILE").unwrap_or_else(|| "strict".to_string()),
            policy_file: var("AVATAR_POLICY_FILE").filter(|v| !v.is_empty()).map(PathBuf::from),
            provider: parse_or(&var, "AVATAR_PROVIDER", ProviderKind::Iai),
            eye_encoding: parse_or(&var, "AVATAR_EYE_ENCODING", EyeOpenEncoding::ZeroIsOpen),
            store_path,
            fail_fast: var("AVATAR_FAIL_FAST").map(|v| v != "0"),
        }
    }

    /// The configured profile: the policy file if one is set, else the
    /// embedded profile by name.
    pub fn load_profile(&self) -> Result<Profile, ProfileError> {
        match &self.policy_file {
            Some(path) => Profile::from_file(path),
            None => profiles::require(&self.profile).cloned(),
        }
    }
}

fn parse_or<T>(var: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> T
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match var(key) {
        Some(v) => v.parse().unwrap_or_else(|e| {
            tracing::warn!(key, value = %v, error = %e, "ignoring bad setting");
            default
        }),
        None => default,
    }
}

//! Ambient configuration surface.
//!
//! Loading config from the control plane is out of scope for this crate
//! (spec.md §1 Non-goals); this module only covers the local, statically
//! loadable slice of the "Config-recognized options" table in spec.md §6,
//! which every component in the workspace needs to be constructed.

use serde::Deserialize;

/// Tuning knobs for [`edge_filecache`]'s `OpenFileCache`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OpenFileCacheSettings {
    pub max_size: usize,
}

impl Default for OpenFileCacheSettings {
    fn default() -> Self {
        Self { max_size: 16384 }
    }
}

/// Tuning knobs for the sharded TTL cache.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TtlCacheSettings {
    pub pieces: usize,
    pub max_items: usize,
}

impl Default for TtlCacheSettings {
    fn default() -> Self {
        Self {
            pieces: 256,
            max_items: 1_000_000,
        }
    }
}

/// Response-header toggles consumed by the request cache reader.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheHeaderSettings {
    pub add_status_header: bool,
    pub add_age_header: bool,
    pub stale_is_on: bool,
    pub purge_is_on: bool,
    pub purge_key: String,
}

impl Default for CacheHeaderSettings {
    fn default() -> Self {
        Self {
            add_status_header: true,
            add_age_header: true,
            stale_is_on: false,
            purge_is_on: false,
            purge_key: String::new(),
        }
    }
}

/// `cache_ref.expires_time.*` policy (spec.md §6).
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ExpiresTimeSettings {
    pub is_prior: bool,
    pub is_on: bool,
    pub overwrite: bool,
    pub auto_calculate: bool,
    pub duration_secs: u64,
}

impl Default for ExpiresTimeSettings {
    fn default() -> Self {
        Self {
            is_prior: false,
            is_on: false,
            overwrite: false,
            auto_calculate: true,
            duration_secs: 0,
        }
    }
}

/// `webp.*` variant-serving policy.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WebpSettings {
    pub is_on: bool,
    pub ext_set: Vec<String>,
    pub accept_set: Vec<String>,
    pub suffix: String,
}

impl Default for WebpSettings {
    fn default() -> Self {
        Self {
            is_on: false,
            ext_set: vec!["jpg".into(), "jpeg".into(), "png".into()],
            accept_set: vec!["image/webp".into()],
            suffix: "_webp".into(),
        }
    }
}

/// `cc2.*` rate-limit tuning.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Cc2Settings {
    pub period_secs: i64,
    pub threshold: i64,
    pub ignore_common_files: bool,
    pub enable_fingerprint: bool,
}

impl Default for Cc2Settings {
    fn default() -> Self {
        Self {
            period_secs: 60,
            threshold: 1000,
            ignore_common_files: false,
            enable_fingerprint: true,
        }
    }
}

/// Root settings document, loadable from TOML for local testing/demo use.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub open_file_cache: OpenFileCacheSettings,
    pub ttl_cache: TtlCacheSettings,
    pub cache: CacheHeaderSettings,
    pub expires_time: ExpiresTimeSettings,
    pub webp: WebpSettings,
    pub cc2: Cc2Settings,
}

impl Settings {
    /// Parses settings from a TOML document, falling back to defaults for
    /// any field the document omits.
    pub fn from_toml_str(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_uses_defaults() {
        let settings = Settings::from_toml_str("").unwrap();
        assert_eq!(settings.open_file_cache.max_size, 16384);
        assert_eq!(settings.ttl_cache.pieces, 256);
        assert_eq!(settings.cc2.threshold, 1000);
    }

    #[test]
    fn partial_document_overrides_only_given_fields() {
        let settings = Settings::from_toml_str(
            r#"
            [ttl_cache]
            pieces = 64
            "#,
        )
        .unwrap();
        assert_eq!(settings.ttl_cache.pieces, 64);
        assert_eq!(settings.ttl_cache.max_items, 1_000_000);
    }
}

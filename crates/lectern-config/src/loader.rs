// SPDX-FileCopyrightText: 2026 Lectern Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Layered configuration loading with Figment.
//!
//! Merge order, later wins: compiled defaults, `/etc/lectern/lectern.toml`,
//! `~/.config/lectern/lectern.toml`, `./lectern.toml`, then `LECTERN_*`
//! environment variables.

#![allow(clippy::result_large_err)] // figment::Error is external

use std::path::{Path, PathBuf};

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};

use crate::model::LecternConfig;

pub(crate) const SYSTEM_CONFIG: &str = "/etc/lectern/lectern.toml";
pub(crate) const LOCAL_CONFIG: &str = "lectern.toml";

/// Config sections, in the order they are tried when mapping env var names.
const SECTIONS: &[&str] = &[
    "vector_store",
    "resilience",
    "retrieval",
    "embedding",
    "context",
    "memory",
    "intent",
    "agent",
    "llm",
];

pub(crate) fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("lectern/lectern.toml"))
}

/// Load configuration from the standard hierarchy with env var overrides.
pub fn load_config() -> Result<LecternConfig, figment::Error> {
    build_figment().extract()
}

/// Load configuration from a TOML string only (no files, no env).
pub fn load_config_from_str(toml_content: &str) -> Result<LecternConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(LecternConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from a specific file path with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<LecternConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(LecternConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// The full Figment before extraction, for callers that want to inspect metadata.
pub fn build_figment() -> Figment {
    Figment::new()
        .merge(Serialized::defaults(LecternConfig::default()))
        .merge(Toml::file(SYSTEM_CONFIG))
        .merge(Toml::file(user_config_path().unwrap_or_default()))
        .merge(Toml::file(LOCAL_CONFIG))
        .merge(env_provider())
}

/// Map a lowercased, prefix-stripped env var name onto a `section.key` path.
///
/// Section names are matched explicitly rather than splitting on `_`, since
/// both sections (`vector_store`) and keys (`cache_capacity`) contain
/// underscores. `vector_store_url` must become `vector_store.url`.
pub fn map_env_key(key: &str) -> String {
    for section in SECTIONS {
        if let Some(rest) = key.strip_prefix(section) {
            if let Some(field) = rest.strip_prefix('_') {
                return format!("{section}.{field}");
            }
        }
    }
    key.to_string()
}

pub(crate) fn env_provider() -> Env {
    Env::prefixed("LECTERN_").map(|key| map_env_key(key.as_str()).into())
}

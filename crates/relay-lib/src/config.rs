// ============================
// relay-lib/src/config.rs
// ============================
//! Configuration management.
use anyhow::Result;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::PathBuf;

/// Application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Server bind address
    pub bind_addr: SocketAddr,
    /// Path to the emote name -> file map written by the downloader
    pub emotes_file: PathBuf,
    /// Default log filter when RUST_LOG is unset
    pub log_level: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:5000".parse().expect("static addr"),
            emotes_file: PathBuf::from("emotes/emotes.json"),
            log_level: "info".to_string(),
        }
    }
}

impl Settings {
    /// Load settings: defaults, then `relay.toml`, then `RELAY_*` env.
    pub fn load() -> Result<Self> {
        let settings = Figment::from(Serialized::defaults(Settings::default()))
            .merge(Toml::file("relay.toml"))
            .merge(Env::prefixed("RELAY_"))
            .extract()?;
        Ok(settings)
    }
}

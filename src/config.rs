use std::fmt;
use std::fs;
use std::path::Path;

use anyhow::{bail, Context, Result};
use indexmap::IndexMap;
use serde::Deserialize;

use crate::lights::LightId;

/// Options file written by the Home Assistant supervisor for add-ons
const HOME_ASSISTANT_OPTIONS: &str = "/data/options.json";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub ambilight_tv: TvConfig,
    pub lights: LightsConfig,
    /// Fixtures in dispatch order
    pub lights_setup: IndexMap<String, Fixture>,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct TvConfig {
    pub ip: String,
    #[serde(default = "default_protocol")]
    pub protocol: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_api_version")]
    pub api_version: u32,
    #[serde(default = "default_path")]
    pub path: String,
    #[serde(default = "default_wait_for_startup_s")]
    pub wait_for_startup_s: u64,
    #[serde(default = "default_power_on_time_s")]
    pub power_on_time_s: u64,
}

fn default_protocol() -> String {
    "https://".to_string()
}

fn default_port() -> u16 {
    1926
}

fn default_api_version() -> u32 {
    6
}

fn default_path() -> String {
    "ambilight/processed".to_string()
}

fn default_wait_for_startup_s() -> u64 {
    8
}

fn default_power_on_time_s() -> u64 {
    8
}

impl TvConfig {
    pub fn url(&self) -> String {
        format!(
            "{}{}:{}/{}/{}",
            self.protocol, self.ip, self.port, self.api_version, self.path
        )
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(tag = "backend", rename_all = "lowercase")]
pub enum LightsConfig {
    /// Open Pixel Control server, one pixel per light id
    Opc {
        address: String,
        #[serde(default)]
        channel: u8,
    },
    /// Only log the colors
    Log,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct Fixture {
    /// Zone indices averaged into this fixture's color
    pub positions: Vec<usize>,
    pub id: LightId,
}

impl fmt::Display for Fixture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "id {} positions {:?}", self.id, self.positions)
    }
}

impl Config {
    /// Loads the configuration file, falling back to the Home Assistant
    /// add-on options when `path` does not exist.
    pub fn load(path: &Path) -> Result<Config> {
        let fallback = Path::new(HOME_ASSISTANT_OPTIONS);

        let path = if path.exists() {
            path
        } else if fallback.exists() {
            log::info!("{} not found, using {}", path.display(), fallback.display());
            fallback
        } else {
            bail!("Configuration file {} not found", path.display());
        };

        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;

        Config::parse(&contents).with_context(|| format!("Invalid configuration in {}", path.display()))
    }

    pub fn parse(contents: &str) -> Result<Config> {
        let config: Config = serde_json::from_str(contents).context("Error while parsing configuration JSON")?;

        if config.lights_setup.is_empty() {
            bail!("lights_setup has no fixtures");
        }

        for (name, fixture) in &config.lights_setup {
            if fixture.positions.is_empty() {
                bail!("Fixture {} has no positions", name);
            }
        }

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"{
        "ambilight_tv": { "ip": "192.168.1.20" },
        "lights": { "backend": "log" },
        "lights_setup": {
            "tv_right": { "positions": [13, 14, 15], "id": 2 },
            "tv_left": { "positions": [0, 1, 2], "id": 0 }
        }
    }"#;

    #[test]
    fn fills_in_tv_defaults() {
        let config = Config::parse(MINIMAL).unwrap();

        assert_eq!(
            config.ambilight_tv,
            TvConfig {
                ip: "192.168.1.20".to_string(),
                protocol: "https://".to_string(),
                port: 1926,
                api_version: 6,
                path: "ambilight/processed".to_string(),
                wait_for_startup_s: 8,
                power_on_time_s: 8,
            }
        );
        assert_eq!(config.ambilight_tv.url(), "https://192.168.1.20:1926/6/ambilight/processed");
        assert_eq!(config.lights, LightsConfig::Log);
    }

    #[test]
    fn keeps_fixture_order() {
        let config = Config::parse(MINIMAL).unwrap();

        let names: Vec<&str> = config.lights_setup.keys().map(String::as_str).collect();
        assert_eq!(names, ["tv_right", "tv_left"]);
        assert_eq!(config.lights_setup["tv_right"].positions, [13, 14, 15]);
        assert_eq!(config.lights_setup["tv_right"].to_string(), "id 2 positions [13, 14, 15]");
    }

    #[test]
    fn parses_opc_backend() {
        let config = Config::parse(
            r#"{
                "ambilight_tv": { "ip": "tv.local", "protocol": "http://", "port": 1925, "api_version": 1 },
                "lights": { "backend": "opc", "address": "10.0.0.2:7890", "channel": 3 },
                "lights_setup": { "lamp": { "positions": [0], "id": 7 } }
            }"#,
        )
        .unwrap();

        assert_eq!(
            config.lights,
            LightsConfig::Opc {
                address: "10.0.0.2:7890".to_string(),
                channel: 3
            }
        );
        assert_eq!(config.ambilight_tv.url(), "http://tv.local:1925/1/ambilight/processed");
    }

    #[test]
    fn accepts_light_ids_past_a_byte() {
        let config = Config::parse(
            r#"{
                "ambilight_tv": { "ip": "tv" },
                "lights": { "backend": "log" },
                "lights_setup": { "strip_end": { "positions": [0], "id": 300 } }
            }"#,
        )
        .unwrap();

        assert_eq!(config.lights_setup["strip_end"].id, 300);
    }

    #[test]
    fn rejects_empty_fixture_positions() {
        let result = Config::parse(
            r#"{
                "ambilight_tv": { "ip": "tv" },
                "lights": { "backend": "log" },
                "lights_setup": { "lamp": { "positions": [], "id": 0 } }
            }"#,
        );

        assert!(result.is_err());
    }

    #[test]
    fn rejects_missing_fixtures() {
        assert!(Config::parse(r#"{ "ambilight_tv": { "ip": "tv" }, "lights": { "backend": "log" } }"#).is_err());
        assert!(Config::parse(
            r#"{ "ambilight_tv": { "ip": "tv" }, "lights": { "backend": "log" }, "lights_setup": {} }"#
        )
        .is_err());
    }

    #[test]
    fn rejects_missing_tv_address() {
        let result = Config::parse(
            r#"{
                "ambilight_tv": {},
                "lights": { "backend": "log" },
                "lights_setup": { "lamp": { "positions": [0], "id": 0 } }
            }"#,
        );

        assert!(result.is_err());
    }
}

//! Parser configuration

use crate::error::{ParserError, Result};
use crate::types::Endpoint;
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Addresses of the two test servers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Endpoints {
    pub east: String,
    pub west: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            east: "203.0.113.10".to_string(),
            west: "198.51.100.20".to_string(),
        }
    }
}

impl Endpoints {
    pub fn classify(&self, ip: &str) -> Endpoint {
        let ip = ip.trim();
        if ip == self.east {
            Endpoint::East
        } else if ip == self.west {
            Endpoint::West
        } else {
            Endpoint::Unknown
        }
    }
}

/// A traceroute destination with a human readable location.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteLocation {
    pub ip: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParserConfig {
    pub endpoints: Endpoints,
    pub route_locations: Vec<RouteLocation>,
    /// Carrier names accepted verbatim from the provider/operator fields.
    pub confirmed_carriers: Vec<String>,
    /// CSV of `device_id,tester` pairs replacing the built-in table.
    pub tester_table: Option<PathBuf>,
}

impl Default for ParserConfig {
    fn default() -> Self {
        let route = |ip: &str, name: &str| RouteLocation {
            ip: ip.to_string(),
            name: name.to_string(),
        };
        Self {
            endpoints: Endpoints::default(),
            route_locations: vec![
                route("198.51.100.20", "California"),
                route("198.51.100.40", "Oregon"),
                route("203.0.113.10", "East"),
            ],
            confirmed_carriers: ["AT&T", "Sprint", "T-Mobile", "Verizon"]
                .iter()
                .map(|c| c.to_string())
                .collect(),
            tester_table: None,
        }
    }
}

impl ParserConfig {
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| ParserError::Config(e.to_string()))
    }

    /// Load a config file; missing keys keep their defaults.
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;

        let config = Self::from_toml_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;

        if config.endpoints.east == config.endpoints.west {
            anyhow::bail!("endpoints.east and endpoints.west must differ");
        }

        Ok(config)
    }

    /// Named location of a traceroute destination.
    pub fn route_location(&self, ip: &str) -> Option<&str> {
        self.route_locations
            .iter()
            .find(|r| r.ip == ip.trim())
            .map(|r| r.name.as_str())
    }

    pub fn is_confirmed_carrier(&self, name: &str) -> bool {
        self.confirmed_carriers.iter().any(|c| c == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_endpoints() {
        let endpoints = Endpoints::default();
        assert_eq!(endpoints.classify("203.0.113.10"), Endpoint::East);
        assert_eq!(endpoints.classify(" 198.51.100.20 "), Endpoint::West);
        assert_eq!(endpoints.classify("10.0.0.1"), Endpoint::Unknown);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = ParserConfig::from_toml_str(
            r#"
[endpoints]
east = "192.0.2.1"
west = "192.0.2.2"
"#,
        )
        .unwrap();
        assert_eq!(config.endpoints.east, "192.0.2.1");
        assert_eq!(config.confirmed_carriers.len(), 4);
        assert_eq!(config.route_location("198.51.100.40"), Some("Oregon"));
        assert!(config.tester_table.is_none());
    }

    #[test]
    fn test_bad_toml_is_config_error() {
        let err = ParserConfig::from_toml_str("endpoints = 3").unwrap_err();
        assert!(matches!(err, ParserError::Config(_)));
    }

    #[test]
    fn test_load_rejects_identical_endpoints() {
        let path = std::env::temp_dir().join("fieldtest_parser_same_endpoints.toml");
        std::fs::write(&path, "[endpoints]\neast = \"192.0.2.1\"\nwest = \"192.0.2.1\"\n").unwrap();
        assert!(ParserConfig::load(&path).is_err());
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_confirmed_carriers() {
        let config = ParserConfig::default();
        assert!(config.is_confirmed_carrier("AT&T"));
        assert!(!config.is_confirmed_carrier("sprint"));
    }
}

use std::path::Path;

use serde::{Deserialize, Serialize};

/// Configuration for a staff directory.
///
/// Stored as TOML at `<root>/.staff/config.toml`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Versions", into = "Versions")]
pub struct Config {
    /// The number of records per page when a listing does not specify a
    /// limit.
    default_page_size: usize,

    /// Name of the JSON data file, relative to the directory root.
    data_file: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_page_size: default_page_size(),
            data_file: default_data_file(),
        }
    }
}

impl Config {
    /// Loads the configuration from a TOML file at the given path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or if the TOML content is
    /// invalid.
    pub fn load(path: &Path) -> Result<Self, String> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read config file: {e}"))?;
        toml::from_str(&content).map_err(|e| format!("Failed to parse config file: {e}"))
    }

    /// Saves the configuration to a TOML file at the given path.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration cannot be serialized to TOML or if
    /// the file cannot be written.
    pub fn save(&self, path: &Path) -> Result<(), String> {
        let content =
            toml::to_string_pretty(self).map_err(|e| format!("Failed to serialize config: {e}"))?;
        std::fs::write(path, content).map_err(|e| format!("Failed to write config file: {e}"))
    }

    /// Records per page when a listing omits `limit`. Never zero.
    #[must_use]
    pub fn default_page_size(&self) -> usize {
        self.default_page_size.max(1)
    }

    /// Sets the default page size.
    pub const fn set_default_page_size(&mut self, size: usize) {
        self.default_page_size = size;
    }

    /// Name of the data file within the directory root.
    #[must_use]
    pub fn data_file(&self) -> &str {
        &self.data_file
    }
}

const fn default_page_size() -> usize {
    10
}

fn default_data_file() -> String {
    "staff.json".to_string()
}

/// The serialized versions of the configuration.
/// This allows for future changes to the configuration format and to the domain
/// type without breaking compatibility.
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "_version")]
enum Versions {
    #[serde(rename = "1")]
    V1 {
        #[serde(default = "default_page_size")]
        default_page_size: usize,

        #[serde(default = "default_data_file")]
        data_file: String,
    },
}

impl From<Versions> for Config {
    fn from(versions: Versions) -> Self {
        match versions {
            Versions::V1 {
                default_page_size,
                data_file,
            } => Self {
                default_page_size,
                data_file,
            },
        }
    }
}

impl From<Config> for Versions {
    fn from(config: Config) -> Self {
        Self::V1 {
            default_page_size: config.default_page_size,
            data_file: config.data_file,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn load_reads_valid_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"_version = \"1\"\ndefault_page_size = 25\ndata_file = \"people.json\"\n")
            .unwrap();

        let config = Config::load(file.path()).unwrap();

        assert_eq!(config.default_page_size(), 25);
        assert_eq!(config.data_file(), "people.json");
    }

    #[test]
    fn load_missing_file_returns_error() {
        let tmp = tempfile::tempdir().unwrap();
        let missing = tmp.path().join("missing.toml");

        let error = Config::load(&missing).unwrap_err();
        assert!(error.starts_with("Failed to read config file:"));
    }

    #[test]
    fn load_invalid_toml_returns_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"_version = \"1\"\ndefault_page_size = \"ten\"\n")
            .unwrap();

        let error = Config::load(file.path()).unwrap_err();
        assert!(error.starts_with("Failed to parse config file:"));
    }

    #[test]
    fn empty_file_returns_default() {
        let expected = Config::default();
        let actual: Config = toml::from_str(r#"_version = "1""#).unwrap();
        assert_eq!(actual, expected);
    }

    #[test]
    fn save_then_load() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("config.toml");

        let mut config = Config::default();
        config.set_default_page_size(3);
        config.save(&path).unwrap();

        assert_eq!(Config::load(&path).unwrap(), config);
    }

    #[test]
    fn zero_page_size_is_clamped() {
        let mut config = Config::default();
        config.set_default_page_size(0);
        assert_eq!(config.default_page_size(), 1);
    }
}

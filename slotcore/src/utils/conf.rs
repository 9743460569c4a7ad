use std::path::Path;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

use crate::utils::error::{SlotError, SlotResult};

/// Layout variant a type opts into through its base marker.
///
/// The ordering matters: when a type has several opted-in ancestors, the
/// strongest mode wins (`Dual` over `Fixed`).
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum LayoutMode {
    /// Instances have no dynamic fallback; assigning an undeclared attribute
    /// fails.
    Fixed,

    /// Instances have a fixed layout and exactly one dynamic fallback store
    /// shared by the whole hierarchy; assigning an undeclared attribute
    /// succeeds through the fallback.
    Dual,
}

/// Registry configuration.
///
/// Every field has a default, so a configuration file only needs to list
/// what it overrides:
///
/// ```rust
/// # use slotcore::utils::conf::RegistryConfig;
/// let config = RegistryConfig::from_toml_str("instance_fallback_name = 'this'", "inline").unwrap();
/// assert_eq!(config.instance_fallback_name, "this");
/// assert_eq!(config.dynamic_store_name, "__dict__");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// Instance parameter assumed for constructors that declare no
    /// parameters at all.
    pub instance_fallback_name: String,

    /// Reserved layout name requesting a dynamic store.
    pub dynamic_store_name: String,

    /// Name of the host root type.
    pub root_name: String,

    /// Name of the base marker opting into [`LayoutMode::Fixed`].
    pub fixed_base_name: String,

    /// Name of the base marker opting into [`LayoutMode::Dual`].
    pub dual_base_name: String,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            instance_fallback_name: "self".to_string(),
            dynamic_store_name: "__dict__".to_string(),
            root_name: "object".to_string(),
            fixed_base_name: "Slots".to_string(),
            dual_base_name: "SlotsPlusDict".to_string(),
        }
    }
}

impl RegistryConfig {
    /// Parse a configuration from TOML text. `file` only labels errors.
    pub fn from_toml_str(content: &str, file: &str) -> SlotResult<Self> {
        toml::from_str(content).map_err(|source| SlotError::ConfigParse {
            source,
            file: file.to_string(),
        })
    }

    /// Load a configuration file.
    pub fn from_path(path: impl AsRef<Path>) -> SlotResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content, &path.display().to_string())
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::*;

    #[test]
    fn modes_parse_and_print_in_snake_case() {
        assert_eq!(LayoutMode::from_str("dual").unwrap(), LayoutMode::Dual);
        assert_eq!(LayoutMode::Fixed.to_string(), "fixed");
        assert!(LayoutMode::from_str("both").is_err());
    }

    #[test]
    fn dual_is_the_stronger_mode() {
        assert_eq!(
            [LayoutMode::Fixed, LayoutMode::Dual, LayoutMode::Fixed]
                .into_iter()
                .max(),
            Some(LayoutMode::Dual)
        );
    }

    #[test]
    fn empty_file_yields_defaults() {
        let config = RegistryConfig::from_toml_str("", "empty.toml").unwrap();
        assert_eq!(config, RegistryConfig::default());
    }

    #[test]
    fn malformed_file_names_the_file() {
        let err = RegistryConfig::from_toml_str("root_name = [", "broken.toml").unwrap_err();
        assert!(err.is_config_parse());
        assert!(err.to_string().contains("broken.toml"));
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let err = RegistryConfig::from_path("/definitely/not/here/slots.toml").unwrap_err();
        assert!(err.is_io());
    }
}

//! Settings for the PCP worker and its callers

use crate::pcp::Command;
use crate::portmap::Lifetime;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Settings
///
/// Stored as JSON. A missing or empty file yields the defaults.
///
/// # Example
/// ```rust,no_run
/// use pcp_portmap::config::Settings;
///
/// let settings = Settings::load("pcp-portmap.json").expect("Failed to load");
/// let command = settings.command();
/// println!("Running {} (lifetime {})", command.command_name, settings.default_lifetime());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// PCP client executable
    pub command_name: String,
    /// Arguments placed before the generated flags
    pub command_args: Vec<String>,
    /// PCP server address; autodiscovered when unset
    pub server_addr: Option<String>,
    /// Lifetime requested for every mapping, in seconds
    pub default_lifetime_secs: u32,
    /// Deadline for a single mapping request, in seconds
    pub map_timeout_secs: u64,
}

impl Settings {
    /// Load settings from a JSON file
    ///
    /// # Arguments
    /// * `path` - Path to the settings file
    ///
    /// # Returns
    /// The loaded settings, or default settings if file doesn't exist
    pub fn load<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            return Ok(Self::default());
        }

        let data = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Failed to read settings: {}", e)))?;

        if data.trim().is_empty() {
            return Ok(Self::default());
        }

        let settings: Self = serde_json::from_str(&data)
            .map_err(|e| Error::Config(format!("Failed to parse settings: {}", e)))?;

        settings.validate()?;
        Ok(settings)
    }

    /// Save settings to a JSON file
    pub fn save<P: AsRef<std::path::Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| Error::Config(format!("Failed to create settings directory: {}", e)))?;
        }

        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)
            .map_err(|e| Error::Config(format!("Failed to write settings: {}", e)))?;

        Ok(())
    }

    /// Reject settings no mapping could work with
    pub fn validate(&self) -> Result<()> {
        if self.command_name.trim().is_empty() {
            return Err(Error::Config("command_name must not be empty".to_string()));
        }
        if self.default_lifetime_secs == 0 {
            // Zero would delete every mapping on renewal.
            return Err(Error::Config(
                "default_lifetime_secs must be greater than zero".to_string(),
            ));
        }
        if self.map_timeout_secs == 0 {
            return Err(Error::Config("map_timeout_secs must be greater than zero".to_string()));
        }
        Ok(())
    }

    /// The command to run for every request
    pub fn command(&self) -> Command {
        Command::new(self.command_name.clone(), self.server_addr.clone())
            .with_args(self.command_args.iter().cloned())
    }

    /// Lifetime requested for every mapping
    pub fn default_lifetime(&self) -> Lifetime {
        Lifetime(self.default_lifetime_secs)
    }

    /// Deadline for a single mapping request
    pub fn map_timeout(&self) -> Duration {
        Duration::from_secs(self.map_timeout_secs)
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            command_name: "pcp".to_string(),
            command_args: Vec::new(),
            server_addr: None,
            default_lifetime_secs: 3600, // 1 hour
            map_timeout_secs: 30,
        }
    }
}

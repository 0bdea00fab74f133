//! Hub client configuration settings

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

/// Main client configuration
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub client: ClientSettings,
}

/// Hub client behaviour
#[derive(Debug, Clone, Deserialize)]
pub struct ClientSettings {
    /// Peer-set subdomain holding known hub multiaddrs
    #[serde(default = "default_hubs_subdomain")]
    pub hubs_subdomain: String,
    /// How long a dial waits once for a hub link that is still handshaking
    #[serde(default = "default_hub_resolve_delay_ms")]
    pub hub_resolve_delay_ms: u64,
    /// Buffer size of the in-process pair used to bridge inbound tunnels
    #[serde(default = "default_bridge_buffer_bytes")]
    pub bridge_buffer_bytes: usize,
}

fn default_hubs_subdomain() -> String {
    "hubs".to_string()
}

fn default_hub_resolve_delay_ms() -> u64 {
    100
}

fn default_bridge_buffer_bytes() -> usize {
    64 * 1024
}

impl ClientSettings {
    pub fn hub_resolve_delay(&self) -> Duration {
        Duration::from_millis(self.hub_resolve_delay_ms)
    }
}

impl Default for ClientSettings {
    fn default() -> Self {
        ClientSettings {
            hubs_subdomain: default_hubs_subdomain(),
            hub_resolve_delay_ms: default_hub_resolve_delay_ms(),
            bridge_buffer_bytes: default_bridge_buffer_bytes(),
        }
    }
}

impl Settings {
    /// Load settings from file and environment
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from("hub-client")
    }

    /// Load settings from a specific config file path (without extension)
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let config_path = path.as_ref();

        let builder = Config::builder()
            .set_default("client.hubs_subdomain", default_hubs_subdomain())?
            .set_default("client.hub_resolve_delay_ms", default_hub_resolve_delay_ms())?
            .set_default("client.bridge_buffer_bytes", default_bridge_buffer_bytes() as u64)?
            // Add config file if it exists
            .add_source(File::with_name(config_path.to_str().unwrap_or("hub-client")).required(false))
            // Add environment variables with prefix HUB_CLIENT_
            .add_source(Environment::with_prefix("HUB_CLIENT").separator("__"));

        builder.build()?.try_deserialize()
    }
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            client: ClientSettings::default(),
        }
    }
}

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

pub use common::config::MqAppConfig;

#[derive(Debug, Deserialize, Clone)]
pub struct GatewayConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Outbound frames buffered per connection. Default: 64.
    #[serde(default = "default_send_buffer")]
    pub send_buffer: usize,
}

fn default_host() -> String {
    "127.0.0.1".into()
}
fn default_port() -> u16 {
    3000
}
fn default_send_buffer() -> usize {
    64
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            send_buffer: default_send_buffer(),
        }
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct GatewayAppConfig {
    #[serde(default)]
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub mq: MqAppConfig,
}

impl GatewayAppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        let config_path =
            std::env::var("IMAGINE_CONFIG").unwrap_or_else(|_| "config/config".to_string());

        let s = Config::builder()
            .set_default("gateway.host", "127.0.0.1")?
            .set_default("gateway.port", 3000)?
            // Load from config/config.toml
            .add_source(File::with_name(&config_path).required(false))
            // Override from environment (e.g., IMAGINE__GATEWAY__PORT)
            .add_source(
                Environment::with_prefix("IMAGINE")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        s.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn load_reads_port_and_bus_from_environment() {
        // SAFETY: environment-touching tests are serialized.
        unsafe {
            std::env::set_var("IMAGINE_CONFIG", "does/not/exist");
            std::env::set_var("IMAGINE__GATEWAY__PORT", "8088");
            std::env::set_var("IMAGINE__MQ__URL", "redis://bus:6379");
        }

        let config = GatewayAppConfig::load().unwrap();
        assert_eq!(config.gateway.port, 8088);
        assert_eq!(config.gateway.host, "127.0.0.1");
        assert_eq!(config.mq.require_url().unwrap(), "redis://bus:6379");
        assert_eq!(config.mq.prepare_prompt_queue, "prepare_prompt");

        // SAFETY: serialized.
        unsafe {
            std::env::remove_var("IMAGINE_CONFIG");
            std::env::remove_var("IMAGINE__GATEWAY__PORT");
            std::env::remove_var("IMAGINE__MQ__URL");
        }
    }
}

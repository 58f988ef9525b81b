use common::PipelineError;
use common::config::MqAppConfig;

/// Connection settings for the Redis-backed bus.
#[derive(Debug, Clone)]
pub struct MqConfig {
    pub url: String,
    pub pool_size: u8,
}

impl MqConfig {
    /// Build from app-level settings. Fails when no bus URL is configured.
    pub fn from_app(config: &MqAppConfig) -> Result<Self, PipelineError> {
        Ok(Self {
            url: config.require_url()?.to_string(),
            pool_size: config.pool_size,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_app_requires_url() {
        let mut app = MqAppConfig::default();
        assert!(matches!(
            MqConfig::from_app(&app),
            Err(PipelineError::Configuration(_))
        ));

        app.url = Some("redis://bus:6379".into());
        app.pool_size = 9;
        let config = MqConfig::from_app(&app).unwrap();
        assert_eq!(config.url, "redis://bus:6379");
        assert_eq!(config.pool_size, 9);
    }
}

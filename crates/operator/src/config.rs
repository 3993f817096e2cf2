use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub kube: KubeConfig,
    pub gang: GangConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub addr: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KubeConfig {
    /// Namespace to watch; all namespaces when unset
    pub namespace: Option<String>,
    /// Seconds between reconciliation passes for non-terminal jobs
    pub requeue_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GangConfig {
    /// Wire the PodGroup admission signal instead of the disabled stub
    pub enabled: bool,
}

impl Config {
    pub fn load() -> crate::Result<Self> {
        // Load environment variables from .env file if it exists
        let _ = dotenvy::dotenv();

        let config = Config {
            server: ServerConfig {
                addr: std::env::var("METRICS_ADDR")
                    .unwrap_or_else(|_| "0.0.0.0:8080".to_string()),
            },
            kube: KubeConfig {
                namespace: std::env::var("WATCH_NAMESPACE")
                    .ok()
                    .filter(|s| !s.is_empty()),
                requeue_seconds: std::env::var("REQUEUE_SECONDS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(30),
            },
            gang: GangConfig {
                enabled: std::env::var("ENABLE_GANG_SCHEDULING")
                    .map(|v| v == "true" || v == "1")
                    .unwrap_or(false),
            },
        };

        if config.kube.requeue_seconds == 0 {
            return Err(crate::Error::Config(
                "REQUEUE_SECONDS must be greater than zero".to_string(),
            ));
        }

        Ok(config)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                addr: "0.0.0.0:8080".to_string(),
            },
            kube: KubeConfig {
                namespace: None,
                requeue_seconds: 30,
            },
            gang: GangConfig { enabled: false },
        }
    }
}

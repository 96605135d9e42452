use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;

/// Runtime configuration for the OCR backend
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Mistral API key; required before any OCR call can be made
    pub api_key: String,

    /// Base URL of the Mistral API (default: "https://api.mistral.ai")
    pub api_base_url: String,

    /// OCR model identifier (default: "mistral-ocr-latest")
    pub ocr_model: String,

    /// Maximum accepted upload size in bytes (default: 50 MB)
    pub max_file_size: usize,

    /// Directory where uploads are staged before forwarding (default: OS temp dir)
    pub staging_dir: PathBuf,

    /// Address the HTTP server binds to (default: 127.0.0.1:3000)
    pub bind_addr: SocketAddr,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            api_base_url: "https://api.mistral.ai".to_string(),
            ocr_model: "mistral-ocr-latest".to_string(),
            max_file_size: 50 * 1024 * 1024, // 50 MB
            staging_dir: std::env::temp_dir(),
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 3000)),
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let default = Self::default();

        Self {
            api_key: env::var("MISTRAL_API_KEY").unwrap_or(default.api_key),

            api_base_url: env::var("MISTRAL_API_BASE_URL").unwrap_or(default.api_base_url),

            ocr_model: env::var("OCR_MODEL").unwrap_or(default.ocr_model),

            max_file_size: env::var("MAX_FILE_SIZE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.max_file_size),

            staging_dir: env::var("STAGING_DIR")
                .map(PathBuf::from)
                .unwrap_or(default.staging_dir),

            bind_addr: env::var("BIND_ADDR")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.bind_addr),
        }
    }

    /// Config for tests and local development: a placeholder key and a small
    /// size limit so limit handling is easy to exercise.
    pub fn development() -> Self {
        Self {
            api_key: "test-key".to_string(),
            max_file_size: 10 * 1024 * 1024,
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.api_base_url, "https://api.mistral.ai");
        assert_eq!(config.ocr_model, "mistral-ocr-latest");
        assert_eq!(config.max_file_size, 50 * 1024 * 1024);
        assert!(config.api_key.is_empty());
    }

    #[test]
    fn test_development_config() {
        let config = AppConfig::development();
        assert_eq!(config.api_key, "test-key");
        assert_eq!(config.max_file_size, 10 * 1024 * 1024);
    }
}

use anyhow::Result;
use config::{Config, Environment, File};
use serde::Deserialize;
use std::path::PathBuf;

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub data_dir: PathBuf,
    pub listen_addr: String,
    pub default_limit: usize,
    pub max_limit: usize,
    pub max_upload_bytes: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        // Be resilient in environments without HOME by falling back to CWD.
        let base_dir = dirs::home_dir()
            .or_else(|| std::env::var_os("HOME").map(PathBuf::from))
            .or_else(|| std::env::current_dir().ok())
            .unwrap_or_else(|| PathBuf::from("."));

        Self {
            data_dir: base_dir.join(".procsol"),
            listen_addr: "127.0.0.1:8080".to_string(),
            default_limit: 1000,
            max_limit: 100_000,
            max_upload_bytes: 256 * 1024 * 1024,
        }
    }
}

impl AppConfig {
    pub fn load() -> Result<Self> {
        let defaults = Self::default();
        let config_path = crate::util::paths::config_file(&defaults.data_dir);

        let mut builder = Config::builder()
            // Avoid panics on non-UTF8 paths by using lossy conversion.
            .set_default("data_dir", defaults.data_dir.to_string_lossy().as_ref())?
            .set_default("listen_addr", defaults.listen_addr.as_str())?
            .set_default("default_limit", defaults.default_limit as u64)?
            .set_default("max_limit", defaults.max_limit as u64)?
            .set_default("max_upload_bytes", defaults.max_upload_bytes as u64)?;

        // Load config file if it exists
        if config_path.exists() {
            builder = builder.add_source(File::from(config_path));
        }

        // Allow environment variables to override config
        builder = builder.add_source(Environment::with_prefix("PROCSOL"));

        let config = builder.build()?;
        let app_config: AppConfig = config.try_deserialize()?;

        Ok(app_config)
    }

    /// Clamp a requested result cap into the configured window.
    pub fn clamp_limit(&self, requested: Option<usize>) -> usize {
        requested
            .unwrap_or(self.default_limit)
            .clamp(1, self.max_limit)
    }
}

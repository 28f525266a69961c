use std::env;
use tracing::warn;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub emr_store_url: String,
    pub emr_service_key: String,
}

impl AppConfig {
    /// Load configuration from the process environment. A `.env` file in the
    /// working directory is honoured when present.
    pub fn from_env() -> Self {
        dotenv::dotenv().ok();

        let config = Self {
            emr_store_url: env::var("EMR_STORE_URL")
                .unwrap_or_else(|_| {
                    warn!("EMR_STORE_URL not set, using empty value");
                    String::new()
                }),
            emr_service_key: env::var("EMR_SERVICE_KEY")
                .unwrap_or_else(|_| {
                    warn!("EMR_SERVICE_KEY not set, using empty value");
                    String::new()
                }),
        };

        if !config.is_configured() {
            warn!("Scheduling persistence not fully configured - missing environment variables");
        }

        config
    }

    pub fn is_configured(&self) -> bool {
        !self.emr_store_url.is_empty() && !self.emr_service_key.is_empty()
    }
}

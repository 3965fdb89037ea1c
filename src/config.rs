use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub port: u16,
    pub database_url: String,
    /// Admin key protecting the operational endpoints (queue status, retry).
    pub admin_key: String,
    /// Base URL of the mint relay that owns the contract key.
    pub relay_url: String,
    /// Bearer token for the mint relay, if it requires one.
    pub relay_api_key: Option<String>,
    /// Timeout for a single mint call, in seconds.
    pub relay_timeout_secs: u64,
    /// Completion sweep interval in seconds.
    /// Set via ARROWTOWER_SWEEP_SECS. Default: 30.
    pub sweep_interval_secs: u64,
    /// Public base URL used for metadata external_url fields.
    pub public_base_url: String,
}

pub fn load() -> anyhow::Result<Config> {
    dotenvy::dotenv().ok();

    let admin_key =
        std::env::var("ARROWTOWER_ADMIN_KEY").unwrap_or_else(|_| "CHANGE_ME_ADMIN_KEY".into());

    if admin_key == "CHANGE_ME_ADMIN_KEY" {
        let env_mode = std::env::var("ARROWTOWER_ENV")
            .or_else(|_| std::env::var("RUST_ENV"))
            .unwrap_or_default();
        if env_mode == "production" {
            anyhow::bail!(
                "ARROWTOWER_ADMIN_KEY is still the insecure placeholder. \
                 Set a proper key before running in production."
            );
        }
        eprintln!("⚠️  ARROWTOWER_ADMIN_KEY is not set — using insecure placeholder.");
    }

    Ok(Config {
        port: std::env::var("ARROWTOWER_PORT")
            .unwrap_or_else(|_| "8090".into())
            .parse()
            .unwrap_or(8090),
        database_url: std::env::var("DATABASE_URL")
            .unwrap_or_else(|_| "postgres://localhost/arrowtower".into()),
        admin_key,
        relay_url: std::env::var("ARROWTOWER_RELAY_URL")
            .unwrap_or_else(|_| "http://127.0.0.1:8545".into()),
        relay_api_key: std::env::var("ARROWTOWER_RELAY_API_KEY").ok(),
        relay_timeout_secs: std::env::var("ARROWTOWER_RELAY_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(120),
        sweep_interval_secs: std::env::var("ARROWTOWER_SWEEP_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(30),
        public_base_url: std::env::var("ARROWTOWER_PUBLIC_URL")
            .unwrap_or_else(|_| "https://arrowtower.netlify.app".into()),
    })
}

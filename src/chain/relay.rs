//! HTTP client for the mint relay.
//!
//! The relay wraps the deployed contract: `POST /mint` runs
//! `completeTourAndMint(user)` and waits for the receipt, `GET /status/:wallet`
//! reads `getUserStatus(user)`.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info};

use super::{MintError, MintReceipt, Minter, UserChainStatus};

pub struct RelayMinter {
    base_url: String,
    api_key: Option<String>,
    http: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct RelayMintResponse {
    #[serde(default)]
    token_id: String,
    #[serde(default)]
    tx_hash: String,
}

#[derive(Debug, Deserialize)]
struct RelayStatusResponse {
    completed_tour: bool,
    minted: bool,
}

#[derive(Debug, Deserialize)]
struct RelayErrorBody {
    error: Option<String>,
    message: Option<String>,
}

impl RelayMinter {
    pub fn new(base_url: &str, api_key: Option<String>, timeout_secs: u64) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(5))
            .user_agent("ArrowTower-Minter/1.0")
            .build()
            .expect("failed to build relay HTTP client");

        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            http,
        }
    }

    fn request(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(key) => builder.header("authorization", format!("Bearer {}", key)),
            None => builder,
        }
    }

    async fn error_from(resp: reqwest::Response) -> MintError {
        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        let detail = serde_json::from_str::<RelayErrorBody>(&body)
            .ok()
            .and_then(|b| b.error.or(b.message))
            .unwrap_or(body);
        MintError::Relay(format!("{}: {}", status, detail))
    }
}

#[async_trait]
impl Minter for RelayMinter {
    async fn user_status(&self, wallet: &str) -> Result<UserChainStatus, MintError> {
        super::validate_wallet(wallet)?;

        let url = format!("{}/status/{}", self.base_url, wallet);
        debug!(wallet, "querying on-chain user status");

        let resp = self.request(self.http.get(&url)).send().await?;
        if !resp.status().is_success() {
            return Err(Self::error_from(resp).await);
        }

        let status: RelayStatusResponse = resp.json().await?;
        Ok(UserChainStatus {
            completed_tour: status.completed_tour,
            minted: status.minted,
        })
    }

    async fn mint(&self, wallet: &str) -> Result<MintReceipt, MintError> {
        super::validate_wallet(wallet)?;

        // Mirror the contract helper: if the user already completed and
        // minted, return an empty receipt instead of sending a transaction.
        let status = self.user_status(wallet).await?;
        if status.completed_tour && status.minted {
            info!(wallet, "user already minted on-chain, skipping transaction");
            return Ok(MintReceipt::default());
        }

        let url = format!("{}/mint", self.base_url);
        info!(wallet, "submitting completeTourAndMint");

        let resp = self
            .request(self.http.post(&url))
            .json(&json!({ "wallet": wallet }))
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(Self::error_from(resp).await);
        }

        let body: RelayMintResponse = resp.json().await?;
        info!(
            wallet,
            token_id = %body.token_id,
            tx_hash = %body.tx_hash,
            "mint transaction confirmed"
        );

        Ok(MintReceipt {
            token_id: body.token_id,
            tx_hash: body.tx_hash,
        })
    }
}

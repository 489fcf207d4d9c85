use std::time::Duration;

use async_trait::async_trait;
use ethers_core::types::H256;
use serde::Deserialize;
use tracing::debug;
use url::Url;

use super::{ChainCommunicationError, ChainResult};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Status of a transaction submitted through a private relay
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayTxStatus {
    Included,
    Failed,
    Pending,
    Unknown,
}

impl From<&str> for RelayTxStatus {
    fn from(status: &str) -> Self {
        match status.to_ascii_uppercase().as_str() {
            "INCLUDED" => RelayTxStatus::Included,
            "FAILED" => RelayTxStatus::Failed,
            "PENDING" => RelayTxStatus::Pending,
            _ => RelayTxStatus::Unknown,
        }
    }
}

#[async_trait]
pub trait RelayStatusApi: Send + Sync {
    async fn transaction_status(&self, hash: H256) -> ChainResult<RelayTxStatus>;
}

#[derive(Debug, Deserialize)]
struct StatusResponse {
    status: String,
}

/// Client of the Flashbots Protect transaction status API
#[derive(Debug, Clone)]
pub struct FlashbotsStatusClient {
    client: reqwest::Client,
    base_url: Url,
}

impl FlashbotsStatusClient {
    pub fn new(base_url: Url) -> ChainResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self { client, base_url })
    }

    fn status_url(&self, hash: H256) -> ChainResult<Url> {
        self.base_url
            .join(&format!("{hash:?}"))
            .map_err(|err| ChainCommunicationError::Relay(err.to_string()))
    }
}

#[async_trait]
impl RelayStatusApi for FlashbotsStatusClient {
    async fn transaction_status(&self, hash: H256) -> ChainResult<RelayTxStatus> {
        let url = self.status_url(hash)?;
        let response: StatusResponse = self
            .client
            .get(url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        debug!(?hash, status = response.status, "Relay status fetched");
        Ok(response.status.as_str().into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_url_appends_hash() {
        let client =
            FlashbotsStatusClient::new(Url::parse("https://protect.flashbots.net/tx/").unwrap())
                .unwrap();
        let url = client.status_url(H256::repeat_byte(0xab)).unwrap();
        assert_eq!(
            url.as_str(),
            format!("https://protect.flashbots.net/tx/0x{}", "ab".repeat(32))
        );
    }

    #[test]
    fn test_relay_status_parsing() {
        assert_eq!(RelayTxStatus::from("INCLUDED"), RelayTxStatus::Included);
        assert_eq!(RelayTxStatus::from("failed"), RelayTxStatus::Failed);
        assert_eq!(RelayTxStatus::from("PENDING"), RelayTxStatus::Pending);
        assert_eq!(RelayTxStatus::from("CANCELLED"), RelayTxStatus::Unknown);
    }
}

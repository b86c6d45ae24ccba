//! HTTP client for the monitor's minting API.

use std::time::Duration;

use serde::Deserialize;
use serde_json::json;
use thiserror::Error;
use url::Url;

const HTTP_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, Error)]
pub enum MonitorClientError {
    #[error("Invalid monitor URL: {0}")]
    Url(#[from] url::ParseError),

    /// Nothing is listening at the monitor address. Distinct from other
    /// transport failures so the scheduler can say so plainly.
    #[error("Connection refused by the monitor at {0}")]
    ConnectionRefused(String),

    #[error("Monitor request failed: {0}")]
    Transport(reqwest::Error),

    #[error("Monitor returned {status}: {body}")]
    Status { status: reqwest::StatusCode, body: String },
}

/// One job from `GET /api/pending-mints`.
#[derive(Debug, Clone, Deserialize)]
pub struct PendingMint {
    pub txid: String,
    pub amount: i64,
    pub timestamp: i64,
    #[serde(default)]
    pub sender_address: Option<String>,
}

#[derive(Clone)]
pub struct MonitorClient {
    base_url: Url,
    client: reqwest::Client,
}

impl MonitorClient {
    pub fn new(mut base_url: Url) -> Result<Self, MonitorClientError> {
        if !base_url.path().ends_with('/') {
            base_url.set_path(&format!("{}/", base_url.path()));
        }
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(HTTP_TIMEOUT_SECS))
            .build()
            .map_err(MonitorClientError::Transport)?;
        Ok(Self { base_url, client })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub async fn pending_mints(&self) -> Result<Vec<PendingMint>, MonitorClientError> {
        let url = self.base_url.join("api/pending-mints")?;
        let resp = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| self.map_transport(e))?;
        let resp = self.check_status(resp).await?;
        resp.json().await.map_err(MonitorClientError::Transport)
    }

    pub async fn confirm_mint(&self, txid: &str, inscription_id: &str) -> Result<(), MonitorClientError> {
        let url = self.base_url.join("api/confirm-mint")?;
        let body = json!({ "txid": txid, "inscription_id": inscription_id });
        let resp = self
            .client
            .post(url)
            .json(&body)
            .send()
            .await
            .map_err(|e| self.map_transport(e))?;
        self.check_status(resp).await?;
        Ok(())
    }

    fn map_transport(&self, e: reqwest::Error) -> MonitorClientError {
        if e.is_connect() {
            MonitorClientError::ConnectionRefused(self.base_url.to_string())
        } else {
            MonitorClientError::Transport(e)
        }
    }

    async fn check_status(&self, resp: reqwest::Response) -> Result<reqwest::Response, MonitorClientError> {
        if resp.status().is_success() {
            return Ok(resp);
        }
        let status = resp.status();
        let body = resp
            .text()
            .await
            .unwrap_or_else(|_| "Failed to read response body".into());
        Err(MonitorClientError::Status { status, body })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> MonitorClient {
        MonitorClient::new(Url::parse(&server.uri()).unwrap()).unwrap()
    }

    #[tokio::test]
    async fn pending_mints_decodes_queue() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/pending-mints"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                {"txid": "aa".repeat(32), "amount": 2000, "timestamp": 123, "sender_address": "bc1qsender"},
                {"txid": "bb".repeat(32), "amount": 1641, "timestamp": 456, "sender_address": null},
            ])))
            .mount(&server)
            .await;

        let mints = client_for(&server).pending_mints().await.unwrap();
        assert_eq!(mints.len(), 2);
        assert_eq!(mints[0].sender_address.as_deref(), Some("bc1qsender"));
        assert!(mints[1].sender_address.is_none());
    }

    #[tokio::test]
    async fn confirm_mint_posts_json_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/confirm-mint"))
            .and(body_json(serde_json::json!({
                "txid": "aabb",
                "inscription_id": "abc123i0",
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"success": true})))
            .expect(1)
            .mount(&server)
            .await;

        client_for(&server).confirm_mint("aabb", "abc123i0").await.unwrap();
    }

    #[tokio::test]
    async fn non_success_is_a_status_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(404).set_body_string("not found"))
            .mount(&server)
            .await;

        let err = client_for(&server).confirm_mint("aabb", "abc").await.unwrap_err();
        assert!(matches!(err, MonitorClientError::Status { .. }));
    }

    #[tokio::test]
    async fn connection_refused_is_distinct() {
        // Port 1 is reserved and closed on any sane test host.
        let client = MonitorClient::new(Url::parse("http://127.0.0.1:1").unwrap()).unwrap();
        let err = client.pending_mints().await.unwrap_err();
        assert!(matches!(err, MonitorClientError::ConnectionRefused(_)));
    }
}

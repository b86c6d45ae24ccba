//! Client for the upstream chain-explorer HTTP API.
//!
//! The explorer is an opaque JSON source (esplora-compatible): a listing
//! endpoint returning every transaction touching an address, and a detail
//! endpoint returning one transaction with full previous-output data. The
//! monitor treats it as the source of truth and itself as a faithful cache,
//! so failures here abort the current poll tick and are retried on the next
//! one; the client never retries inside a tick.

use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;
use url::Url;

#[derive(Debug, Error)]
pub enum ExplorerError {
    #[error("Invalid explorer URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("Explorer request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Explorer returned {status}: {body}")]
    Status { status: reqwest::StatusCode, body: String },
}

/// One transaction as reported by the explorer. `txid` and `vout` are
/// required; an entry missing either is malformed and skipped by the caller.
#[derive(Debug, Clone, Deserialize)]
pub struct ExplorerTx {
    pub txid: String,
    pub vout: Vec<TxOut>,
    #[serde(default)]
    pub vin: Vec<TxIn>,
    #[serde(default)]
    pub status: Option<TxStatus>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TxOut {
    #[serde(default)]
    pub scriptpubkey_address: Option<String>,
    #[serde(default)]
    pub value: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TxIn {
    #[serde(default)]
    pub prevout: Option<PrevOut>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PrevOut {
    #[serde(default)]
    pub scriptpubkey_address: Option<String>,
}

/// Confirmation state. Mempool entries carry no `block_height`; that is an
/// absent height, never zero.
#[derive(Debug, Clone, Deserialize)]
pub struct TxStatus {
    #[serde(default)]
    pub block_height: Option<i64>,
}

impl ExplorerTx {
    /// The first input address the explorer reports, if any.
    pub fn first_input_address(&self) -> Option<&str> {
        self.vin
            .iter()
            .find_map(|vin| vin.prevout.as_ref()?.scriptpubkey_address.as_deref())
    }

    pub fn block_height(&self) -> Option<i64> {
        self.status.as_ref().and_then(|s| s.block_height)
    }
}

pub struct ExplorerClient {
    base_url: Url,
    client: reqwest::Client,
}

impl ExplorerClient {
    pub fn new(mut base_url: Url, timeout: Duration) -> Result<Self, ExplorerError> {
        // Url::join drops the last path segment unless the base ends in '/'.
        if !base_url.path().ends_with('/') {
            base_url.set_path(&format!("{}/", base_url.path()));
        }
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { base_url, client })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// `GET {base}/address/{addr}/txs`. Returned as raw JSON values so one
    /// malformed entry cannot poison the whole listing; the ingestor decodes
    /// and skips per entry.
    pub async fn address_txs(&self, address: &str) -> Result<Vec<serde_json::Value>, ExplorerError> {
        self.get_json(&format!("address/{address}/txs")).await
    }

    /// `GET {base}/tx/{txid}`: the full transaction, with prevout data on
    /// every input.
    pub async fn tx_detail(&self, txid: &str) -> Result<ExplorerTx, ExplorerError> {
        self.get_json(&format!("tx/{txid}")).await
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, path: &str) -> Result<T, ExplorerError> {
        let url = self.base_url.join(path)?;
        let resp = self.client.get(url).send().await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp
                .text()
                .await
                .unwrap_or_else(|_| "Failed to read response body".into());
            return Err(ExplorerError::Status { status, body });
        }

        Ok(resp.json().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> ExplorerClient {
        let base = Url::parse(&format!("{}/", server.uri())).unwrap();
        ExplorerClient::new(base, Duration::from_secs(5)).unwrap()
    }

    #[tokio::test]
    async fn address_txs_returns_raw_entries() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/address/bc1qwatched/txs"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                {"txid": "aa", "vout": []},
                {"not": "a transaction"},
            ])))
            .mount(&server)
            .await;

        let txs = client_for(&server).address_txs("bc1qwatched").await.unwrap();
        assert_eq!(txs.len(), 2);
    }

    #[tokio::test]
    async fn tx_detail_decodes_prevouts_and_height() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/tx/aabb"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "txid": "aabb",
                "vout": [{"scriptpubkey_address": "bc1qwatched", "value": 2000}],
                "vin": [
                    {"prevout": null},
                    {"prevout": {"scriptpubkey_address": "bc1qsender"}},
                ],
                "status": {"confirmed": true, "block_height": 840000},
            })))
            .mount(&server)
            .await;

        let tx = client_for(&server).tx_detail("aabb").await.unwrap();
        assert_eq!(tx.first_input_address(), Some("bc1qsender"));
        assert_eq!(tx.block_height(), Some(840000));
    }

    #[tokio::test]
    async fn mempool_entry_has_absent_height() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/tx/ccdd"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "txid": "ccdd",
                "vout": [],
                "status": {"confirmed": false},
            })))
            .mount(&server)
            .await;

        let tx = client_for(&server).tx_detail("ccdd").await.unwrap();
        assert_eq!(tx.block_height(), None);
    }

    #[tokio::test]
    async fn non_success_status_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(502).set_body_string("bad gateway"))
            .mount(&server)
            .await;

        let err = client_for(&server).address_txs("bc1qwatched").await.unwrap_err();
        assert!(matches!(err, ExplorerError::Status { .. }));
    }
}

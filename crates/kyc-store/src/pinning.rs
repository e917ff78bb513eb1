//! # HTTP Pinning Store
//!
//! Uploads go to `POST {api_url}/pinning/pinFileToIPFS` as multipart with
//! a bearer token; the service answers `{"IpfsHash": "<cid>"}`. Reads go
//! to `GET {gateway_url}/ipfs/{cid}`.
//!
//! ## Status Mapping
//!
//! | Response                  | Error            |
//! |---------------------------|------------------|
//! | 404                       | `NotFound`       |
//! | 413, 429                  | `QuotaExceeded`  |
//! | other non-2xx, transport  | `Unavailable`    |
//! | 2xx with malformed body   | `Unavailable`    |

use std::time::Duration;

use async_trait::async_trait;
use kyc_core::Cid;
use reqwest::StatusCode;
use serde::Deserialize;

use crate::config::PinningConfig;
use crate::error::StoreError;
use crate::ContentStore;

#[derive(Debug, Deserialize)]
struct PinResponse {
    #[serde(rename = "IpfsHash")]
    ipfs_hash: String,
}

/// Content store backed by an HTTP pinning service.
#[derive(Debug, Clone)]
pub struct PinningStore {
    http: reqwest::Client,
    config: PinningConfig,
}

impl PinningStore {
    /// Build a client from configuration.
    pub fn new(config: PinningConfig) -> Result<Self, StoreError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| StoreError::Unavailable(format!("client init: {e}")))?;
        Ok(Self { http, config })
    }

    fn endpoint(&self, base: &url::Url, path: &str) -> Result<url::Url, StoreError> {
        base.join(path)
            .map_err(|e| StoreError::Unavailable(format!("invalid endpoint {path}: {e}")))
    }
}

fn map_status(status: StatusCode, body: String, cid: Option<&Cid>) -> StoreError {
    match (status, cid) {
        (StatusCode::NOT_FOUND, Some(cid)) => StoreError::NotFound(cid.clone()),
        (StatusCode::PAYLOAD_TOO_LARGE, _) | (StatusCode::TOO_MANY_REQUESTS, _) => {
            StoreError::QuotaExceeded(format!("{status}: {body}"))
        }
        _ => StoreError::Unavailable(format!("{status}: {body}")),
    }
}

#[async_trait]
impl ContentStore for PinningStore {
    async fn put(&self, bytes: &[u8], name_hint: &str) -> Result<Cid, StoreError> {
        if bytes.len() > self.config.max_blob_bytes {
            return Err(StoreError::QuotaExceeded(format!(
                "blob of {} bytes exceeds limit of {}",
                bytes.len(),
                self.config.max_blob_bytes
            )));
        }
        let url = self.endpoint(&self.config.api_url, "pinning/pinFileToIPFS")?;
        let metadata = serde_json::json!({ "name": name_hint }).to_string();
        let form = reqwest::multipart::Form::new()
            .part(
                "file",
                reqwest::multipart::Part::bytes(bytes.to_vec()).file_name(name_hint.to_string()),
            )
            .text("pinataMetadata", metadata);

        let resp = self
            .http
            .post(url)
            .bearer_auth(&self.config.jwt)
            .multipart(form)
            .send()
            .await
            .map_err(|e| StoreError::Unavailable(format!("pin request: {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(map_status(status, body, None));
        }
        let pinned: PinResponse = resp
            .json()
            .await
            .map_err(|e| StoreError::Unavailable(format!("malformed pin response: {e}")))?;
        Cid::parse(pinned.ipfs_hash)
            .map_err(|e| StoreError::Unavailable(format!("pin response carried {e}")))
    }

    async fn get(&self, cid: &Cid) -> Result<Vec<u8>, StoreError> {
        let url = self.endpoint(&self.config.gateway_url, &format!("ipfs/{cid}"))?;
        let resp = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| StoreError::Unavailable(format!("gateway request: {e}")))?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(map_status(status, body, Some(cid)));
        }
        resp.bytes()
            .await
            .map(|b| b.to_vec())
            .map_err(|e| StoreError::Unavailable(format!("gateway body: {e}")))
    }
}

//! # REST Ledger Gateway Client
//!
//! | Call                   | Endpoint                                 |
//! |------------------------|------------------------------------------|
//! | `submit_fact`          | `POST /v1/facts` `{fact, nonce}`         |
//! | `await_confirmation`   | `GET /v1/transactions/{id}` (polled)     |
//! | `has_access`           | `GET /v1/access/{grantor}/{subject}`     |
//!
//! Transaction status bodies are `{"status": "pending"}`,
//! `{"status": "confirmed", "tx_ref", "block_height"}` or
//! `{"status": "failed", "reason"}`. Polling continues while pending; the
//! caller's confirmation timeout bounds the wait.

use std::time::Duration;

use async_trait::async_trait;
use kyc_core::{Timestamp, TxRef, UserId};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};

use crate::config::LedgerGatewayConfig;
use crate::error::LedgerError;
use crate::fact::{Confirmation, LedgerFact, PendingTx};
use crate::Ledger;

#[derive(Serialize)]
struct SubmitRequest<'a> {
    fact: &'a LedgerFact,
    nonce: u64,
}

#[derive(Deserialize)]
struct SubmitResponse {
    pending_id: String,
}

#[derive(Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
enum TransactionStatus {
    Pending,
    Confirmed { tx_ref: TxRef, block_height: u64 },
    Failed { reason: String },
}

#[derive(Deserialize)]
struct AccessResponse {
    active: bool,
}

/// Ledger reached through a REST gateway.
#[derive(Debug, Clone)]
pub struct LedgerGateway {
    http: reqwest::Client,
    config: LedgerGatewayConfig,
}

impl LedgerGateway {
    pub fn new(config: LedgerGatewayConfig) -> Result<Self, LedgerError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| LedgerError::Transport(format!("client init: {e}")))?;
        Ok(Self { http, config })
    }

    fn url(&self, path: &str) -> Result<url::Url, LedgerError> {
        self.config
            .base_url
            .join(path)
            .map_err(|e| LedgerError::Transport(format!("invalid endpoint {path}: {e}")))
    }

    async fn check(resp: reqwest::Response) -> Result<reqwest::Response, LedgerError> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        let body = resp.text().await.unwrap_or_default();
        if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
            Err(LedgerError::Transport(format!("{status}: {body}")))
        } else {
            Err(LedgerError::Rejected(format!("{status}: {body}")))
        }
    }
}

#[async_trait]
impl Ledger for LedgerGateway {
    async fn submit_fact(&self, fact: &LedgerFact, nonce: u64) -> Result<PendingTx, LedgerError> {
        let resp = self
            .http
            .post(self.url("v1/facts")?)
            .bearer_auth(&self.config.token)
            .json(&SubmitRequest { fact, nonce })
            .send()
            .await
            .map_err(|e| LedgerError::Transport(e.to_string()))?;
        let body: SubmitResponse = Self::check(resp)
            .await?
            .json()
            .await
            .map_err(|e| LedgerError::Malformed(e.to_string()))?;
        Ok(PendingTx {
            id: body.pending_id,
            nonce,
            fact: fact.clone(),
            submitted_at: Timestamp::now(),
        })
    }

    async fn await_confirmation(&self, pending: &PendingTx) -> Result<Confirmation, LedgerError> {
        let url = self.url(&format!("v1/transactions/{}", pending.id))?;
        let poll = Duration::from_millis(self.config.poll_interval_ms);
        loop {
            let resp = self
                .http
                .get(url.clone())
                .bearer_auth(&self.config.token)
                .send()
                .await
                .map_err(|e| LedgerError::Transport(e.to_string()))?;
            let status: TransactionStatus = Self::check(resp)
                .await?
                .json()
                .await
                .map_err(|e| LedgerError::Malformed(e.to_string()))?;
            match status {
                TransactionStatus::Pending => tokio::time::sleep(poll).await,
                TransactionStatus::Confirmed { tx_ref, block_height } => {
                    return Ok(Confirmation::Confirmed { tx_ref, block_height })
                }
                TransactionStatus::Failed { reason } => return Ok(Confirmation::Failed { reason }),
            }
        }
    }

    async fn has_access(&self, grantor: &UserId, subject: &UserId) -> Result<bool, LedgerError> {
        let url = self.url(&format!("v1/access/{}/{}", grantor.as_uuid(), subject.as_uuid()))?;
        let resp = self
            .http
            .get(url)
            .bearer_auth(&self.config.token)
            .send()
            .await
            .map_err(|e| LedgerError::Transport(e.to_string()))?;
        let body: AccessResponse = Self::check(resp)
            .await?
            .json()
            .await
            .map_err(|e| LedgerError::Malformed(e.to_string()))?;
        Ok(body.active)
    }
}

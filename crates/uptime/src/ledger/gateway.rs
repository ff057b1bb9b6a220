//! Ledger access through a JSON gateway in front of the ledger node.
//!
//! - `GET  {endpoint}/actors/{actor}/state` returns the decoded actor state
//! - `GET  {endpoint}/wallets` lists the wallets of the node
//! - `POST {endpoint}/messages` pushes a message to the pool
//! - `GET  {endpoint}/messages/{cid}/receipt` waits for its receipt

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use url::Url;

use super::registry::LedgerState;
use super::snapshot::Snapshot;
use super::transaction::Transaction;
use super::wallet::WalletSelector;
use super::{LedgerReader, LedgerSubmitter};
use crate::error::LedgerError;

/// Time allowed for a read or a message push
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Time allowed for a message to be included and executed
const RECEIPT_TIMEOUT: Duration = Duration::from_secs(600);

#[derive(Debug, Serialize)]
struct MessageRequest<'a> {
    to: &'a str,
    from: &'a str,
    method: u64,
    /// Hex encoded params
    params: String,
}

#[derive(Debug, Deserialize)]
struct MessageResponse {
    cid: String,
}

#[derive(Debug, Deserialize)]
struct Receipt {
    exit_code: i64,
}

/// Reader and submitter backed by the ledger gateway
#[derive(Debug, Clone)]
pub struct GatewayLedger {
    client: reqwest::Client,
    endpoint: Url,
    actor_address: String,
    wallet: WalletSelector,
}

impl GatewayLedger {
    pub fn new(
        endpoint: &str,
        actor_address: impl Into<String>,
        wallet: WalletSelector,
    ) -> Result<Self, LedgerError> {
        let client = reqwest::Client::builder().user_agent("uptime-checker/1.0").build()?;

        Ok(Self { client, endpoint: normalize_endpoint(endpoint)?, actor_address: actor_address.into(), wallet })
    }

    pub fn actor_address(&self) -> &str {
        &self.actor_address
    }

    fn url(&self, path: &str) -> Result<Url, LedgerError> {
        Ok(self.endpoint.join(path)?)
    }

    /// Address of the configured wallet
    pub async fn wallet_address(&self) -> Result<String, LedgerError> {
        let wallets: Vec<String> = self
            .client
            .get(self.url("wallets")?)
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        self.wallet.select(&wallets).map(str::to_string)
    }

    async fn push(&self, from: &str, transaction: &Transaction) -> Result<String, LedgerError> {
        let request = MessageRequest {
            to: &self.actor_address,
            from,
            method: transaction.method().number(),
            params: hex::encode(transaction.params()?),
        };

        let response: MessageResponse = self
            .client
            .post(self.url("messages")?)
            .timeout(REQUEST_TIMEOUT)
            .json(&request)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        Ok(response.cid)
    }

    async fn wait(&self, cid: &str) -> Result<(), LedgerError> {
        let receipt: Receipt = self
            .client
            .get(self.url(&format!("messages/{}/receipt", cid))?)
            .timeout(RECEIPT_TIMEOUT)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        if receipt.exit_code != 0 {
            return Err(LedgerError::ExecutionFailed(receipt.exit_code));
        }
        Ok(())
    }
}

/// Make sure relative joins land under the endpoint path
fn normalize_endpoint(endpoint: &str) -> Result<Url, LedgerError> {
    let mut url = Url::parse(endpoint)?;
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}

#[async_trait]
impl LedgerReader for GatewayLedger {
    async fn load(&self) -> Result<Snapshot, LedgerError> {
        let url = self.url(&format!("actors/{}/state", self.actor_address))?;

        let state: LedgerState = self
            .client
            .get(url)
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        Ok(Snapshot::from_state(&state))
    }
}

#[async_trait]
impl LedgerSubmitter for GatewayLedger {
    async fn submit(&self, transaction: Transaction) -> Result<(), LedgerError> {
        let from = self.wallet_address().await?;
        let method = transaction.method();

        debug!(%method, from = %from, "pushing message");
        let cid = self.push(&from, &transaction).await?;

        info!(%method, cid = %cid, "waiting for message to execute");
        self.wait(&cid).await
    }
}

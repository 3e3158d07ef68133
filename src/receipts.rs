//! Receipt source boundary.
//!
//! Retailer receipt APIs are external collaborators; this module only
//! defines the seam they plug into. A source is stateless — it is handed a
//! fresh bearer token per fetch, with token freshness managed by the
//! session layer.

use anyhow::Result;
use async_trait::async_trait;

use crate::platform::Platform;
use crate::session::SessionHandle;

/// A purchase receipt as listed by a retailer.
#[derive(Clone, Debug, PartialEq)]
pub struct ReceiptSummary {
    /// The retailer's own receipt identifier.
    pub store_provided_id: String,
    /// ISO 8601 purchase timestamp, as the retailer reports it.
    pub date: String,
    /// Receipt total in cents.
    pub total_amount: i64,
}

/// One retailer's receipt listing.
#[async_trait]
pub trait ReceiptSource: Send + Sync {
    fn platform(&self) -> Platform;

    /// Fetch the latest receipts with a live access token.
    async fn fetch_latest(&self, access_token: &str) -> Result<Vec<ReceiptSummary>>;
}

/// Fetch receipts for a linked account, refreshing its token as needed.
///
/// Failure to obtain a fresh token surfaces as a status string, the same
/// shape every linking outcome takes.
pub async fn fetch_receipts(
    handle: &SessionHandle,
    http: &reqwest::Client,
    source: &dyn ReceiptSource,
) -> Result<Vec<ReceiptSummary>, String> {
    let access_token = handle
        .fresh_access_token(http)
        .await
        .map_err(|e| format!("could not get fresh token ({})", e))?;

    source
        .fetch_latest(&access_token)
        .await
        .map_err(|e| format!("network error: {}", e))
}

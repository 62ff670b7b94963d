use anyhow::{Context, Result};
use reqwest::Client;
use std::time::Duration;

use super::report::ReportBundle;

/// Destination for completed-session reports. One call is one delivery attempt;
/// retries belong to the dispatcher.
#[async_trait::async_trait]
pub trait ReportSink: Send + Sync {
    async fn deliver(&self, report: &ReportBundle) -> Result<()>;
    fn name(&self) -> &'static str;
}

/// Authenticated JSON POST (`x-api-key` header).
pub struct HttpReportSink {
    url: String,
    api_key: Option<String>,
    client: Client,
    timeout: Duration,
}

impl HttpReportSink {
    pub fn new(url: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            url: url.into(),
            api_key,
            client: Client::new(),
            timeout: Duration::from_secs(10),
        }
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout = Duration::from_secs(secs);
        self
    }
}

#[async_trait::async_trait]
impl ReportSink for HttpReportSink {
    async fn deliver(&self, report: &ReportBundle) -> Result<()> {
        let mut req = self
            .client
            .post(&self.url)
            .timeout(self.timeout)
            .header("accept", "application/json")
            .json(report);
        if let Some(key) = &self.api_key {
            req = req.header("x-api-key", key);
        }
        req.send()
            .await
            .context("report post")?
            .error_for_status()
            .context("report sink non-2xx")?;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "http"
    }
}

use reqwest::{Client, Response, StatusCode};
use serde::{Deserialize, Serialize};

pub type Error = Box<dyn std::error::Error + Send + Sync>;

const VERSION_HEADER: &str = "x-config-version";
const WAIT_OUTCOME_HEADER: &str = "x-wait-outcome";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Palette {
    pub colors: Vec<String>,
    pub display_duration_ms: u32,
    pub fadeout_duration_ms: u32,
}

/// A palette together with the version token the server sent with it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fetched {
    pub palette: Palette,
    pub version: u64,
    /// `immediate`, `changed` or `timeout`.
    pub outcome: String,
}

pub struct PaletteClient {
    client: Client,
    base_url: String,
}

impl PaletteClient {
    pub fn new(base_url: &str) -> Self {
        Self::with_client(Client::new(), base_url)
    }

    pub fn with_client(client: Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Current palette, without waiting.
    pub async fn fetch(&self) -> Result<Fetched, Error> {
        let resp = self
            .client
            .get(format!("{}/colors", self.base_url))
            .send()
            .await?;
        Self::into_fetched(resp).await
    }

    /// Hang until the version moves past `baseline` or the server's bound
    /// elapses. On timeout the returned version equals `baseline`.
    pub async fn wait_for_change(&self, baseline: u64) -> Result<Fetched, Error> {
        let resp = self
            .client
            .get(format!("{}/colors", self.base_url))
            .query(&[("hang", "1".to_string()), ("baseline", baseline.to_string())])
            .send()
            .await?;
        Self::into_fetched(resp).await
    }

    /// Publish a palette; returns the version it was stored under.
    pub async fn publish(&self, palette: &Palette) -> Result<u64, Error> {
        self.publish_raw(&serde_json::to_value(palette)?).await
    }

    /// Publish an arbitrary JSON body. Rejections come back as errors whose
    /// message is the server's one-line explanation.
    pub async fn publish_raw(&self, body: &serde_json::Value) -> Result<u64, Error> {
        let resp = self
            .client
            .post(format!("{}/colors", self.base_url))
            .json(body)
            .send()
            .await?;

        let status = resp.status();
        let version = version_of(&resp);
        let text = resp.text().await?;

        if status != StatusCode::OK {
            return Err(error_status(status, &text));
        }
        version.ok_or_else(|| "Response is missing the version header".into())
    }

    /// Accepted colors and bounds.
    pub async fn limits(&self) -> Result<serde_json::Value, Error> {
        let resp = self
            .client
            .get(format!("{}/limits", self.base_url))
            .send()
            .await?
            .error_for_status()?;
        Ok(resp.json().await?)
    }

    async fn into_fetched(resp: Response) -> Result<Fetched, Error> {
        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(error_status(status, &text));
        }

        let version = version_of(&resp).ok_or("Response is missing the version header")?;
        let outcome = resp
            .headers()
            .get(WAIT_OUTCOME_HEADER)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("immediate")
            .to_string();
        let palette: Palette = resp.json().await?;

        Ok(Fetched {
            palette,
            version,
            outcome,
        })
    }
}

fn version_of(resp: &Response) -> Option<u64> {
    resp.headers()
        .get(VERSION_HEADER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse().ok())
}

fn error_status(status: StatusCode, body: &str) -> Error {
    format!("Server returned error status {}: {}", status, body.trim_end()).into()
}

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use tracing::instrument;

use beacon_core::config::ApiConfig;
use beacon_core::errors::TransportError;
use beacon_core::outcomes::OutcomeReport;
use beacon_core::transport::{OutcomeAck, OutcomeTransport, PlayerAck, PlayerUpsert};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// REST client for the outcome and player endpoints.
pub struct ApiClient {
    http: Client,
    base_url: String,
    api_key: Option<SecretString>,
    timeout: Duration,
}

impl ApiClient {
    pub fn new(config: &ApiConfig) -> Self {
        Self {
            http: Client::builder()
                .connect_timeout(CONNECT_TIMEOUT)
                .timeout(config.timeout())
                .build()
                .expect("failed to build HTTP client"),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone().map(SecretString::from),
            timeout: config.timeout(),
        }
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    async fn post_json<B, R>(&self, path: &str, body: &B) -> Result<R, TransportError>
    where
        B: serde::Serialize + Sync,
        R: serde::de::DeserializeOwned,
    {
        let mut req = self.http.post(self.endpoint(path));
        if let Some(key) = &self.api_key {
            req = req.header("authorization", format!("Key {}", key.expose_secret()));
        }
        req = req.header("accept", "application/json");

        let response = req.json(body).send().await.map_err(|e| {
            if e.is_timeout() {
                TransportError::Timeout(self.timeout)
            } else {
                TransportError::NetworkError(e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TransportError::from_status(status.as_u16(), body));
        }

        response
            .json::<R>()
            .await
            .map_err(|e| TransportError::MalformedResponse(e.to_string()))
    }
}

#[async_trait]
impl OutcomeTransport for ApiClient {
    #[instrument(skip(self, report), fields(outcome_id = %report.id))]
    async fn send_outcome(&self, report: &OutcomeReport) -> Result<OutcomeAck, TransportError> {
        self.post_json("outcomes", report).await
    }

    #[instrument(skip(self, player))]
    async fn upsert_player(&self, player: &PlayerUpsert) -> Result<PlayerAck, TransportError> {
        self.post_json("players", player).await
    }
}

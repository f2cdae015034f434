use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::{header::CONTENT_TYPE, Client, Url};
use serde_json::Value;
use std::time::Duration;
use traceqa_config::MatcherConfig;
use traceqa_core::{CoreError, CoreResult, MatchRequest, MatchResponse, MatchService};

/// HTTP client for the similarity matching endpoint.
///
/// POSTs `{"query": ..., "corpus": [...]}` and expects
/// `{"matched": ..., "score": ...}` back.
#[derive(Clone)]
pub struct HttpMatcher {
    cfg: MatcherConfig,
    http: Client,
}

impl HttpMatcher {
    pub fn new(cfg: MatcherConfig) -> Result<Self> {
        let timeout = Duration::from_secs_f64(cfg.timeout_seconds.max(1.0));
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to construct reqwest client")?;

        Ok(Self { cfg, http })
    }

    pub fn config(&self) -> &MatcherConfig {
        &self.cfg
    }

    fn endpoint(&self) -> Result<Url> {
        Url::parse(&self.cfg.url).context("invalid matcher URL")
    }

    pub async fn request_match(&self, request: &MatchRequest<'_>) -> Result<MatchResponse> {
        let response = self
            .http
            .post(self.endpoint()?)
            .header(CONTENT_TYPE, "application/json")
            .json(request)
            .send()
            .await
            .context("matcher request failed")?;
        let status = response.status();
        let text = response.text().await.with_context(|| {
            format!("failed to read matcher response body (status {})", status)
        })?;

        if !status.is_success() {
            return Err(anyhow!("matcher returned {}: {}", status, text));
        }

        parse_match_response(&text)
    }
}

fn parse_match_response(raw: &str) -> Result<MatchResponse> {
    let value: Value = serde_json::from_str(raw)
        .with_context(|| format!("invalid matcher JSON response: {}", raw))?;
    let matched = value
        .get("matched")
        .and_then(Value::as_str)
        .ok_or_else(|| anyhow!("missing `matched` in matcher response"))?;
    let score = value
        .get("score")
        .and_then(Value::as_f64)
        .ok_or_else(|| anyhow!("missing numeric `score` in matcher response"))?;

    Ok(MatchResponse {
        matched: matched.to_string(),
        score,
    })
}

#[async_trait]
impl MatchService for HttpMatcher {
    async fn best_match(&self, request: MatchRequest<'_>) -> CoreResult<MatchResponse> {
        self.request_match(&request)
            .await
            .map_err(|err| CoreError::match_service(format!("{err:#}")))
    }
}

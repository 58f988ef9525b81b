use std::collections::HashMap;

use async_trait::async_trait;
use common::{PipelineError, Upstream};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{status_error, transport};

/// Confidence per sentiment label. Scores are non-negative.
#[derive(Debug, Clone, Copy, Default, PartialEq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SentimentScores {
    #[serde(default)]
    pub positive: f64,
    #[serde(default)]
    pub negative: f64,
    #[serde(default)]
    pub neutral: f64,
    #[serde(default)]
    pub mixed: f64,
}

impl SentimentScores {
    /// Scores keyed by label. Iteration order of the map is unspecified.
    pub fn by_label(&self) -> HashMap<&'static str, f64> {
        HashMap::from([
            ("Positive", self.positive),
            ("Negative", self.negative),
            ("Neutral", self.neutral),
            ("Mixed", self.mixed),
        ])
    }
}

/// Sentiment classification and key-phrase extraction.
#[async_trait]
pub trait TextAnalyzer: Send + Sync {
    async fn sentiment(&self, text: &str) -> Result<SentimentScores, PipelineError>;

    /// Key phrases in the order the service returned them.
    async fn key_phrases(&self, text: &str) -> Result<Vec<String>, PipelineError>;
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct AnalysisRequest<'a> {
    text: &'a str,
    language_code: &'a str,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct SentimentResponse {
    #[serde(default)]
    sentiment: Option<String>,
    sentiment_score: SentimentScores,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct KeyPhrasesResponse {
    #[serde(default)]
    key_phrases: Vec<KeyPhrase>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct KeyPhrase {
    text: String,
}

/// Text analysis over HTTP.
#[derive(Debug, Clone)]
pub struct HttpTextAnalyzer {
    client: reqwest::Client,
    endpoint: String,
    language_code: String,
}

impl HttpTextAnalyzer {
    pub fn new(client: reqwest::Client, endpoint: &str, language_code: &str) -> Self {
        Self {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            language_code: language_code.to_string(),
        }
    }

    async fn call<T: DeserializeOwned>(
        &self,
        operation: &str,
        text: &str,
    ) -> Result<T, PipelineError> {
        let response = self
            .client
            .post(format!("{}/{operation}", self.endpoint))
            .json(&AnalysisRequest {
                text,
                language_code: &self.language_code,
            })
            .send()
            .await
            .map_err(transport(Upstream::TextAnalysis))?;

        if !response.status().is_success() {
            return Err(status_error(Upstream::TextAnalysis, response).await);
        }

        response.json::<T>().await.map_err(|e| {
            PipelineError::upstream(Upstream::TextAnalysis, format!("invalid {operation} response: {e}"))
        })
    }
}

#[async_trait]
impl TextAnalyzer for HttpTextAnalyzer {
    async fn sentiment(&self, text: &str) -> Result<SentimentScores, PipelineError> {
        let response: SentimentResponse = self.call("detect-sentiment", text).await?;
        debug!(sentiment = ?response.sentiment, scores = ?response.sentiment_score, "Sentiment detected");
        Ok(response.sentiment_score)
    }

    async fn key_phrases(&self, text: &str) -> Result<Vec<String>, PipelineError> {
        let response: KeyPhrasesResponse = self.call("detect-key-phrases", text).await?;
        Ok(response.key_phrases.into_iter().map(|p| p.text).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn analyzer(server: &MockServer) -> HttpTextAnalyzer {
        HttpTextAnalyzer::new(reqwest::Client::new(), &server.uri(), "en")
    }

    #[tokio::test]
    async fn sentiment_parses_scores() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/detect-sentiment"))
            .and(body_json(json!({"Text": "I love sunny days", "LanguageCode": "en"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "Sentiment": "POSITIVE",
                "SentimentScore": {"Positive": 0.9, "Negative": 0.05, "Neutral": 0.03, "Mixed": 0.02}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let scores = analyzer(&server).sentiment("I love sunny days").await.unwrap();
        assert_eq!(scores.positive, 0.9);
        assert_eq!(scores.mixed, 0.02);
        assert_eq!(scores.by_label()["Negative"], 0.05);
    }

    #[tokio::test]
    async fn key_phrases_keep_service_order() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/detect-key-phrases"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "KeyPhrases": [
                    {"Text": "sunny days", "Score": 0.99},
                    {"Text": "the beach", "Score": 0.42}
                ]
            })))
            .mount(&server)
            .await;

        let phrases = analyzer(&server).key_phrases("x").await.unwrap();
        assert_eq!(phrases, ["sunny days", "the beach"]);
    }

    #[tokio::test]
    async fn service_failure_is_upstream_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503).set_body_string("throttled"))
            .mount(&server)
            .await;

        let err = analyzer(&server).sentiment("x").await.unwrap_err();
        match err {
            PipelineError::Upstream {
                service,
                status,
                message,
            } => {
                assert_eq!(service, Upstream::TextAnalysis);
                assert_eq!(status, Some(503));
                assert_eq!(message, "throttled");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}

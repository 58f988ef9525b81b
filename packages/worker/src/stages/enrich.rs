use std::sync::Arc;

use async_trait::async_trait;
use common::{EnrichedPrompt, GenerationRequest, PipelineError};
use tracing::{info, instrument};

use crate::clients::{SentimentScores, TextAnalyzer};
use crate::pipeline::{Emit, Stage, StageNode, Topology};

const PROMPT_PREFIX: &str = "Generate a image based on the following key words: ";

/// Label with the highest score, or `""` when no score is above zero.
///
/// Only a strictly greater score replaces the running maximum, so on a tie
/// the label seen first wins. Labels are visited in `HashMap` order, which
/// is unspecified: tied inputs may give different labels between runs.
pub fn top_sentiment(scores: &SentimentScores) -> &'static str {
    let mut top = "";
    let mut max = 0.0;
    for (label, score) in scores.by_label() {
        if score > max {
            max = score;
            top = label;
        }
    }
    top
}

pub fn sentiment_token(label: &str) -> &str {
    match label {
        "Positive" => "happy",
        "Negative" => "sad",
        "Neutral" | "Mixed" => "neutral",
        other => other,
    }
}

/// The token always takes the first slot, even when empty.
pub fn build_prompt(token: &str, phrases: &[String]) -> String {
    let mut words = Vec::with_capacity(phrases.len() + 1);
    words.push(token);
    words.extend(phrases.iter().map(String::as_str));
    format!("{PROMPT_PREFIX}{}", words.join(" "))
}

/// Turns raw client text into a generation prompt.
pub struct EnrichStage {
    analyzer: Arc<dyn TextAnalyzer>,
}

impl EnrichStage {
    pub fn new(analyzer: Arc<dyn TextAnalyzer>) -> Self {
        Self { analyzer }
    }
}

#[async_trait]
impl Stage for EnrichStage {
    type Input = GenerationRequest;

    fn node(&self) -> StageNode {
        StageNode::Enrich
    }

    #[instrument(skip_all, fields(connection_id = %input.key.connection_id, storage_key = %input.key.storage_key))]
    async fn handle(&self, input: GenerationRequest) -> Result<Option<Emit>, PipelineError> {
        let scores = self.analyzer.sentiment(&input.text).await?;
        let phrases = self.analyzer.key_phrases(&input.text).await?;

        let prompt = build_prompt(sentiment_token(top_sentiment(&scores)), &phrases);
        info!(
            prompt = %prompt,
            strategy = %input.strategy,
            route = %Topology::route_label(input.strategy),
            "Prompt built"
        );

        Emit::event(
            StageNode::Generate,
            &EnrichedPrompt {
                key: input.key,
                prompt,
                strategy: input.strategy,
            },
        )
        .map(Some)
    }
}

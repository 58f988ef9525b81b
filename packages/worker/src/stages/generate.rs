use async_trait::async_trait;
use common::{EnrichedPrompt, GeneratedImage, ImageReady, PipelineError};
use tracing::{info, instrument};

use super::{Finisher, Generators};
use crate::pipeline::{Emit, Stage, StageNode};

/// Runs the generator selected by the request's strategy.
///
/// Bytes are persisted and delivered here. A remote URL is handed to the
/// upload stage as an [`ImageReady`] event.
pub struct GenerateStage {
    generators: Generators,
    finisher: Finisher,
}

impl GenerateStage {
    pub fn new(generators: Generators, finisher: Finisher) -> Self {
        Self {
            generators,
            finisher,
        }
    }
}

#[async_trait]
impl Stage for GenerateStage {
    type Input = EnrichedPrompt;

    fn node(&self) -> StageNode {
        StageNode::Generate
    }

    #[instrument(skip_all, fields(connection_id = %input.key.connection_id, storage_key = %input.key.storage_key, strategy = %input.strategy))]
    async fn handle(&self, input: EnrichedPrompt) -> Result<Option<Emit>, PipelineError> {
        let generator = self.generators.select(input.strategy)?;

        let target = if input.strategy.persists_inline() {
            Some(self.finisher.preflight()?)
        } else {
            None
        };

        match generator.generate(&input.prompt, &input.key).await? {
            GeneratedImage::Bytes { data, content_type } => {
                let target = match target {
                    Some(target) => target,
                    None => self.finisher.preflight()?,
                };
                self.finisher
                    .finish(&target, &input.key, &data, content_type)
                    .await?;
                Ok(None)
            }
            GeneratedImage::Remote { url } => {
                info!(url = %url, "Image generated remotely");
                Emit::event(
                    StageNode::Upload,
                    &ImageReady {
                        key: input.key,
                        url,
                    },
                )
                .map(Some)
            }
        }
    }
}

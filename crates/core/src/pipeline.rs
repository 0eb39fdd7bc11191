//! Capture-to-answer orchestration.
//!
//! The pipeline sits between the collaborators: it takes an already-encoded
//! capture plus the user's region selection, verifies configuration before
//! any network traffic, drives the inference client, and relays progress to
//! a presentation sink. The last request is kept so a retry can re-issue it
//! without re-prompting for selection.

use crate::cancel::CancelToken;
use crate::config::Config;
use crate::error::{AppError, Result};
use crate::geometry::SourceRect;
use crate::openai::OpenAiClient;
use log::info;

/// Receives the progress of one analysis request.
pub trait AnswerSink: Send {
    /// Cumulative answer text so far; called once per stream delta.
    fn on_partial(&mut self, text: &str);
    /// Terminal success with the full answer.
    fn on_done(&mut self, final_text: &str);
    /// Terminal failure.
    fn on_error(&mut self, error: &AppError);
}

/// Everything needed to issue (or re-issue) one analysis.
#[derive(Clone, Debug)]
pub struct AnalysisRequest {
    /// Base64 JPEG of the captured frame. The full frame is sent; pixel
    /// cropping belongs to the capture collaborator.
    pub image_base64: String,
    pub model_id: String,
    /// The selected region mapped to source pixels.
    pub source_rect: Option<SourceRect>,
}

/// Orchestrates capture → selection → inference → presentation.
pub struct CaptureAnswerPipeline {
    config: Config,
    client: OpenAiClient,
    last_request: Option<AnalysisRequest>,
}

impl CaptureAnswerPipeline {
    pub fn new(config: Config) -> Self {
        let client = OpenAiClient::new(&config);
        Self {
            config,
            client,
            last_request: None,
        }
    }

    pub fn client(&self) -> &OpenAiClient {
        &self.client
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Replaces the connection settings, rebuilding the client. The recorded
    /// last request survives, so a retry after a settings change goes out
    /// with the new credentials.
    pub fn set_config(&mut self, config: Config) {
        self.client = OpenAiClient::new(&config);
        self.config = config;
    }

    /// Whether a retry has something to re-run.
    pub fn has_last_request(&self) -> bool {
        self.last_request.is_some()
    }

    /// Runs a request, streaming cumulative partials into `sink` and
    /// finishing with `on_done` or `on_error`. The request is recorded for
    /// [`retry`](Self::retry) even when it fails.
    pub async fn run(
        &mut self,
        request: AnalysisRequest,
        sink: &mut dyn AnswerSink,
        cancel: &CancelToken,
    ) -> Result<String> {
        self.last_request = Some(request.clone());
        self.execute(request, sink, cancel).await
    }

    /// Re-runs the previous request with the same already-selected region.
    pub async fn retry(
        &mut self,
        sink: &mut dyn AnswerSink,
        cancel: &CancelToken,
    ) -> Result<String> {
        let Some(request) = self.last_request.clone() else {
            return Err(AppError::Unknown(
                "No previous request to retry".to_string(),
            ));
        };
        self.execute(request, sink, cancel).await
    }

    async fn execute(
        &self,
        request: AnalysisRequest,
        sink: &mut dyn AnswerSink,
        cancel: &CancelToken,
    ) -> Result<String> {
        // Configuration is verified before any network call is attempted.
        if !self.config.has_api_key() {
            let err = AppError::config("API key is not configured");
            sink.on_error(&err);
            return Err(err);
        }

        if let Some(rect) = request.source_rect {
            info!(
                "analyzing {}x{} source region at ({}, {}) with {}",
                rect.width, rect.height, rect.x, rect.y, request.model_id
            );
        }

        let result = {
            let mut forward = |text: &str| sink.on_partial(text);
            self.client
                .answer_question(
                    &request.image_base64,
                    &request.model_id,
                    Some(&mut forward),
                    cancel,
                )
                .await
        };

        match &result {
            Ok(text) => {
                info!("analysis complete ({} chars)", text.len());
                sink.on_done(text);
            }
            Err(e) => sink.on_error(e),
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct RecordingSink {
        partials: Vec<String>,
        done: Option<String>,
        errors: Vec<String>,
    }

    impl AnswerSink for RecordingSink {
        fn on_partial(&mut self, text: &str) {
            self.partials.push(text.to_string());
        }
        fn on_done(&mut self, final_text: &str) {
            self.done = Some(final_text.to_string());
        }
        fn on_error(&mut self, error: &AppError) {
            self.errors.push(error.to_string());
        }
    }

    fn request() -> AnalysisRequest {
        AnalysisRequest {
            image_base64: "QUJD".to_string(),
            model_id: "gpt-4o".to_string(),
            source_rect: None,
        }
    }

    #[tokio::test]
    async fn missing_api_key_fails_before_any_network_call() {
        let config = Config::builder().with_api_key("").build().unwrap();
        let mut pipeline = CaptureAnswerPipeline::new(config);
        let mut sink = RecordingSink::default();

        let result = pipeline
            .run(request(), &mut sink, &CancelToken::new())
            .await;

        assert!(matches!(result, Err(AppError::Config(_))));
        assert!(sink.partials.is_empty());
        assert!(sink.done.is_none());
        assert_eq!(sink.errors.len(), 1);
    }

    #[tokio::test]
    async fn retry_without_prior_request_is_rejected() {
        let config = Config::builder().with_api_key("sk-test").build().unwrap();
        let mut pipeline = CaptureAnswerPipeline::new(config);
        let mut sink = RecordingSink::default();

        assert!(!pipeline.has_last_request());
        let result = pipeline.retry(&mut sink, &CancelToken::new()).await;
        assert!(matches!(result, Err(AppError::Unknown(_))));
    }

    #[tokio::test]
    async fn settings_change_keeps_the_recorded_request() {
        let config = Config::builder().with_api_key("sk-old").build().unwrap();
        let mut pipeline = CaptureAnswerPipeline::new(config);
        let mut sink = RecordingSink::default();
        let token = CancelToken::new();
        token.cancel();
        let _ = pipeline.run(request(), &mut sink, &token).await;

        let updated = Config::builder().with_api_key("sk-new").build().unwrap();
        pipeline.set_config(updated);
        assert!(pipeline.has_last_request());
        assert_eq!(pipeline.config().api_key, "sk-new");
    }

    #[tokio::test]
    async fn cancelled_token_stops_the_request_before_dispatch() {
        let config = Config::builder().with_api_key("sk-test").build().unwrap();
        let mut pipeline = CaptureAnswerPipeline::new(config);
        let mut sink = RecordingSink::default();
        let token = CancelToken::new();
        token.cancel();

        let result = pipeline.run(request(), &mut sink, &token).await;

        assert!(matches!(result, Err(AppError::Cancelled)));
        assert_eq!(sink.errors.len(), 1);
        // The failed request is still recorded, so a retry can re-issue it.
        assert!(pipeline.has_last_request());
    }
}

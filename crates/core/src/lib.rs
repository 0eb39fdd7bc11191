//! SnapSolve Core Library
//!
//! This library provides the core functionality for the snapsolve screenshot
//! question solver: screen capture, region selection geometry, and streaming
//! answers from an OpenAI-compatible inference endpoint.
//!
//! # Overview
//!
//! SnapSolve lets users capture a screenshot, select the region holding a
//! question, and stream back a worked answer. The library handles:
//!
//! - **Screen Capture**: Multi-monitor support via the [`capture`] module
//! - **Region Selection**: Crop-rectangle geometry via [`geometry`]
//! - **Inference**: Streaming chat completions via [`openai`]
//! - **Orchestration**: Capture-to-answer flow via [`pipeline`]
//! - **User Interface**: Interactive selection overlay via [`ui`]
//!
//! # Quick Start
//!
//! The simplest way to use the library is through the [`SnapSolve`] facade:
//!
//! ```ignore
//! use snapsolve_core::SnapSolve;
//!
//! // Initialize with environment configuration
//! let app = SnapSolve::new()?;
//!
//! // List available monitors
//! for monitor in app.list_monitors()? {
//!     println!("{}", monitor);
//! }
//!
//! // Launch interactive mode on primary monitor
//! app.run_interactive(0)?;
//! ```
//!
//! # Module Structure
//!
//! - [`cancel`]: Cooperative cancellation of in-flight requests
//! - [`capture`]: Screen capture functionality
//! - [`config`]: Configuration loading and management
//! - [`error`]: Error types and result aliases
//! - [`geometry`]: Crop-region selection state machine
//! - [`image_processing`]: Image encoding for the API boundary
//! - [`models`]: Model capability catalog
//! - [`openai`]: Streaming inference client
//! - [`pipeline`]: Capture-to-answer orchestration
//! - [`ui`]: User interface components

pub mod cancel;
pub mod capture;
pub mod config;
pub mod error;
pub mod geometry;
pub mod image_processing;
pub mod models;
pub mod openai;
pub mod pipeline;
pub mod ui;

// Re-export primary types for convenience
pub use cancel::CancelToken;
pub use capture::{CaptureCapability, ScreenCapturer};
pub use config::Config;
pub use error::{AppError, Result};
pub use geometry::{CropRegion, ImageDimensions, RegionSelector, SourceRect};
pub use openai::OpenAiClient;
pub use pipeline::{AnalysisRequest, AnswerSink, CaptureAnswerPipeline};

use image::DynamicImage;

/// Main entry point for the snapsolve application.
///
/// This struct provides a facade over the various subsystems,
/// handling initialization and orchestration. It's the recommended
/// way to use the library for most use cases.
///
/// # Example
///
/// ```ignore
/// use snapsolve_core::SnapSolve;
///
/// let app = SnapSolve::new()?;
/// app.run_interactive(0)?;
/// ```
pub struct SnapSolve {
    config: Config,
    capture: CaptureCapability,
}

impl SnapSolve {
    /// Creates a new SnapSolve instance with default configuration.
    ///
    /// Loads configuration from environment variables (including `.env`
    /// files) and probes the display environment once; an unusable display
    /// surfaces later, when capture is actually requested.
    ///
    /// # Errors
    ///
    /// Returns an error if required environment variables are missing.
    pub fn new() -> Result<Self> {
        let config = Config::load()?;
        Ok(Self {
            config,
            capture: CaptureCapability::detect(),
        })
    }

    /// Creates an instance with custom configuration.
    ///
    /// Use this when you need to override environment-based configuration,
    /// such as specifying a different model or API key.
    ///
    /// # Arguments
    /// * `config` - Pre-built configuration
    pub fn with_config(config: Config) -> Self {
        Self {
            config,
            capture: CaptureCapability::detect(),
        }
    }

    /// Lists available monitors with their dimensions.
    ///
    /// Returns a vector of human-readable monitor descriptions,
    /// useful for displaying to users or for debugging.
    ///
    /// # Errors
    ///
    /// Returns an error if screen capture is unavailable.
    pub fn list_monitors(&self) -> Result<Vec<String>> {
        Ok(self.capture.get()?.list_screens())
    }

    /// Returns the number of available monitors, zero if capture is
    /// unavailable.
    pub fn monitor_count(&self) -> usize {
        match &self.capture {
            CaptureCapability::Available(capturer) => capturer.screen_count(),
            CaptureCapability::Unavailable(_) => 0,
        }
    }

    /// Captures a specific monitor and launches the interactive UI.
    ///
    /// This is the main entry point for the visual selection workflow.
    /// It captures the specified monitor, displays a fullscreen overlay,
    /// and lets the user select a region and stream back an answer.
    ///
    /// # Arguments
    /// * `monitor_index` - Zero-based index of the monitor to capture
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Screen capture is unavailable or the monitor index is out of bounds
    /// - Screen capture fails
    /// - UI initialization fails
    pub fn run_interactive(&self, monitor_index: usize) -> Result<()> {
        let screenshot = self.capture.get()?.capture_screen(monitor_index)?;
        ui::run_selection_ui(screenshot, self.config.clone())?;
        Ok(())
    }

    /// Launches the interactive UI with a pre-captured image.
    ///
    /// This is useful when the image has already been captured elsewhere
    /// or loaded from disk.
    pub fn run_interactive_with_image(&self, image: DynamicImage) -> Result<()> {
        ui::run_selection_ui(image, self.config.clone())?;
        Ok(())
    }

    /// Captures a screenshot from a specific monitor without UI.
    ///
    /// Useful for headless operation or when you want to process
    /// the image programmatically.
    ///
    /// # Arguments
    /// * `monitor_index` - Zero-based index of the monitor to capture
    pub fn capture(&self, monitor_index: usize) -> Result<DynamicImage> {
        self.capture.get()?.capture_screen(monitor_index)
    }

    /// Returns a reference to the current configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Returns a mutable reference to the configuration.
    ///
    /// Allows modifying settings like the model name after initialization.
    pub fn config_mut(&mut self) -> &mut Config {
        &mut self.config
    }
}

/// Initializes the library by loading environment variables.
///
/// Call this once at application startup before using any other functions.
/// This loads `.env` files if present and sets up the environment.
///
/// # Example
///
/// ```ignore
/// snapsolve_core::init();
/// let config = snapsolve_core::Config::load()?;
/// ```
pub fn init() {
    let _ = dotenvy::dotenv();
}

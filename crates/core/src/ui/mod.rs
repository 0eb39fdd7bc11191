//! User interface components for snapsolve.
//!
//! This module provides the fullscreen overlay for crop-region selection
//! and the streaming answer popup.
//!
//! # Architecture
//!
//! The UI is split into focused submodules:
//! - [`state`]: State machine types and event definitions
//! - [`settings`]: User preferences and persistence
//! - [`rendering`]: Drawing utilities for the mask, border, handles, and grid
//! - [`overlay`]: Main application logic
//!
//! The geometry itself lives outside the UI in [`crate::geometry`]; the
//! overlay feeds pointer events into a [`RegionSelector`] and repaints from
//! the regions it returns.
//!
//! [`RegionSelector`]: crate::geometry::RegionSelector
//!
//! # Usage
//!
//! ```ignore
//! use snapsolve_core::ui;
//! use snapsolve_core::Config;
//!
//! let config = Config::load()?;
//! let screenshot = capture_screen()?;
//!
//! // Launch the interactive selection UI
//! ui::run_selection_ui(screenshot, config)?;
//! ```

mod overlay;
mod rendering;
mod settings;
mod state;

// Public API exports
pub use overlay::SelectionOverlay;
pub use settings::Settings;
pub use state::UiState;

use crate::config::Config;
use crate::error::Result;
use image::DynamicImage;

/// Launches the selection UI and blocks until the user closes it.
///
/// Displays a fullscreen overlay with the captured screenshot, allowing the
/// user to adjust the crop region, submit it for analysis, and read the
/// streamed answer in place.
///
/// # Arguments
/// * `screenshot` - The captured screen as a [`DynamicImage`]
/// * `config` - Application configuration with API settings
///
/// # Errors
///
/// Returns an error if the UI fails to launch. In-overlay failures (API
/// errors, bad settings) are shown to the user inside the overlay instead.
pub fn run_selection_ui(screenshot: DynamicImage, config: Config) -> Result<()> {
    overlay::run(screenshot, config)
}

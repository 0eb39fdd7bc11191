//! Screen capture collaborator.
//!
//! Capture is an external capability with a narrow interface: enumerate
//! monitors, capture one as an RGBA frame. Availability is resolved once at
//! startup into a [`CaptureCapability`]; callers never re-probe per call.

use crate::error::{AppError, Result};
use image::DynamicImage;
use screenshots::Screen;

/// Capture availability, resolved once when the application starts.
pub enum CaptureCapability {
    Available(ScreenCapturer),
    /// No display server, or screen enumeration failed. Carries the reason.
    Unavailable(String),
}

impl CaptureCapability {
    /// Probes the display environment. Never fails: an unusable environment
    /// yields [`CaptureCapability::Unavailable`].
    pub fn detect() -> Self {
        match ScreenCapturer::new() {
            Ok(capturer) => Self::Available(capturer),
            Err(e) => Self::Unavailable(e.to_string()),
        }
    }

    /// The capturer, or a capture error naming why none exists.
    pub fn get(&self) -> Result<&ScreenCapturer> {
        match self {
            Self::Available(capturer) => Ok(capturer),
            Self::Unavailable(reason) => Err(AppError::capture(reason.clone())),
        }
    }
}

/// Multi-monitor screenshot source over the `screenshots` crate.
pub struct ScreenCapturer {
    screens: Vec<Screen>,
}

impl ScreenCapturer {
    /// Detects available screens.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::ScreenCapture`] if enumeration fails or no
    /// screens are present.
    pub fn new() -> Result<Self> {
        let screens = Screen::all()
            .map_err(|e| AppError::capture(format!("Failed to enumerate screens: {}", e)))?;

        if screens.is_empty() {
            return Err(AppError::capture("No screens detected"));
        }

        Ok(Self { screens })
    }

    /// Human-readable descriptions of the available monitors.
    pub fn list_screens(&self) -> Vec<String> {
        self.screens
            .iter()
            .enumerate()
            .map(|(i, s)| {
                format!(
                    "Monitor {}: {}x{} (scale: {})",
                    i, s.display_info.width, s.display_info.height, s.display_info.scale_factor
                )
            })
            .collect()
    }

    pub fn screen_count(&self) -> usize {
        self.screens.len()
    }

    /// Captures a monitor by zero-based index.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::ScreenNotFound`] for an out-of-bounds index, or
    /// [`AppError::ScreenCapture`] if the capture itself fails.
    pub fn capture_screen(&self, index: usize) -> Result<DynamicImage> {
        let screen = self
            .screens
            .get(index)
            .ok_or(AppError::ScreenNotFound(index))?;

        let captured = screen
            .capture()
            .map_err(|e| AppError::capture(format!("Failed to capture screen: {}", e)))?;

        let width = captured.width();
        let height = captured.height();
        let rgba_data = captured.into_raw();

        let buffer = image::ImageBuffer::from_raw(width, height, rgba_data)
            .ok_or_else(|| AppError::capture("Failed to create image buffer"))?;

        Ok(DynamicImage::ImageRgba8(buffer))
    }
}

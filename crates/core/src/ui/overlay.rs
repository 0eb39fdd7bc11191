//! Fullscreen selection overlay.
//!
//! This module contains the `SelectionOverlay` struct which implements the
//! `eframe::App` trait. It shows the captured screenshot aspect-fit, lets
//! the user move and resize the crop rectangle, and streams the answer into
//! a popup next to the selection.

use super::rendering::{
    calculate_popup_position, draw_corner_handles, draw_selection_border, draw_selection_overlay,
    draw_thirds_grid,
};
use super::settings::Settings;
use super::state::{StreamEvent, UiState};
use crate::cancel::CancelToken;
use crate::config::Config;
use crate::error::{AppError, Result};
use crate::geometry::{ImageDimensions, RegionSelector, SourceRect};
use crate::image_processing::ImageProcessor;
use crate::models;
use crate::pipeline::{AnalysisRequest, AnswerSink, CaptureAnswerPipeline};
use eframe::egui;
use egui_commonmark::{CommonMarkCache, CommonMarkViewer};
use image::DynamicImage;
use log::warn;
use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::thread;

/// Pointer distance within which a corner handle wins the hit test.
const HANDLE_RADIUS: f32 = 10.0;

/// Darkness of the mask drawn around the selection.
const MASK_ALPHA: u8 = 150;

/// Work handed to the background request thread.
enum Job {
    Run {
        config: Config,
        model_id: String,
        source_rect: SourceRect,
    },
    Retry {
        config: Config,
    },
}

/// Forwards pipeline progress to the UI thread and wakes it up.
struct ChannelSink {
    tx: Sender<StreamEvent>,
    ctx: egui::Context,
}

impl AnswerSink for ChannelSink {
    fn on_partial(&mut self, text: &str) {
        let _ = self.tx.send(StreamEvent::Partial(text.to_string()));
        self.ctx.request_repaint();
    }

    fn on_done(&mut self, final_text: &str) {
        let _ = self.tx.send(StreamEvent::Done(final_text.to_string()));
        self.ctx.request_repaint();
    }

    fn on_error(&mut self, error: &AppError) {
        // A cancelled request is one the user already navigated away from;
        // reporting it would clobber the state of its replacement.
        if matches!(error, AppError::Cancelled) {
            return;
        }
        let _ = self.tx.send(StreamEvent::Error(error.to_string()));
        self.ctx.request_repaint();
    }
}

/// The fullscreen selection overlay.
///
/// Displays the captured screenshot, a movable/resizable crop rectangle,
/// and a popup that first offers submission and then shows the streaming
/// answer.
pub struct SelectionOverlay {
    // Image state
    image_texture: Option<egui::TextureHandle>,
    /// Pre-converted image data for fast texture upload
    color_image: Option<egui::ColorImage>,
    screenshot: DynamicImage,

    // Selection state: created on the first frame, once the viewport size
    // is known and the aspect-fit display size can be computed.
    selector: Option<RegionSelector>,

    // Request state
    pipeline: Arc<Mutex<CaptureAnswerPipeline>>,
    cancel: CancelToken,
    in_flight: bool,
    has_submitted: bool,
    state: UiState,
    rx: Receiver<StreamEvent>,
    tx: Sender<StreamEvent>,
    ctx: egui::Context,

    // Markdown rendering
    markdown_cache: CommonMarkCache,

    // Settings
    settings: Settings,
    show_settings: bool,
}

impl SelectionOverlay {
    /// Creates a new overlay instance.
    ///
    /// # Arguments
    /// * `screenshot` - The captured screen image
    /// * `config` - Application configuration
    /// * `ctx` - The egui context, used to wake the UI from background work
    pub fn new(screenshot: DynamicImage, config: Config, ctx: egui::Context) -> Self {
        let (tx, rx) = channel();

        // Load settings, falling back to environment-derived values
        let mut settings = Settings::load(&config.model_name);
        if settings.api_key.is_empty() {
            settings.api_key = config.api_key.clone();
        }
        if settings.api_base_url.is_empty() {
            settings.api_base_url = config.api_base_url.clone();
        }

        // Pre-convert screenshot to ColorImage for fast texture upload
        // This is the expensive operation - do it before the UI loop starts
        let image_buffer = screenshot.to_rgba8();
        let size = [screenshot.width() as usize, screenshot.height() as usize];
        let pixels = image_buffer.as_flat_samples();
        let color_image = egui::ColorImage::from_rgba_unmultiplied(size, pixels.as_slice());

        let pipeline = Arc::new(Mutex::new(CaptureAnswerPipeline::new(config)));

        Self {
            image_texture: None,
            color_image: Some(color_image),
            screenshot,
            selector: None,
            pipeline,
            cancel: CancelToken::new(),
            in_flight: false,
            has_submitted: false,
            state: UiState::Selecting,
            rx,
            tx,
            ctx,
            markdown_cache: CommonMarkCache::default(),
            settings,
            show_settings: false,
        }
    }

    /// Submits the current selection for analysis.
    ///
    /// The heavy work (JPEG encoding, the network request) happens on a
    /// background thread; results stream back through the channel.
    fn submit_request(&mut self) {
        // Save settings before making the request
        if let Err(e) = self.settings.save() {
            warn!("Failed to save settings: {}", e);
        }

        let config = match self.settings.to_config() {
            Ok(config) => config,
            Err(e) => {
                self.state = UiState::Error(e.to_string());
                return;
            }
        };

        let Some(selector) = self.selector.as_ref() else {
            return;
        };
        let source_rect = selector.to_source_rect();

        self.state = UiState::Response {
            text: String::new(),
        };
        self.in_flight = true;
        self.has_submitted = true;
        self.spawn_job(Job::Run {
            config,
            model_id: self.settings.model.clone(),
            source_rect,
        });
    }

    /// Re-runs the previous request with the already-selected region.
    fn retry_request(&mut self) {
        let config = match self.settings.to_config() {
            Ok(config) => config,
            Err(e) => {
                self.state = UiState::Error(e.to_string());
                return;
            }
        };

        self.state = UiState::Response {
            text: String::new(),
        };
        self.in_flight = true;
        self.spawn_job(Job::Retry { config });
    }

    /// Spawns a background thread that drives the pipeline for `job`.
    ///
    /// Any in-flight request is cancelled first; it stops at its next
    /// suspension point and releases the pipeline to the new job.
    fn spawn_job(&mut self, job: Job) {
        self.cancel.cancel();
        self.cancel = CancelToken::new();

        let cancel = self.cancel.clone();
        let tx = self.tx.clone();
        let ctx = self.ctx.clone();
        let pipeline = Arc::clone(&self.pipeline);
        let screenshot = self.screenshot.clone();

        thread::spawn(move || {
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build();

            let rt = match runtime {
                Ok(rt) => rt,
                Err(e) => {
                    let _ = tx.send(StreamEvent::Error(format!(
                        "Failed to create async runtime: {}",
                        e
                    )));
                    ctx.request_repaint();
                    return;
                }
            };

            rt.block_on(async {
                let mut sink = ChannelSink {
                    tx: tx.clone(),
                    ctx: ctx.clone(),
                };

                let mut pipeline = match pipeline.lock() {
                    Ok(guard) => guard,
                    Err(_) => {
                        let _ = tx.send(StreamEvent::Error(
                            "Request state is no longer usable".to_string(),
                        ));
                        ctx.request_repaint();
                        return;
                    }
                };

                // Superseded while waiting for the previous request to stop.
                if cancel.is_cancelled() {
                    return;
                }

                match job {
                    Job::Run {
                        config,
                        model_id,
                        source_rect,
                    } => {
                        pipeline.set_config(config);
                        let image_base64 = match ImageProcessor::encode_to_base64_jpeg(&screenshot)
                        {
                            Ok(data) => data,
                            Err(e) => {
                                sink.on_error(&e);
                                return;
                            }
                        };
                        let request = AnalysisRequest {
                            image_base64,
                            model_id,
                            source_rect: Some(source_rect),
                        };
                        // Terminal states reach the UI through the sink.
                        let _ = pipeline.run(request, &mut sink, &cancel).await;
                    }
                    Job::Retry { config } => {
                        pipeline.set_config(config);
                        let _ = pipeline.retry(&mut sink, &cancel).await;
                    }
                }
            });
        });
    }

    /// Processes stream events from the background thread.
    fn process_stream_events(&mut self, ctx: &egui::Context) {
        while let Ok(event) = self.rx.try_recv() {
            match event {
                StreamEvent::Partial(text) => {
                    self.state = UiState::Response { text };
                    ctx.request_repaint();
                }
                StreamEvent::Done(text) => {
                    self.in_flight = false;
                    self.state = UiState::Response { text };
                }
                StreamEvent::Error(err) => {
                    self.in_flight = false;
                    self.state = UiState::Error(err);
                }
            }
        }
    }

    /// Renders the pre-submission UI (submit button and settings).
    fn render_select_ui(&mut self, ui: &mut egui::Ui) {
        ui.horizontal(|ui| {
            ui.label("Adjust the region, then submit");
            if ui.button("Answer (Enter)").clicked() {
                self.submit_request();
            }
            if ui.button("⚙").clicked() {
                self.show_settings = !self.show_settings;
            }
        });

        if self.show_settings {
            self.render_settings_ui(ui);
        }
    }

    /// Renders the settings panel.
    fn render_settings_ui(&mut self, ui: &mut egui::Ui) {
        ui.separator();
        ui.label("Settings");

        // Model selector
        let selected_name = models::find(&self.settings.model)
            .map(|m| m.name)
            .unwrap_or(self.settings.model.as_str());
        egui::ComboBox::from_label("Model")
            .selected_text(selected_name)
            .show_ui(ui, |ui| {
                for model in models::AVAILABLE_MODELS {
                    ui.selectable_value(&mut self.settings.model, model.id.to_string(), model.name)
                        .on_hover_text(model.description);
                }
            });

        // API Key
        ui.label("API Key:");
        ui.add(
            egui::TextEdit::singleline(&mut self.settings.api_key)
                .password(true)
                .hint_text("Paste API key"),
        );

        // Endpoint base URL
        ui.label("Base URL:");
        ui.add(
            egui::TextEdit::singleline(&mut self.settings.api_base_url)
                .hint_text("https://api.openai.com/v1"),
        );
    }

    /// Renders the streaming/complete answer UI.
    fn render_response_ui(&mut self, ui: &mut egui::Ui, ctx: &egui::Context, text: &str) {
        ui.horizontal(|ui| {
            ui.heading("Answer");
            if self.in_flight {
                ui.spinner();
            }
        });

        egui::ScrollArea::vertical().max_height(300.0).show(ui, |ui| {
            CommonMarkViewer::new().show(ui, &mut self.markdown_cache, text);
        });

        ui.separator();

        ui.horizontal(|ui| {
            if ui.button("Copy").clicked() {
                if let Ok(mut clipboard) = arboard::Clipboard::new() {
                    let _ = clipboard.set_text(text);
                }
            }
            if !self.in_flight && ui.button("Retry").clicked() {
                self.retry_request();
            }
            if ui.button("Back").clicked() {
                self.cancel.cancel();
                self.state = UiState::Selecting;
            }
            if ui.button("Close").clicked() {
                self.cancel.cancel();
                ctx.send_viewport_cmd(egui::ViewportCommand::Close);
            }
        });
    }

    /// Renders the error state UI.
    fn render_error_ui(&mut self, ui: &mut egui::Ui, error: &str) {
        ui.label(egui::RichText::new(format!("Error: {}", error)).color(egui::Color32::RED));
        ui.horizontal(|ui| {
            if self.has_submitted && ui.button("Retry").clicked() {
                self.retry_request();
            }
            if ui.button("Back").clicked() {
                self.state = UiState::Selecting;
            }
        });
    }
}

impl eframe::App for SelectionOverlay {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        // Enforce dark mode
        ctx.set_visuals(egui::Visuals::dark());

        // Process any pending stream events
        self.process_stream_events(ctx);

        // Upload texture on first frame using pre-converted data
        if self.image_texture.is_none() {
            if let Some(color_image) = self.color_image.take() {
                self.image_texture = Some(ctx.load_texture(
                    "screenshot",
                    color_image,
                    egui::TextureOptions::LINEAR,
                ));
            }
        }

        // The selector needs the viewport size for aspect-fit, so it is
        // created on the first frame rather than in `new`.
        if self.selector.is_none() {
            let screen = ctx.screen_rect();
            if screen.width() > 1.0 && screen.height() > 1.0 {
                let dims = ImageDimensions::aspect_fit(
                    self.screenshot.width() as f32,
                    self.screenshot.height() as f32,
                    screen.size(),
                );
                self.selector = Some(RegionSelector::new(dims));
            }
        }

        // Fullscreen panel with no margins
        let panel_frame = egui::Frame::default()
            .inner_margin(egui::Margin::same(0))
            .outer_margin(egui::Margin::same(0));

        egui::CentralPanel::default()
            .frame(panel_frame)
            .show(ctx, |ui| {
                let screen_rect = ui.max_rect();

                let Some(display_size) = self.selector.as_ref().map(|s| s.dimensions().display_size())
                else {
                    return;
                };
                let image_rect = egui::Rect::from_center_size(screen_rect.center(), display_size);
                let origin = image_rect.min;

                // Draw the aspect-fit screenshot
                if let Some(texture) = &self.image_texture {
                    ui.painter().image(
                        texture.id(),
                        image_rect,
                        egui::Rect::from_min_max(egui::pos2(0.0, 0.0), egui::pos2(1.0, 1.0)),
                        egui::Color32::WHITE,
                    );
                }

                // Handle region drags (only while selecting)
                if matches!(self.state, UiState::Selecting) {
                    let response =
                        ui.interact(image_rect, ui.id().with("crop_drag"), egui::Sense::drag());
                    if let Some(selector) = self.selector.as_mut() {
                        if response.drag_started() {
                            if let Some(p) = response.interact_pointer_pos() {
                                let local = p - origin.to_vec2();
                                if let Some(handle) = selector.hit_test(local, HANDLE_RADIUS) {
                                    selector.begin_drag(handle, local);
                                }
                            }
                        } else if response.dragged() {
                            if let Some(p) = response.interact_pointer_pos() {
                                selector.update_drag(p - origin.to_vec2());
                            }
                        } else if response.drag_stopped() {
                            selector.end_drag();
                        }
                    }
                }

                // Handle escape to close
                if ctx.input(|i| i.key_pressed(egui::Key::Escape)) {
                    self.cancel.cancel();
                    ctx.send_viewport_cmd(egui::ViewportCommand::Close);
                }

                // Enter submits the current region
                if matches!(self.state, UiState::Selecting)
                    && !self.show_settings
                    && ctx.input(|i| i.key_pressed(egui::Key::Enter))
                {
                    self.submit_request();
                }

                let Some(region) = self.selector.as_ref().map(|s| s.region()) else {
                    return;
                };
                let selection_rect = region.to_rect().translate(origin.to_vec2());

                // Draw dark overlay with cutout
                draw_selection_overlay(ui.painter(), screen_rect, selection_rect, MASK_ALPHA);

                // Draw selection border, handles, and guide lines
                draw_selection_border(ui.painter(), selection_rect, 2.0, egui::Color32::WHITE);
                draw_thirds_grid(
                    ui.painter(),
                    selection_rect,
                    egui::Color32::from_white_alpha(40),
                );
                draw_corner_handles(
                    ui.painter(),
                    &region,
                    origin,
                    HANDLE_RADIUS * 0.6,
                    egui::Color32::WHITE,
                );

                // Interaction window next to the selection
                // responsive width: 30% of screen width, clamped between 400 and 800
                let window_width = (screen_rect.width() * 0.3).clamp(400.0, 800.0);
                let (window_x, window_y, pivot) =
                    calculate_popup_position(selection_rect, screen_rect, window_width, 10.0, 400.0);

                egui::Area::new(egui::Id::new("interaction_area"))
                    .fixed_pos(egui::pos2(window_x, window_y))
                    .pivot(pivot)
                    .show(ctx, |ui| {
                        egui::Frame::popup(ui.style())
                            .fill(egui::Color32::from_rgb(30, 30, 30))
                            .stroke(egui::Stroke::new(1.0, egui::Color32::GRAY))
                            .inner_margin(10.0)
                            .show(ui, |ui| {
                                ui.set_width(window_width);

                                // Clone state data for rendering to avoid borrow issues
                                let state_clone = self.state.clone();
                                match state_clone {
                                    UiState::Selecting => {
                                        self.render_select_ui(ui);
                                    }
                                    UiState::Response { text } => {
                                        self.render_response_ui(ui, ctx, &text);
                                    }
                                    UiState::Error(err) => {
                                        self.render_error_ui(ui, &err);
                                    }
                                }
                            });
                    });
            });
    }
}

/// Launches the selection overlay and returns when the user closes it.
///
/// # Arguments
/// * `screenshot` - The captured screen image
/// * `config` - Application configuration
pub fn run(screenshot: DynamicImage, config: Config) -> Result<()> {
    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_fullscreen(true)
            .with_decorations(false)
            .with_always_on_top(),
        ..Default::default()
    };

    eframe::run_native(
        "snapsolve",
        options,
        Box::new(move |cc| {
            Ok(Box::new(SelectionOverlay::new(
                screenshot,
                config,
                cc.egui_ctx.clone(),
            )) as Box<dyn eframe::App>)
        }),
    )
    .map_err(|e| AppError::ui(format!("Failed to run UI: {}", e)))
}

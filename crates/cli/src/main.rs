use anyhow::{Context, Result};
use arboard::Clipboard;
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use snapsolve_core::image_processing::ImageProcessor;
use snapsolve_core::{
    init, AnalysisRequest, AnswerSink, AppError, CancelToken, CaptureAnswerPipeline, Config,
    OpenAiClient, SnapSolve,
};
use std::time::Duration;
use termimad::crossterm::style::Color;
use termimad::MadSkin;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Override the model defined in .env or saved settings
    #[arg(short, long)]
    model: Option<String>,

    /// Copy the final answer to the clipboard (headless mode)
    #[arg(short, long, default_value_t = false)]
    copy: bool,

    /// Select which monitor to capture
    #[arg(long, default_value_t = 0)]
    monitor: usize,

    /// List available monitors and exit
    #[arg(long)]
    list_monitors: bool,

    /// Probe the configured endpoint and exit
    #[arg(long)]
    test_connection: bool,

    /// Capture the whole monitor and answer in the terminal, no overlay
    #[arg(long)]
    headless: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Setup
    init();
    env_logger::init();
    let args = Args::parse();

    // Only the paths that talk to the API from here need credentials up
    // front; the overlay can take them from saved settings instead.
    let needs_api_key = args.headless || args.test_connection;
    let mut config = match Config::load() {
        Ok(config) => config,
        Err(AppError::MissingEnvVar(_)) if !needs_api_key => Config::builder().build()?,
        Err(e) => Err(e).context("Failed to load configuration")?,
    };
    if let Some(m) = args.model {
        config.model_name = m;
    }

    let app = SnapSolve::with_config(config);

    // Handle --list-monitors
    if args.list_monitors {
        println!("Available monitors:");
        for info in app.list_monitors()? {
            println!("{}", info);
        }
        return Ok(());
    }

    // Handle --test-connection
    if args.test_connection {
        let client = OpenAiClient::new(app.config());
        if client.test_connection().await {
            println!("{} is reachable", app.config().api_base_url);
            return Ok(());
        }
        anyhow::bail!("Could not reach {}", app.config().api_base_url);
    }

    if args.headless {
        return run_headless(&app, args.monitor, args.copy).await;
    }

    // Default: interactive overlay
    app.run_interactive(args.monitor)
        .context("Failed to launch the selection overlay. Try --list-monitors to check indices")?;
    Ok(())
}

/// Reports streaming progress on the spinner while the answer arrives.
struct TerminalSink {
    spinner: ProgressBar,
}

impl AnswerSink for TerminalSink {
    fn on_partial(&mut self, text: &str) {
        self.spinner
            .set_message(format!("Receiving answer... {} chars", text.len()));
    }

    fn on_done(&mut self, _final_text: &str) {
        self.spinner.finish_and_clear();
    }

    fn on_error(&mut self, _error: &AppError) {
        self.spinner.finish_and_clear();
    }
}

/// Captures the whole monitor and streams the answer into the terminal.
async fn run_headless(app: &SnapSolve, monitor: usize, copy: bool) -> Result<()> {
    let screenshot = app
        .capture(monitor)
        .context("Failed to capture screen. Try using --list-monitors to check indices")?;
    let image_base64 = ImageProcessor::encode_to_base64_jpeg(&screenshot)?;

    println!(); // Spacer
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::default_spinner()
            .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏ ")
            .template("{spinner:.green} {msg}")?,
    );
    spinner.set_message(format!("Analyzing with {}...", app.config().model_name));
    spinner.enable_steady_tick(Duration::from_millis(100));

    let mut pipeline = CaptureAnswerPipeline::new(app.config().clone());
    let mut sink = TerminalSink {
        spinner: spinner.clone(),
    };
    let request = AnalysisRequest {
        image_base64,
        model_id: app.config().model_name.clone(),
        source_rect: None,
    };

    let answer = pipeline
        .run(request, &mut sink, &CancelToken::new())
        .await
        .context("Analysis failed")?;
    spinner.finish_and_clear();

    // Render Markdown
    print_markdown(&answer);

    // Copy to clipboard if requested
    if copy {
        match Clipboard::new() {
            Ok(mut clipboard) => {
                if let Err(e) = clipboard.set_text(answer.clone()) {
                    eprintln!("Warning: Failed to copy to clipboard: {}", e);
                } else {
                    println!("(Copied to clipboard)");
                }
            }
            Err(e) => eprintln!("Warning: Could not access clipboard: {}", e),
        }
    }

    Ok(())
}

/// Helper to print markdown
fn print_markdown(text: &str) {
    let mut skin = MadSkin::default();
    skin.bold.set_fg(Color::Yellow);
    skin.italic.set_fg(Color::Magenta);
    skin.code_block.set_bg(Color::Rgb { r: 40, g: 40, b: 40 });

    skin.print_text(text);
}

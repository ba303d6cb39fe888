use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tracing::info;
use tracing_error::ErrorLayer;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

mod controller;
mod domain;
mod inputter;
mod model;
mod source;
mod ui;
mod view;

use controller::Controller;
use domain::{FtvConfig, FtvError};
use model::{Model, Status};
use source::Source;
use ui::TableUI;

/// A tui based filterable table viewer.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Path of the csv, parquet or arrow file to view
    file: String,

    /// Event poll interval in milliseconds
    #[arg(long, default_value_t = 100)]
    poll_interval: u64,

    /// Maximum rendered column width
    #[arg(long, default_value_t = 80)]
    max_column_width: usize,
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_tracing();

    match run(&args) {
        Err(e) => {
            ratatui::restore();
            eprintln!("Error: {:?}", e);
            ExitCode::FAILURE
        }
        Ok(_) => {
            ratatui::restore();
            ExitCode::SUCCESS
        }
    }
}

// Log to ftv.log when FTV_LOG is set, the terminal itself belongs to the UI.
fn init_tracing() {
    if std::env::var("FTV_LOG").is_err() {
        return;
    }
    let Ok(file) = std::fs::File::create("ftv.log") else {
        return;
    };
    tracing_subscriber::registry()
        .with(EnvFilter::from_env("FTV_LOG"))
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(Arc::new(file))
                .with_ansi(false),
        )
        .with(ErrorLayer::default())
        .init();
}

fn run(args: &Args) -> Result<(), FtvError> {
    let path =
        shellexpand::full(&args.file).map_err(|e| FtvError::LoadingFailed(e.to_string()))?;
    let source = Source::load(PathBuf::from(path.as_ref()))?;
    info!("Starting ftv with {}", source.name);

    let cfg = FtvConfig {
        event_poll_time: args.poll_interval,
        max_column_width: args.max_column_width,
    };

    let mut terminal = ratatui::init();
    let size = terminal.size()?;
    let mut model = Model::init(source, &cfg, size.width as usize, size.height as usize);
    let ui = TableUI::new();
    let controller = Controller::new(&cfg);

    while model.status != Status::QUITTING {
        // Render the current view
        terminal.draw(|f| ui.draw(&model, f))?;

        // Handle events and map them to a Message
        if let Some(message) = controller.handle_event(&model)? {
            model.update(message)?;
        }
    }

    Ok(())
}

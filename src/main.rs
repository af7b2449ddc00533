use std::fs::{self, OpenOptions};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Mutex;

use clap::{ArgAction, Parser};
use tokio::sync::mpsc;
use tracing::{error, info};
use tracing_error::ErrorLayer;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::prelude::*;

mod controller;
mod domain;
mod inputter;
mod model;
mod pager;
mod record;
mod source;
mod table;
mod ui;
mod view;

use controller::Controller;
use domain::{DEFAULT_BATCH_SIZE, DEFAULT_ENDPOINT, DEFAULT_TOTAL_RECORDS, RUVConfig, RUVError};
use model::{Model, Status};
use source::{Fetcher, HttpSource};
use ui::TableUI;

#[derive(Parser, Debug)]
#[command(
    name = "ruv",
    version,
    about = "Browse randomly generated users in the terminal",
    long_about = "ruv fetches batches of random users from random-data-api.com and shows them as a \
                  paginated table that can be filtered, sorted and inspected record by record.\n\n\
                  The next page is always fetched in the background while the current one is shown."
)]
struct Cli {
    #[arg(
        long,
        value_name = "URL",
        default_value = DEFAULT_ENDPOINT,
        help = "Endpoint returning a json array of users."
    )]
    endpoint: String,

    #[arg(
        long,
        value_name = "N",
        default_value_t = DEFAULT_BATCH_SIZE,
        help = "Records per page / request."
    )]
    batch_size: usize,

    #[arg(
        long,
        value_name = "N",
        default_value_t = DEFAULT_TOTAL_RECORDS,
        help = "Size of the virtual data set."
    )]
    total_records: usize,

    #[arg(long, value_name = "SECS", default_value_t = 10, help = "Http request timeout.")]
    timeout: u64,

    #[arg(long, value_name = "MS", default_value_t = 100, help = "Terminal event poll time.")]
    poll_ms: u64,

    #[arg(long, value_name = "PATH", help = "Write logs to this file, e.g. ~/ruv.log")]
    log_file: Option<String>,

    #[arg(short, long, action = ArgAction::Count, help = "Increase log verbosity (-v, -vv).")]
    verbose: u8,
}

impl Cli {
    fn config(&self) -> Result<RUVConfig, RUVError> {
        RUVConfig::default()
            .endpoint(self.endpoint.clone())
            .batch_size(self.batch_size)
            .total_records(self.total_records)
            .timeout_secs(self.timeout)
            .event_poll_time(self.poll_ms)
            .validate()
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    if let Err(e) = init_logging(cli.log_file.as_deref(), cli.verbose) {
        eprintln!("Error: {e}");
        return ExitCode::FAILURE;
    }

    let result = run(&cli);
    ratatui::restore();
    match result {
        Err(e) => {
            error!("Terminated with {e:?}");
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
        Ok(_) => ExitCode::SUCCESS,
    }
}

// The terminal belongs to the ui, so logs only ever go to a file.
fn init_logging(log_file: Option<&str>, verbose: u8) -> Result<(), RUVError> {
    let Some(log_file) = log_file else {
        return Ok(());
    };
    let path = PathBuf::from(
        shellexpand::full(log_file)
            .map_err(|e| RUVError::InvalidConfig(e.to_string()))?
            .into_owned(),
    );
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let file = OpenOptions::new().create(true).append(true).open(&path)?;

    let level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(Mutex::new(file))
                .with_ansi(false),
        )
        .with(ErrorLayer::default())
        .init();
    Ok(())
}

fn run(cli: &Cli) -> Result<(), RUVError> {
    let cfg = cli.config()?;
    info!("Starting ruv with {cfg:?}");

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()?;
    let (outcome_tx, outcome_rx) = mpsc::unbounded_channel();
    let fetcher = Fetcher::new(
        HttpSource::new(&cfg)?,
        runtime.handle().clone(),
        cfg.batch_size,
        outcome_tx,
    );

    let mut terminal = ratatui::init();
    let size = terminal.size()?;

    let mut model = Model::init(&cfg, size.width as usize, size.height as usize)?;
    let mut ui = TableUI::new(&cfg);
    let mut controller = Controller::new(&cfg, outcome_rx);

    while model.status != Status::QUITTING {
        for request in model.take_fetch_requests() {
            fetcher.dispatch(request);
        }

        // Render the current view
        terminal.draw(|f| ui.draw(&model, f))?;

        // Handle events and map to a Message
        if let Some(message) = controller.handle_event(&model)? {
            model.update(Some(message))?;
        };
    }

    info!("Quitting ruv on page {}", model.page_index() + 1);
    // Fetches still in flight are not awaited
    runtime.shutdown_background();
    Ok(())
}

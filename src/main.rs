use std::fs::OpenOptions;
use std::process::ExitCode;
use std::sync::Mutex;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use ratatui::DefaultTerminal;
use tracing::{error, info};
use tracing_error::ErrorLayer;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

mod controller;
mod domain;
mod export;
mod inputter;
mod model;
mod parser;
mod render;
mod source;
mod store;
mod summary;
mod ui;

use controller::Controller;
use domain::{DEFAULT_EXPORT_STEM, DEFAULT_SOURCE, LexiconConfig, LexiconError, Message};
use export::ExportScope;
use model::{Model, Status};
use parser::Row;
use source::{Refresher, fetch_and_parse, open_source};
use store::{Dataset, SortDirection, TableStore};
use ui::TableUI;

/// Browse, search and export the Ibaloi lexicon spreadsheet.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    /// CSV url or local file
    #[arg(default_value = DEFAULT_SOURCE)]
    source: String,

    /// Seconds between background reloads
    #[arg(long = "refresh-secs", default_value_t = 600)]
    refresh_secs: u64,

    /// Milliseconds to wait for a key press before redrawing
    #[arg(long = "poll-ms", default_value_t = 100)]
    poll_ms: u64,

    #[arg(long = "max-column-width", default_value_t = 40)]
    max_column_width: usize,

    /// File name prefix for exports, written as <stem>_export.csv
    #[arg(long = "export-stem", default_value = DEFAULT_EXPORT_STEM)]
    export_stem: String,

    #[command(flatten)]
    logging: LogArgs,
}

#[derive(Args, Debug, Clone)]
struct LogArgs {
    /// Log file, defaults to lexicon.log in the temp directory
    #[arg(long = "log-file", global = true)]
    log_file: Option<String>,

    /// Log filter used when RUST_LOG is not set
    #[arg(long = "log-level", global = true, default_value = "info")]
    log_level: String,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Write the (filtered, sorted) table as CSV without starting the viewer
    Export(ExportArgs),
    /// Print the summary of every column
    Summary {
        #[arg(default_value = DEFAULT_SOURCE)]
        source: String,
    },
}

#[derive(Args, Debug)]
struct ExportArgs {
    #[arg(default_value = DEFAULT_SOURCE)]
    source: String,

    /// Columns to export, in order. All columns when omitted
    #[arg(long, value_delimiter = ',')]
    columns: Vec<String>,

    /// Keep rows with a cell containing this text
    #[arg(long)]
    search: Option<String>,

    /// Keep rows whose column contains the text, as <column>=<text>
    #[arg(long = "column-search", conflicts_with = "search")]
    column_search: Option<String>,

    /// Sort as <column>:asc or <column>:desc
    #[arg(long)]
    sort: Option<String>,

    /// Export every row, ignoring the search
    #[arg(long)]
    all: bool,

    /// Output file, stdout when omitted
    #[arg(long, short)]
    output: Option<String>,
}

fn main() -> ExitCode {
    match run() {
        Err(e) => {
            error!("Exiting with error: {e}");
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
        Ok(_) => ExitCode::SUCCESS,
    }
}

fn run() -> Result<(), LexiconError> {
    let cli = Cli::parse();
    init_logging(&cli.logging)?;

    match cli.command {
        Some(Command::Export(args)) => run_export(args),
        Some(Command::Summary { source }) => run_summary(&source),
        None => {
            if cli.refresh_secs == 0 {
                return Err(LexiconError::Config("--refresh-secs must be at least 1".into()));
            }
            let cfg = LexiconConfig::default()
                .source(cli.source)
                .refresh_interval(Duration::from_secs(cli.refresh_secs))
                .event_poll_time(cli.poll_ms)
                .max_column_width(cli.max_column_width.max(1))
                .export_stem(cli.export_stem);
            run_tui(&cfg)
        }
    }
}

fn init_logging(args: &LogArgs) -> Result<(), LexiconError> {
    let path = match &args.log_file {
        Some(file) => export::expand_path(file)?,
        None => std::env::temp_dir().join("lexicon.log"),
    };
    let file = OpenOptions::new().create(true).append(true).open(&path)?;

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&args.log_level))
        .map_err(|e| LexiconError::Config(format!("log level: {e}")))?;

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(Mutex::new(file)).with_ansi(false))
        .with(ErrorLayer::default())
        .try_init()
        .map_err(|e| LexiconError::Config(e.to_string()))
}

fn run_tui(cfg: &LexiconConfig) -> Result<(), LexiconError> {
    let source = open_source(&cfg.source)?;
    info!("Starting viewer on {}", source.describe());
    let refresher = Refresher::spawn(source, cfg.refresh_interval);

    let mut model = Model::init(cfg);
    let mut ui = TableUI::new();
    let controller = Controller::new(cfg);

    let mut terminal = ratatui::init();
    let result = event_loop(&mut terminal, &mut model, &mut ui, &controller, &refresher);
    ratatui::restore();
    result
}

fn event_loop(
    terminal: &mut DefaultTerminal,
    model: &mut Model,
    ui: &mut TableUI,
    controller: &Controller,
    refresher: &Refresher,
) -> Result<(), LexiconError> {
    while model.status != Status::QUITTING {
        terminal.draw(|f| ui.draw(model, f))?;

        while let Some(outcome) = refresher.try_recv() {
            model.apply_fetch(outcome);
        }

        match controller.handle_event(model)? {
            Some(Message::Refresh) => {
                if refresher.request() {
                    model.set_status_message("Reloading ...");
                } else {
                    model.set_status_message("Reload already in progress");
                }
            }
            Some(message) => model.update(message),
            None => {}
        }
    }
    Ok(())
}

fn load_store(location: &str) -> Result<TableStore, LexiconError> {
    let source = open_source(location)?;
    let fetched = fetch_and_parse(source.as_ref(), 1)?;
    let mut store = TableStore::new();
    store.load(Dataset::new(fetched.parsed, fetched.version));
    Ok(store)
}

fn run_export(args: ExportArgs) -> Result<(), LexiconError> {
    let mut store = load_store(&args.source)?;

    if let Some(sort) = &args.sort {
        let (column, direction) = sort
            .rsplit_once(':')
            .ok_or_else(|| LexiconError::InvalidSort(sort.clone()))?;
        store.sort(column, direction.parse::<SortDirection>()?)?;
    }
    if let Some(query) = &args.search {
        store.search(query);
    }
    if let Some(spec) = &args.column_search {
        let (column, query) = spec.split_once('=').ok_or_else(|| {
            LexiconError::Config(format!("expected <column>=<text>, got \"{spec}\""))
        })?;
        store.search_column(column, query)?;
    }

    let columns = if args.columns.is_empty() {
        store.headers().to_vec()
    } else {
        for column in &args.columns {
            if !store.headers().contains(column) {
                return Err(LexiconError::UnknownColumn(column.clone()));
            }
        }
        args.columns.clone()
    };

    let scope = if args.all {
        ExportScope::Dataset
    } else {
        ExportScope::View
    };
    let rows: Vec<&Row> = match scope {
        ExportScope::View => store.view_rows(),
        ExportScope::Dataset => store.dataset_rows().iter().collect(),
    };
    let text = export::export(&rows, &columns)?;

    match &args.output {
        Some(path) => {
            let path = export::write_export(path, &text)?;
            info!("Exported {} rows to {}", rows.len(), path.display());
            eprintln!("Exported {} rows to {}", rows.len(), path.display());
        }
        None => println!("{text}"),
    }
    Ok(())
}

fn run_summary(location: &str) -> Result<(), LexiconError> {
    let store = load_store(location)?;
    for (idx, header) in store.headers().iter().enumerate() {
        let summary = summary::summarize(store.column_values(idx));
        println!("{header} ({} distinct, {} empty)", summary.distinct, summary.nulls);
        for line in &summary.lines {
            println!("  {line}");
        }
    }
    Ok(())
}

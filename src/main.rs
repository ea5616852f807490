//! Eventview CLI
//!
//! Command-line interface for querying recorded events.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use eventview::config::{generate_default_config, Config, LoggingConfig, RenderConfig};
use eventview::event::{EventSource, Recording};
use eventview::query::{parse_command, Command, QueryError, QueryExecutor, Truncate};
use eventview::render;
use eventview::view::ViewCatalog;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "eventview", version, about = "Query recorded telemetry events")]
struct Cli {
    /// Configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Output width in characters
    #[arg(long, global = true)]
    width: Option<usize>,

    /// Where overflowing text is cut: beginning or end
    #[arg(long, global = true)]
    truncate: Option<Truncate>,

    /// Maximum number of lines in a cell
    #[arg(long, global = true)]
    cell_height: Option<usize>,

    /// Print the query and symbolic field names
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a query, SHOW EVENTS or SHOW FIELDS <type>
    Query {
        /// Recording in JSON format
        recording: PathBuf,
        /// Query text
        text: String,
    },
    /// Run a named view
    View {
        /// Recording in JSON format
        recording: PathBuf,
        /// View name, e.g. gc-pauses
        name: String,
    },
    /// List available views
    Views,
    /// Print or write the default configuration
    Config {
        /// Write to this file instead of stdout
        #[arg(long)]
        output: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => Config::load_with_env(path)
            .with_context(|| format!("Failed to load configuration from {:?}", path))?,
        None => Config::load_default(),
    };
    if cli.width.is_some() {
        config.render.width = cli.width;
    }
    if cli.truncate.is_some() {
        config.render.truncate = cli.truncate;
    }
    if cli.cell_height.is_some() {
        config.render.cell_height = cli.cell_height;
    }
    if cli.verbose {
        config.render.verbose = true;
    }

    init_logging(&config.logging);

    match cli.command {
        Commands::Query { recording, text } => run_query(&recording, &text, &config),
        Commands::View { recording, name } => run_view(&recording, &name, &config),
        Commands::Views => list_views(&config),
        Commands::Config { output } => write_config(output.as_deref()),
    }
}

fn init_logging(logging: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));
    let registry = tracing_subscriber::registry().with(filter);
    if logging.format == "json" {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

fn open(path: &Path) -> Result<Recording> {
    Recording::open(path).with_context(|| format!("Failed to open recording {:?}", path))
}

/// Point at the position of a syntax error below the query text
fn report(text: &str, error: QueryError) -> anyhow::Error {
    if let Some(position) = error.position() {
        eprintln!("{}", text);
        eprintln!("{}^", " ".repeat(position));
    }
    anyhow::Error::new(error)
}

fn run_query(path: &Path, text: &str, config: &Config) -> Result<()> {
    let mut recording = open(path)?;
    let mut executor = QueryExecutor::new();
    executor.on_metadata(recording.event_types());
    let mut out = std::io::stdout().lock();

    match parse_command(text).map_err(|e| report(text, e))? {
        Command::ShowEvents => {
            executor.execute(&mut recording)?;
            render::print_table(&mut out, &executor.show_events(), &config.render)?;
        }
        Command::ShowFields(name) => {
            let table = executor.show_fields(&name)?;
            render::print_table(&mut out, &table, &config.render)?;
        }
        Command::Query(query) => {
            executor.add_query(query)?;
            executor.execute(&mut recording)?;
            for table in executor.finish() {
                render::print_table(&mut out, &table, &config.render)?;
            }
        }
    }
    Ok(())
}

fn run_view(path: &Path, name: &str, config: &Config) -> Result<()> {
    let catalog = ViewCatalog::with_views(&config.views)?;
    let view = catalog.find(name)?;
    let mut recording = open(path)?;

    let render_config = RenderConfig {
        title: Some(view.label.clone()),
        start_time: recording.start_time(),
        end_time: recording.end_time(),
        ..config.render.clone()
    };

    let mut executor = QueryExecutor::new();
    executor.on_metadata(recording.event_types());
    executor
        .add_query_str(&view.query)
        .map_err(|e| report(&view.query, e))
        .with_context(|| format!("View '{}' cannot run on this recording", view.name))?;
    executor.execute(&mut recording)?;

    let mut out = std::io::stdout().lock();
    for table in executor.finish() {
        if view.form {
            render::print_form(&mut out, &table, &render_config)?;
        } else {
            render::print_table(&mut out, &table, &render_config)?;
        }
    }
    Ok(())
}

fn list_views(config: &Config) -> Result<()> {
    let catalog = ViewCatalog::with_views(&config.views)?;
    let mut out = std::io::stdout().lock();
    for (category, views) in catalog.by_category() {
        writeln!(out, "{}", category)?;
        let width = views.iter().map(|v| v.name.len()).max().unwrap_or(0);
        for view in views {
            writeln!(out, "  {:<width$}  {}", view.name, view.label, width = width)?;
        }
        writeln!(out)?;
    }
    Ok(())
}

fn write_config(output: Option<&Path>) -> Result<()> {
    let content = generate_default_config();
    match output {
        Some(path) => {
            std::fs::write(path, content)
                .with_context(|| format!("Failed to write configuration to {:?}", path))?;
            tracing::info!("Wrote default configuration to {:?}", path);
        }
        None => print!("{}", content),
    }
    Ok(())
}

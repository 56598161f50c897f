//! paperbase CLI: ingest scholarly PDFs and text records into SQLite.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use thiserror::Error;

use paperbase_lib::config::{
    self, ConfigError, GrobidConfig, Settings, APP_NAME, APP_VERSION, DEFAULT_TABLE_NAME,
};
use paperbase_lib::db::{inspect_store, run_query, DatabaseError, QueryResult};
use paperbase_lib::pipeline::extraction::{ExtractionError, GrobidClient};
use paperbase_lib::pipeline::import::{FileKind, ProcessingMode};
use paperbase_lib::pipeline::processor::{IngestRequest, Ingestor};

#[derive(Parser)]
#[command(name = "paperbase", version, about = "Scholarly document ingestion into SQLite")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Ingest a PDF/TXT file or a directory of them into a store.
    Ingest {
        /// File or directory to ingest. Defaults to `pdf_collection_path` from settings.
        input: Option<PathBuf>,

        /// Directory for the store. Defaults to `working_directory` from settings.
        #[arg(long)]
        output_dir: Option<PathBuf>,

        /// Store name (file stem). Defaults to `database_name`/`base_name` from settings.
        #[arg(long)]
        name: Option<String>,

        /// Document table name.
        #[arg(long, default_value = DEFAULT_TABLE_NAME)]
        table: String,

        #[arg(long, value_enum, default_value_t = ProcessingMode::Both)]
        mode: ProcessingMode,

        /// Replace an existing store instead of appending to it.
        #[arg(long)]
        overwrite: bool,

        /// Extraction service config (JSON).
        #[arg(long, default_value = "config.json")]
        grobid_config: PathBuf,

        #[arg(long)]
        settings: Option<PathBuf>,
    },

    /// Summarize the contents of a store.
    Inspect {
        db: PathBuf,

        #[arg(long, default_value = DEFAULT_TABLE_NAME)]
        table: String,
    },

    /// Run a read-only SQL statement against a store.
    Query { db: PathBuf, sql: String },

    /// Show the settings file and any unrecognized keys.
    Settings {
        #[arg(long)]
        settings: Option<PathBuf>,
    },
}

#[derive(Error, Debug)]
enum CliError {
    #[error("{0} not given and not set in settings")]
    MissingArgument(&'static str),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Extraction(#[from] ExtractionError),

    #[error(transparent)]
    Database(#[from] DatabaseError),

    #[error("Ingestion failed")]
    RunFailed,
}

fn main() -> ExitCode {
    paperbase_lib::init_tracing();
    let cli = Cli::parse();

    match execute(cli.command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn execute(command: Commands) -> Result<(), CliError> {
    match command {
        Commands::Ingest {
            input,
            output_dir,
            name,
            table,
            mode,
            overwrite,
            grobid_config,
            settings,
        } => {
            let settings = load_settings(settings.as_deref());
            let input = input
                .or_else(|| settings.pdf_collection_path.clone().map(PathBuf::from))
                .ok_or(CliError::MissingArgument("INPUT"))?;
            let output_dir = output_dir
                .or_else(|| settings.working_directory.clone().map(PathBuf::from))
                .ok_or(CliError::MissingArgument("--output-dir"))?;
            let name = name
                .or_else(|| settings.store_name().map(str::to_string))
                .ok_or(CliError::MissingArgument("--name"))?;

            let service_required = mode.accepts(FileKind::Pdf);
            let client =
                GrobidClient::new(GrobidConfig::load_for_run(&grobid_config, service_required)?)?;
            tracing::info!(
                "{APP_NAME} v{APP_VERSION}: extraction service at {}",
                client.base_url()
            );

            let request = IngestRequest {
                table,
                mode,
                overwrite,
                ..IngestRequest::new(input, output_dir, &name)
            };
            let progress = |fraction: f32, label: &str| {
                eprintln!("[{:>3.0}%] {label}", fraction * 100.0);
            };
            let report = Ingestor::new(&client).run(&request, Some(&progress), None);

            println!("{}", report.joined());
            match report.store_path {
                Some(path) => {
                    println!("Store: {}", path.display());
                    Ok(())
                }
                None => Err(CliError::RunFailed),
            }
        }

        Commands::Inspect { db, table } => {
            let summary = inspect_store(&db, &table)?;
            println!("Table '{}' ({} records)", summary.table, summary.record_count);
            println!("Columns:");
            for column in &summary.columns {
                println!("  {} {}", column.name, column.declared_type);
            }
            print_section("Sample", &summary.sample);
            println!("\nUnique authors: {}", summary.unique_authors);
            println!("Dates: {}", summary.dates.join(", "));
            println!("Journals: {}", summary.journals.join(", "));
            print_section("Most recent", &summary.recent);
            print_section("Longest abstracts", &summary.longest_abstracts);
            Ok(())
        }

        Commands::Query { db, sql } => {
            let result = run_query(&db, &sql)?;
            print_section("Result", &result);
            Ok(())
        }

        Commands::Settings { settings } => {
            let path = settings.unwrap_or_else(config::default_settings_path);
            let loaded = Settings::load(&path);
            println!("Settings file: {}", path.display());
            println!(
                "{}",
                serde_json::to_string_pretty(&loaded).unwrap_or_else(|e| e.to_string())
            );
            for key in loaded.unrecognized_keys() {
                println!("warning: unrecognized key '{key}'");
            }
            Ok(())
        }
    }
}

fn load_settings(path: Option<&Path>) -> Settings {
    match path {
        Some(path) => Settings::load(path),
        None => Settings::load(&config::default_settings_path()),
    }
}

fn print_section(title: &str, result: &QueryResult) {
    println!("\n{title}:");
    println!("  {}", result.columns.join(" | "));
    for row in &result.rows {
        println!("  {}", row.join(" | "));
    }
}

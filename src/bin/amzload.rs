//! amzload CLI - parse the Amazon product-metadata dump and load it into PostgreSQL
//!
//! Exit statuses: 0 success, 1 configuration or usage error, 2 unreadable
//! input, 3 database or load-stage failure.

use clap::{Parser, Subcommand};
use dotenv::dotenv;
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::process;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use amzload::loader::{load, LoadOptions, LoadReport, LoadStrategy, MemoryStore};
use amzload::runtime::{parse_file, ConfigError, InputEncoding, LoaderConfig};
use amzload::serialization::{NdjsonWriter, SerializationError};
use amzload::{AppError, ParsedDump};

#[derive(Parser)]
#[command(name = "amzload")]
#[command(version, about = "Parse the Amazon product-metadata dump and load it into PostgreSQL", long_about = None)]
struct Cli {
    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse the dump and write every entity as NDJSON
    Parse {
        /// Path to the metadata dump
        #[arg(short, long)]
        input: PathBuf,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Input encoding (utf8, latin1)
        #[arg(long)]
        encoding: Option<InputEncoding>,
    },

    /// Parse the dump and load it into the database
    Load {
        /// Path to the metadata dump
        #[arg(short, long)]
        input: PathBuf,

        /// YAML configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Database URL - overrides DATABASE_URL and the config file
        #[arg(long)]
        database_url: Option<String>,

        /// Rows per statement
        #[arg(long)]
        chunk_size: Option<usize>,

        /// Write strategy (bulk, per-product)
        #[arg(long)]
        strategy: Option<LoadStrategy>,

        /// Input encoding (utf8, latin1)
        #[arg(long)]
        encoding: Option<InputEncoding>,

        /// Create missing tables before loading
        #[arg(long)]
        init_schema: bool,

        /// Load into an in-memory store instead of the database
        #[arg(long)]
        dry_run: bool,

        /// Write the JSON load report to this file
        #[arg(long)]
        report: Option<PathBuf>,
    },

    /// Create the normalized tables if they are missing
    InitSchema {
        /// YAML configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Database URL - overrides DATABASE_URL and the config file
        #[arg(long)]
        database_url: Option<String>,
    },
}

fn main() {
    dotenv().ok();
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result = match cli.command {
        Commands::Parse { input, output, encoding } => run_parse(&input, output.as_deref(), encoding),
        Commands::Load {
            input,
            config,
            database_url,
            chunk_size,
            strategy,
            encoding,
            init_schema,
            dry_run,
            report,
        } => LoaderConfig::resolve(config.as_deref())
            .map_err(AppError::from)
            .and_then(|config| {
                let config = override_config(config, database_url, chunk_size, strategy, encoding)?;
                run_load(&input, &config, init_schema, dry_run, report.as_deref())
            }),
        Commands::InitSchema { config, database_url } => LoaderConfig::resolve(config.as_deref())
            .map_err(AppError::from)
            .and_then(|config| {
                let config = override_config(config, database_url, None, None, None)?;
                run_init_schema(&config)
            }),
    };

    if let Err(e) = result {
        error!(exit_code = e.exit_code(), "{}", e);
        eprintln!("Error: {}", e);
        process::exit(e.exit_code());
    }
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

/// Apply CLI flags on top of file and environment values.
fn override_config(
    mut config: LoaderConfig,
    database_url: Option<String>,
    chunk_size: Option<usize>,
    strategy: Option<LoadStrategy>,
    encoding: Option<InputEncoding>,
) -> Result<LoaderConfig, ConfigError> {
    if database_url.is_some() {
        config.database_url = database_url;
    }
    if let Some(chunk_size) = chunk_size {
        config.chunk_size = chunk_size;
    }
    if let Some(strategy) = strategy {
        config.strategy = strategy;
    }
    if let Some(encoding) = encoding {
        config.encoding = encoding;
    }
    config.validate()?;
    Ok(config)
}

fn run_parse(input: &Path, output: Option<&Path>, encoding: Option<InputEncoding>) -> Result<(), AppError> {
    let encoding = match encoding {
        Some(encoding) => encoding,
        None => LoaderConfig::resolve(None)?.encoding,
    };
    let dump = parse_file(input, encoding)?;

    let counts = match output {
        Some(path) => {
            ensure_parent_dir(path).map_err(SerializationError::from)?;
            let file = File::create(path).map_err(SerializationError::from)?;
            NdjsonWriter::new(BufWriter::new(file)).write_dump(&dump)?
        }
        None => {
            let stdout = io::stdout();
            NdjsonWriter::new(BufWriter::new(stdout.lock())).write_dump(&dump)?
        }
    };

    info!(
        products = counts.products,
        customers = counts.customers,
        similars = counts.similars,
        reviews = counts.reviews,
        "wrote entities"
    );
    Ok(())
}

fn run_load(
    input: &Path,
    config: &LoaderConfig,
    init_schema: bool,
    dry_run: bool,
    report_path: Option<&Path>,
) -> Result<(), AppError> {
    let dump = parse_file(input, config.encoding)?;
    let options = LoadOptions::from(config);

    let report = if dry_run {
        info!("dry run: loading into memory");
        let mut store = MemoryStore::new();
        load(&dump, &mut store, &options)?
    } else {
        load_into_database(config, &dump, &options, init_schema)?
    };

    info!(
        run_id = %report.run_id,
        products = report.products_written,
        categories = report.categories_written,
        product_categories = report.product_categories_written,
        customers = report.customers_written,
        similars = report.similars_written,
        reviews = report.reviews_written,
        failed_products = report.failed_products.len(),
        "load finished in {} ms",
        report.elapsed_ms
    );

    if let Some(path) = report_path {
        write_report(&report, path)?;
    }
    Ok(())
}

fn write_report(report: &LoadReport, path: &Path) -> Result<(), SerializationError> {
    let json = report.to_json_pretty()?;
    ensure_parent_dir(path)?;
    let mut file = File::create(path)?;
    file.write_all(json.as_bytes())?;
    file.write_all(b"\n")?;
    info!(path = %path.display(), "wrote load report");
    Ok(())
}

#[cfg(feature = "postgres")]
fn connect(config: &LoaderConfig) -> Result<amzload::Database, AppError> {
    let database = amzload::Database::new_with_config(config.database_url()?, config.pool.clone())
        .map_err(amzload::StoreError::from)?;
    database.test_connection()?;
    info!("connected to database");
    Ok(database)
}

#[cfg(feature = "postgres")]
fn load_into_database(
    config: &LoaderConfig,
    dump: &ParsedDump,
    options: &LoadOptions,
    init_schema: bool,
) -> Result<LoadReport, AppError> {
    let database = connect(config)?;
    let mut store = amzload::PgStore::connect(&database, config.chunk_size)?;
    if init_schema {
        store.ensure_schema()?;
    }
    Ok(load(dump, &mut store, options)?)
}

#[cfg(not(feature = "postgres"))]
fn load_into_database(
    _config: &LoaderConfig,
    _dump: &ParsedDump,
    _options: &LoadOptions,
    _init_schema: bool,
) -> Result<LoadReport, AppError> {
    Err(no_database())
}

#[cfg(feature = "postgres")]
fn run_init_schema(config: &LoaderConfig) -> Result<(), AppError> {
    let database = connect(config)?;
    let mut store = amzload::PgStore::connect(&database, config.chunk_size)?;
    store.ensure_schema()?;
    info!("schema ready");
    Ok(())
}

#[cfg(not(feature = "postgres"))]
fn run_init_schema(_config: &LoaderConfig) -> Result<(), AppError> {
    Err(no_database())
}

#[cfg(not(feature = "postgres"))]
fn no_database() -> AppError {
    AppError::Config(ConfigError::Invalid(
        "built without the postgres feature; use --dry-run".to_string(),
    ))
}

fn ensure_parent_dir(path: &Path) -> io::Result<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => fs::create_dir_all(parent),
        _ => Ok(()),
    }
}

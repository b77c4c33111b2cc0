/*!
 * geobatch CLI - Command Line Interface
 */

use clap::{Parser, Subcommand, ValueEnum};
use geobatch::{
    catalog::Catalog,
    config::{GeobatchConfig, LogLevel},
    core::{georeference, BatchRequest, FileJob},
    error::{GeobatchError, Result, EXIT_PARTIAL, EXIT_SUCCESS},
    geometry::{detector_from_config, ImageGeometry},
    logging,
    output::OutputWriter,
    GeoJsonCatalog,
};
use std::path::PathBuf;
use tracing::warn;

#[derive(Parser)]
#[command(name = "geobatch")]
#[command(version, about = "Batch georeferencing of scanned map sheets against reference polygons", long_about = None)]
struct Cli {
    /// Configuration file (TOML)
    #[arg(short = 'c', long = "config", value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Log level
    #[arg(long = "log-level", value_enum, global = true)]
    log_level: Option<LogLevelArg>,

    /// Log file path (JSON lines; default is stderr)
    #[arg(long = "log", value_name = "FILE", global = true)]
    log: Option<PathBuf>,

    /// Verbose output (debug logging)
    #[arg(short = 'v', long = "verbose", global = true)]
    verbose: bool,

    /// Print results as JSON
    #[arg(long = "json", global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Georeference a batch of raster files
    Run(RunArgs),

    /// List loaded reference maps
    Maps,

    /// List the attributes of a reference map
    Attributes {
        /// Reference map name
        #[arg(value_name = "ID")]
        id: String,
    },
}

#[derive(clap::Args)]
struct RunArgs {
    /// Reference map to look rasters up in
    #[arg(long = "map", value_name = "ID", default_value = "")]
    map: String,

    /// Attribute the raster key is matched against
    #[arg(long = "attr-key", value_name = "NAME", default_value = "")]
    attr_key: String,

    /// Raster key strategy
    #[arg(long = "strategy", value_name = "all|prefix|suffix|regex", default_value = "")]
    strategy: String,

    /// Characters kept by the prefix strategy
    #[arg(long = "prefix-chars", value_name = "N", default_value = "")]
    prefix_chars: String,

    /// Characters kept by the suffix strategy
    #[arg(long = "suffix-chars", value_name = "N", default_value = "")]
    suffix_chars: String,

    /// Pattern used by the regex strategy
    #[arg(long = "regex", value_name = "PATTERN", default_value = "")]
    regex: String,

    /// Target directory under the storage root
    #[arg(long = "target-dir", value_name = "DIR", default_value = "")]
    target_dir: String,

    /// JSON array of attributes used to nest output directories
    #[arg(long = "subdir-attrs", value_name = "JSON", default_value = "")]
    subdir_attrs: String,

    /// Horizontal anchor label for feature detection
    #[arg(long = "x-position", value_name = "LABEL", default_value = "")]
    x_position: String,

    /// Vertical anchor label for feature detection
    #[arg(long = "y-position", value_name = "LABEL", default_value = "")]
    y_position: String,

    /// Margin around the reference extent, as a fraction of its size
    #[arg(long = "margin", value_name = "M", default_value = "0")]
    margin: String,

    /// Raster files to georeference
    #[arg(value_name = "FILES")]
    files: Vec<PathBuf>,
}

impl RunArgs {
    fn into_request(self) -> Result<BatchRequest> {
        let files = self
            .files
            .into_iter()
            .map(FileJob::from_path)
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(BatchRequest {
            reference_map: self.map,
            attr_key: self.attr_key,
            key_strategy: self.strategy,
            prefix_chars: self.prefix_chars,
            suffix_chars: self.suffix_chars,
            key_regex: self.regex,
            target_dir: self.target_dir,
            subdir_attrs: self.subdir_attrs,
            x_position: self.x_position,
            y_position: self.y_position,
            margin: self.margin,
            files,
        })
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogLevelArg {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<LogLevelArg> for LogLevel {
    fn from(arg: LogLevelArg) -> Self {
        match arg {
            LogLevelArg::Error => LogLevel::Error,
            LogLevelArg::Warn => LogLevel::Warn,
            LogLevelArg::Info => LogLevel::Info,
            LogLevelArg::Debug => LogLevel::Debug,
            LogLevelArg::Trace => LogLevel::Trace,
        }
    }
}

fn main() {
    let cli = Cli::parse();
    let output = OutputWriter::new(cli.json);
    let code = match run(cli, &output) {
        Ok(code) => code,
        Err(e) => {
            output.error(&e.to_string());
            e.exit_code()
        }
    };
    std::process::exit(code);
}

fn run(cli: Cli, output: &OutputWriter) -> Result<i32> {
    let mut config = match cli.config {
        Some(ref path) => GeobatchConfig::from_file(path).map_err(|e| {
            GeobatchError::Config(format!(
                "Failed to load config file {}: {}",
                path.display(),
                e
            ))
        })?,
        None => GeobatchConfig::default(),
    };

    if let Some(level) = cli.log_level {
        config.log_level = level.into();
    }
    if cli.log.is_some() {
        config.log_file = cli.log.clone();
    }
    config.verbose |= cli.verbose;

    if let Err(e) = logging::init_logging(&config) {
        eprintln!("Warning: Failed to initialize logging: {}", e);
    }

    let catalog = GeoJsonCatalog::from_config(&config.reference_maps)?;

    match cli.command {
        Commands::Maps => {
            output.references(&catalog.list_references()?);
            Ok(EXIT_SUCCESS)
        }
        Commands::Attributes { id } => {
            output.attributes(&catalog.reference_attributes(&id)?);
            Ok(EXIT_SUCCESS)
        }
        Commands::Run(args) => {
            if config.feature_detector.is_none() {
                warn!("No feature detector configured; using the whole image as the map frame");
            }
            let detector = detector_from_config(config.feature_detector.as_ref());
            let geometry = ImageGeometry::new(detector);
            let response = georeference(
                args.into_request()?,
                &config.storage_root,
                &catalog,
                &geometry,
            )?;
            output.batch_response(&response);
            Ok(if response.fail == 0 {
                EXIT_SUCCESS
            } else {
                EXIT_PARTIAL
            })
        }
    }
}

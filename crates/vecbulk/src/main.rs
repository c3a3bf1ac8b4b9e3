use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use vecbulk_common::{logger, AppConfig, VecBulkError};
use vecbulk_vector::{
    rng_from_seed, verify_file, DegeneratePolicy, Distribution, GenerationSummary, UploadScript,
    VectorBulkGenerator, VerifyOptions, DEFAULT_NORM_TOLERANCE,
};

/// Find project root by looking for .git directory
fn find_project_root() -> Option<PathBuf> {
    let mut current_dir = std::env::current_dir().ok()?;

    loop {
        if current_dir.join(".git").exists() {
            return Some(current_dir);
        }

        if !current_dir.pop() {
            break;
        }
    }

    None
}

/// Load .env file from project root
fn load_dotenv_from_project_root() {
    if let Some(root) = find_project_root() {
        let env_path = root.join(".env");
        if env_path.exists() {
            dotenv::from_path(&env_path).ok();
        }
    } else {
        // Fallback to default dotenv behavior
        dotenv::dotenv().ok();
    }
}

#[derive(Parser)]
#[command(name = "vecbulk")]
#[command(about = "Generate L2-normalized random vectors as bulk-indexing NDJSON", long_about = None)]
struct Cli {
    /// Config file (TOML, JSON or YAML)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a bulk NDJSON file (and the upload script)
    Generate(GenerateArgs),

    /// Check an existing bulk NDJSON file
    Verify {
        /// Bulk file to check
        path: PathBuf,

        /// Expected index name
        #[arg(long)]
        index: Option<String>,

        /// Vector field name (defaults to the configured field)
        #[arg(long)]
        field: Option<String>,

        /// Expected dimensionality
        #[arg(long)]
        dimension: Option<usize>,

        /// Expected first identifier
        #[arg(long)]
        id_offset: Option<u64>,

        /// Allowed |norm - 1|
        #[arg(long, default_value_t = DEFAULT_NORM_TOLERANCE)]
        tolerance: f64,
    },
}

#[derive(Args, Default)]
struct GenerateArgs {
    /// Number of documents
    #[arg(short = 'n', long)]
    count: Option<usize>,

    /// Vector dimensionality
    #[arg(short, long)]
    dimension: Option<usize>,

    /// Target index name
    #[arg(long)]
    index: Option<String>,

    /// Vector field name
    #[arg(long)]
    field: Option<String>,

    /// Component distribution (uniform, normal)
    #[arg(long)]
    distribution: Option<Distribution>,

    /// First document identifier
    #[arg(long)]
    id_offset: Option<u64>,

    /// RNG seed for reproducible output
    #[arg(long)]
    seed: Option<u64>,

    /// Vectors held in memory at once
    #[arg(long)]
    chunk_size: Option<usize>,

    /// Zero-norm vector handling (abort, resample)
    #[arg(long)]
    on_degenerate: Option<DegeneratePolicy>,

    /// Output file ("-" for stdout)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Upload script path
    #[arg(long)]
    script: Option<PathBuf>,

    /// Do not write the upload script
    #[arg(long)]
    no_script: bool,

    /// Search engine base URL used in the upload script
    #[arg(long)]
    endpoint: Option<String>,

    /// Hide progress and lower log level to warn
    #[arg(short, long)]
    quiet: bool,
}

impl GenerateArgs {
    /// Override configuration with CLI arguments
    fn apply(&self, config: &mut AppConfig) {
        if let Some(count) = self.count {
            config.doc_count = count;
        }
        if let Some(dimension) = self.dimension {
            config.dimension = dimension;
        }
        if let Some(index) = &self.index {
            config.index_name = index.clone();
        }
        if let Some(field) = &self.field {
            config.field_name = field.clone();
        }
        if let Some(distribution) = self.distribution {
            config.distribution = distribution.to_string();
        }
        if let Some(id_offset) = self.id_offset {
            config.id_offset = id_offset;
        }
        if self.seed.is_some() {
            config.seed = self.seed;
        }
        if let Some(chunk_size) = self.chunk_size {
            config.chunk_size = chunk_size;
        }
        if let Some(policy) = self.on_degenerate {
            config.on_degenerate = policy.to_string();
        }
        if let Some(output) = &self.output {
            config.output_path = output.clone();
        }
        if let Some(script) = &self.script {
            config.script_path = script.clone();
        }
        if let Some(endpoint) = &self.endpoint {
            config.bulk_endpoint = endpoint.clone();
        }
        // Writing to stdout leaves no file for the script to reference
        if self.no_script || config.writes_to_stdout() {
            config.write_script = false;
        }
        if self.quiet {
            config.log_level = "warn".to_string();
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Load environment variables from .env at project root before config sources are read
    load_dotenv_from_project_root();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            let code = e.downcast_ref::<VecBulkError>().map_or(1, VecBulkError::exit_code);
            ExitCode::from(u8::try_from(code).unwrap_or(1))
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    let mut config = AppConfig::load(cli.config.as_deref())?;

    match cli.command {
        Some(Commands::Generate(args)) => {
            args.apply(&mut config);
            run_generate(&config, args.quiet)
        }
        Some(Commands::Verify {
            path,
            index,
            field,
            dimension,
            id_offset,
            tolerance,
        }) => {
            init_logging(&config)?;

            let mut options = VerifyOptions::new(field.unwrap_or_else(|| config.field_name.clone()));
            options.index_name = index;
            options.dimension = dimension;
            options.id_offset = id_offset;
            options.tolerance = tolerance;

            let report = verify_file(&path, &options)
                .with_context(|| format!("Verification of {} failed", path.display()))?;
            println!("{}", serde_json::to_string_pretty(&report)?);
            Ok(())
        }
        None => {
            // Default: generate with configured values
            GenerateArgs::default().apply(&mut config);
            run_generate(&config, false)
        }
    }
}

fn init_logging(config: &AppConfig) -> Result<()> {
    match &config.log_dir {
        Some(log_dir) => logger::setup_logging(log_dir, &config.log_level)?,
        None => logger::setup_console_logging(&config.log_level)?,
    }
    Ok(())
}

fn run_generate(config: &AppConfig, quiet: bool) -> Result<()> {
    init_logging(config)?;

    let stdout = std::io::stdout();
    let summary = generate_outputs(config, stdout.lock(), quiet)?;
    report(&summary, config, !quiet && !config.writes_to_stdout());
    Ok(())
}

/// Write the payload and, if enabled, the upload script
///
/// `-` as output path streams the payload to `stdout` instead of a file.
fn generate_outputs<W: Write>(config: &AppConfig, stdout: W, quiet: bool) -> Result<GenerationSummary> {
    config.validate()?;

    let generator = VectorBulkGenerator::from_config(config)?;
    let mut rng = rng_from_seed(config.seed);

    tracing::info!("vecbulk starting...");
    tracing::info!("  Documents: {}", config.doc_count);
    tracing::info!("  Dimension: {}", config.dimension);
    tracing::info!("  Output: {}", config.output_path.display());
    if let Some(seed) = config.seed {
        tracing::info!("  Seed: {}", seed);
    }

    if config.writes_to_stdout() {
        return Ok(generator.write_to(&mut rng, BufWriter::new(stdout))?);
    }

    let progress = progress_bar(config.doc_count, quiet);
    let summary = generator
        .write_file_with_progress(&mut rng, &config.output_path, |written| {
            progress.set_position(written as u64)
        })
        .with_context(|| format!("Failed to write {}", config.output_path.display()));
    progress.finish_and_clear();
    let summary = summary?;

    if config.write_script {
        UploadScript::new(&config.output_path, &config.bulk_endpoint)
            .write(&config.script_path)
            .with_context(|| format!("Failed to write {}", config.script_path.display()))?;
    }

    Ok(summary)
}

fn progress_bar(total: usize, quiet: bool) -> ProgressBar {
    if quiet {
        return ProgressBar::hidden();
    }

    let pb = ProgressBar::new(total as u64);
    pb.set_style(
        ProgressStyle::with_template("{spinner:.green} [{elapsed_precise}] {bar:40.cyan/blue} {pos:>7}/{len:7} vectors")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=>-"),
    );
    pb
}

fn report(summary: &GenerationSummary, config: &AppConfig, to_stdout: bool) {
    let message = format!(
        "Generated {} with {} normalized vectors of dimension {} ({} distribution, ids {}..={})",
        config.output_path.display(),
        summary.documents,
        summary.dimension,
        summary.distribution,
        summary.first_id,
        summary.last_id
    );

    if to_stdout {
        println!("{}", message);
        if config.write_script {
            println!("Upload with: bash {}", config.script_path.display());
        }
    } else {
        tracing::info!("{}", message);
    }
}

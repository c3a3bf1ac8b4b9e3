use crate::error::VecBulkError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variable prefix (`VECBULK_DOC_COUNT`, `VECBULK_SEED`, ...)
pub const ENV_PREFIX: &str = "VECBULK";

/// vecbulk application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Number of documents to generate
    pub doc_count: usize,

    /// Vector dimensionality
    pub dimension: usize,

    /// Target index name written into every action line
    pub index_name: String,

    /// Document field holding the vector
    pub field_name: String,

    /// Sampling distribution ("uniform" or "normal")
    pub distribution: String,

    /// First document identifier
    pub id_offset: u64,

    /// RNG seed (entropy when unset)
    #[serde(default)]
    pub seed: Option<u64>,

    /// Vectors generated per chunk
    pub chunk_size: usize,

    /// What to do with a zero-norm vector ("abort" or "resample")
    pub on_degenerate: String,

    /// NDJSON output path ("-" for stdout)
    pub output_path: PathBuf,

    /// Whether to write the upload script
    pub write_script: bool,

    /// Upload script path
    pub script_path: PathBuf,

    /// Search engine base URL used by the upload script
    pub bulk_endpoint: String,

    /// Log directory (console only when unset)
    #[serde(default)]
    pub log_dir: Option<PathBuf>,

    /// Log level
    pub log_level: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            doc_count: 10_000,
            dimension: 15,
            index_name: "my-knn-index".to_string(),
            field_name: "location".to_string(),
            distribution: "uniform".to_string(),
            id_offset: 0,
            seed: None,
            chunk_size: 1024,
            on_degenerate: "abort".to_string(),
            output_path: PathBuf::from("knn_bulk_data.json"),
            write_script: true,
            script_path: PathBuf::from("knn_bulk_upload.sh"),
            bulk_endpoint: "http://localhost:9200".to_string(),
            log_dir: None,
            log_level: "info".to_string(),
        }
    }
}

impl AppConfig {
    /// Load configuration from defaults, an optional config file, `.env` and
    /// `VECBULK_*` environment variables (later sources win)
    pub fn load(config_file: Option<&Path>) -> Result<Self, VecBulkError> {
        // Load .env file (ignore if not exists)
        let _ = dotenv::dotenv();

        Self::load_with_env(config_file, ::config::Environment::with_prefix(ENV_PREFIX))
    }

    /// Load configuration from defaults and an optional config file only
    pub fn from_file(config_file: Option<&Path>) -> Result<Self, VecBulkError> {
        let builder = Self::builder_with_defaults()?;
        let builder = match config_file {
            Some(path) => builder.add_source(Self::file_source(path)?),
            None => builder,
        };

        let config: Self = builder.build()?.try_deserialize()?;
        Ok(config)
    }

    fn load_with_env(
        config_file: Option<&Path>,
        env: ::config::Environment,
    ) -> Result<Self, VecBulkError> {
        let builder = Self::builder_with_defaults()?;
        let builder = match config_file {
            Some(path) => builder.add_source(Self::file_source(path)?),
            None => builder,
        };

        let config: Self = builder.add_source(env).build()?.try_deserialize()?;
        Ok(config)
    }

    fn file_source(
        path: &Path,
    ) -> Result<::config::File<::config::FileSourceFile, ::config::FileFormat>, VecBulkError> {
        if !path.exists() {
            return Err(VecBulkError::config(format!(
                "Config file not found: {}",
                path.display()
            )));
        }
        Ok(::config::File::from(path).required(true))
    }

    fn builder_with_defaults(
    ) -> Result<::config::ConfigBuilder<::config::builder::DefaultState>, VecBulkError> {
        let defaults = Self::default();
        let builder = ::config::Config::builder()
            .set_default("doc_count", defaults.doc_count as i64)?
            .set_default("dimension", defaults.dimension as i64)?
            .set_default("index_name", defaults.index_name)?
            .set_default("field_name", defaults.field_name)?
            .set_default("distribution", defaults.distribution)?
            .set_default("id_offset", defaults.id_offset as i64)?
            .set_default("chunk_size", defaults.chunk_size as i64)?
            .set_default("on_degenerate", defaults.on_degenerate)?
            .set_default("output_path", path_str(&defaults.output_path))?
            .set_default("write_script", defaults.write_script)?
            .set_default("script_path", path_str(&defaults.script_path))?
            .set_default("bulk_endpoint", defaults.bulk_endpoint)?
            .set_default("log_level", defaults.log_level)?;
        Ok(builder)
    }

    /// Whether the payload goes to stdout instead of a file
    pub fn writes_to_stdout(&self) -> bool {
        self.output_path.as_os_str() == "-"
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), VecBulkError> {
        if self.doc_count == 0 {
            return Err(VecBulkError::invalid_argument("doc_count must be at least 1"));
        }

        if self.dimension == 0 {
            return Err(VecBulkError::invalid_argument("dimension must be at least 1"));
        }

        if self.index_name.is_empty() {
            return Err(VecBulkError::invalid_argument("index_name cannot be empty"));
        }

        if self.field_name.is_empty() {
            return Err(VecBulkError::invalid_argument("field_name cannot be empty"));
        }

        if self.chunk_size == 0 {
            return Err(VecBulkError::invalid_argument("chunk_size must be at least 1"));
        }

        if self.write_script
            && !self.bulk_endpoint.starts_with("http://")
            && !self.bulk_endpoint.starts_with("https://")
        {
            return Err(VecBulkError::config(
                "Bulk endpoint must start with http:// or https://",
            ));
        }

        if self.write_script && self.writes_to_stdout() {
            return Err(VecBulkError::config(
                "Upload script needs a data file; disable it when writing to stdout",
            ));
        }

        Ok(())
    }
}

fn path_str(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use vecbulk_common::{AppConfig, Result, VecBulkError};

/// Distribution vector components are drawn from
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Distribution {
    /// Uniform on [0, 1)
    #[default]
    Uniform,

    /// Standard normal (mean 0, std 1)
    Normal,
}

impl FromStr for Distribution {
    type Err = VecBulkError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "uniform" | "rand" => Ok(Self::Uniform),
            "normal" | "gaussian" | "randn" => Ok(Self::Normal),
            other => Err(VecBulkError::invalid_argument(format!(
                "Unknown distribution '{}' (expected uniform or normal)",
                other
            ))),
        }
    }
}

impl fmt::Display for Distribution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Uniform => write!(f, "uniform"),
            Self::Normal => write!(f, "normal"),
        }
    }
}

/// What happens when a sampled vector has zero norm
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DegeneratePolicy {
    /// Fail the whole batch
    #[default]
    Abort,

    /// Redraw that single vector
    Resample,
}

impl FromStr for DegeneratePolicy {
    type Err = VecBulkError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "abort" => Ok(Self::Abort),
            "resample" => Ok(Self::Resample),
            other => Err(VecBulkError::invalid_argument(format!(
                "Unknown degenerate-vector policy '{}' (expected abort or resample)",
                other
            ))),
        }
    }
}

impl fmt::Display for DegeneratePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Abort => write!(f, "abort"),
            Self::Resample => write!(f, "resample"),
        }
    }
}

/// Default number of vectors held in memory at once
pub const DEFAULT_CHUNK_SIZE: usize = 1024;

/// Generator parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratorParams {
    /// Number of documents
    pub count: usize,

    /// Vector dimensionality
    pub dimension: usize,

    /// Target index name
    pub index_name: String,

    /// Document field holding the vector
    pub field_name: String,

    /// Component distribution
    pub distribution: Distribution,

    /// First identifier
    pub id_offset: u64,

    /// Vectors per chunk
    pub chunk_size: usize,

    /// Zero-norm handling
    pub on_degenerate: DegeneratePolicy,
}

impl GeneratorParams {
    /// Create parameters with uniform sampling, ids from 0 and default chunking
    pub fn new(
        count: usize,
        dimension: usize,
        index_name: impl Into<String>,
        field_name: impl Into<String>,
    ) -> Self {
        Self {
            count,
            dimension,
            index_name: index_name.into(),
            field_name: field_name.into(),
            distribution: Distribution::default(),
            id_offset: 0,
            chunk_size: DEFAULT_CHUNK_SIZE,
            on_degenerate: DegeneratePolicy::default(),
        }
    }

    pub fn with_distribution(mut self, distribution: Distribution) -> Self {
        self.distribution = distribution;
        self
    }

    pub fn with_id_offset(mut self, id_offset: u64) -> Self {
        self.id_offset = id_offset;
        self
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    pub fn with_degenerate_policy(mut self, policy: DegeneratePolicy) -> Self {
        self.on_degenerate = policy;
        self
    }

    /// Build parameters from application configuration
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let params = Self::new(
            config.doc_count,
            config.dimension,
            config.index_name.clone(),
            config.field_name.clone(),
        )
        .with_distribution(config.distribution.parse()?)
        .with_id_offset(config.id_offset)
        .with_chunk_size(config.chunk_size)
        .with_degenerate_policy(config.on_degenerate.parse()?);

        params.validate()?;
        Ok(params)
    }

    /// Check ranges before any generation starts
    pub fn validate(&self) -> Result<()> {
        if self.count == 0 {
            return Err(VecBulkError::invalid_argument("count must be at least 1"));
        }
        if self.dimension == 0 {
            return Err(VecBulkError::invalid_argument("dimension must be at least 1"));
        }
        if self.index_name.is_empty() {
            return Err(VecBulkError::invalid_argument("index name cannot be empty"));
        }
        if self.field_name.is_empty() {
            return Err(VecBulkError::invalid_argument("field name cannot be empty"));
        }
        if self.chunk_size == 0 {
            return Err(VecBulkError::invalid_argument("chunk size must be at least 1"));
        }
        self.last_id()?;
        Ok(())
    }

    /// Identifier of the last document
    pub fn last_id(&self) -> Result<u64> {
        self.count
            .checked_sub(1)
            .and_then(|span| u64::try_from(span).ok())
            .and_then(|span| self.id_offset.checked_add(span))
            .ok_or_else(|| {
                VecBulkError::invalid_argument(format!(
                    "{} documents starting at id {} overflow the identifier range",
                    self.count, self.id_offset
                ))
            })
    }
}

/// Outcome of one generation run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationSummary {
    /// Documents written
    pub documents: usize,

    /// Vector dimensionality
    pub dimension: usize,

    /// NDJSON lines written (2 per document)
    pub lines: usize,

    /// Payload size in bytes
    pub bytes: u64,

    pub first_id: u64,
    pub last_id: u64,

    /// Vectors redrawn because of zero norm
    pub resampled: usize,

    /// Component distribution
    pub distribution: Distribution,

    /// Timestamp when generation started
    pub generated_at: DateTime<Utc>,

    /// Wall time in milliseconds
    pub elapsed_ms: u64,
}

//! vecbulk vector generation
//!
//! 랜덤 벡터 생성, L2 정규화, bulk NDJSON 직렬화 및 검증

mod bulk;
mod generator;
mod normalize;
mod output;
mod sampler;
mod script;
mod types;
mod verify;

pub use bulk::{ActionLine, BulkWriter, DocumentLine, IndexTarget};
pub use generator::{generate, VectorBulkGenerator, MAX_RESAMPLE_ATTEMPTS};
pub use normalize::{l2_norm, normalize_in_place};
pub use output::write_atomic;
pub use sampler::{rng_from_seed, sample_batch, sample_vector};
pub use script::{UploadScript, DEFAULT_ENDPOINT, NDJSON_CONTENT_TYPE};
pub use types::{DegeneratePolicy, Distribution, GenerationSummary, GeneratorParams, DEFAULT_CHUNK_SIZE};
pub use verify::{verify_bulk, verify_file, VerifyOptions, VerifyReport, DEFAULT_NORM_TOLERANCE};

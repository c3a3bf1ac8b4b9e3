use ndarray::ArrayViewMut1;
use rand::Rng;
use std::io::Write;
use std::path::Path;
use std::time::Instant;
use tracing::{debug, info, warn};
use vecbulk_common::{AppConfig, Result, VecBulkError};

use crate::bulk::BulkWriter;
use crate::normalize::normalize_in_place;
use crate::output::write_atomic;
use crate::sampler::{sample_batch, sample_vector};
use crate::types::{DegeneratePolicy, Distribution, GenerationSummary, GeneratorParams};

/// Redraws allowed for one zero-norm vector under `DegeneratePolicy::Resample`
pub const MAX_RESAMPLE_ATTEMPTS: usize = 8;

/// Generates L2-normalized random vectors as bulk NDJSON
#[derive(Debug, Clone)]
pub struct VectorBulkGenerator {
    params: GeneratorParams,
}

impl VectorBulkGenerator {
    /// Create new generator (parameters are validated here)
    pub fn new(params: GeneratorParams) -> Result<Self> {
        params.validate()?;
        Ok(Self { params })
    }

    /// Create generator from application configuration
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        Self::new(GeneratorParams::from_config(config)?)
    }

    pub fn params(&self) -> &GeneratorParams {
        &self.params
    }

    /// Stream the whole payload into `writer`
    pub fn write_to<R: Rng, W: Write>(&self, rng: &mut R, writer: W) -> Result<GenerationSummary> {
        self.write_to_with_progress(rng, writer, |_| {})
    }

    /// Stream the payload chunk by chunk; `on_chunk` receives the number of
    /// documents written so far after each chunk
    pub fn write_to_with_progress<R, W, F>(
        &self,
        rng: &mut R,
        writer: W,
        mut on_chunk: F,
    ) -> Result<GenerationSummary>
    where
        R: Rng,
        W: Write,
        F: FnMut(usize),
    {
        let params = &self.params;
        let generated_at = chrono::Utc::now();
        let started = Instant::now();

        info!(
            "Generating {} vectors (dim={}, distribution={}, index={}, field={}, first_id={})",
            params.count,
            params.dimension,
            params.distribution,
            params.index_name,
            params.field_name,
            params.id_offset
        );

        let mut bulk = BulkWriter::new(writer, params.index_name.as_str(), params.field_name.as_str());
        let mut written = 0usize;
        let mut resampled = 0usize;

        while written < params.count {
            let rows = params.chunk_size.min(params.count - written);
            let mut batch = sample_batch(params.distribution, rng, rows, params.dimension)?;

            for (row_idx, mut row) in batch.rows_mut().into_iter().enumerate() {
                // Fits: validate() checked id_offset + count - 1
                let id = params.id_offset + (written + row_idx) as u64;
                resampled += self.normalize_row(rng, row.view_mut(), id)?;
                bulk.write_record(id, row.view())?;
            }

            written += rows;
            debug!("Chunk written: {}/{} documents", written, params.count);
            on_chunk(written);
        }

        let lines = bulk.lines();
        let bytes = bulk.bytes_written();
        bulk.into_inner()?;

        let summary = GenerationSummary {
            documents: written,
            dimension: params.dimension,
            lines,
            bytes,
            first_id: params.id_offset,
            last_id: params.last_id()?,
            resampled,
            distribution: params.distribution,
            generated_at,
            elapsed_ms: started.elapsed().as_millis() as u64,
        };

        info!(
            "Generated {} documents ({} lines, {} bytes) in {}ms",
            summary.documents, summary.lines, summary.bytes, summary.elapsed_ms
        );
        Ok(summary)
    }

    /// Generate the payload in memory
    pub fn generate_bytes<R: Rng>(&self, rng: &mut R) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        self.write_to(rng, &mut buf)?;
        Ok(buf)
    }

    /// Write the payload to `path` atomically
    pub fn write_file<R: Rng>(&self, rng: &mut R, path: &Path) -> Result<GenerationSummary> {
        self.write_file_with_progress(rng, path, |_| {})
    }

    /// Write the payload to `path` atomically, reporting progress per chunk
    ///
    /// On failure `path` is left untouched.
    pub fn write_file_with_progress<R, F>(
        &self,
        rng: &mut R,
        path: &Path,
        on_chunk: F,
    ) -> Result<GenerationSummary>
    where
        R: Rng,
        F: FnMut(usize),
    {
        let summary = write_atomic(path, |w| self.write_to_with_progress(rng, w, on_chunk))?;
        info!("Bulk data written to {}", path.display());
        Ok(summary)
    }

    /// Normalize one row, redrawing it under the resample policy.
    /// Returns the number of redraws.
    fn normalize_row<R: Rng>(&self, rng: &mut R, mut row: ArrayViewMut1<f64>, id: u64) -> Result<usize> {
        let mut attempts = 0;
        loop {
            match normalize_in_place(row.view_mut()) {
                Ok(()) => return Ok(attempts),
                Err(VecBulkError::DivideByZero(_))
                    if self.params.on_degenerate == DegeneratePolicy::Resample
                        && attempts < MAX_RESAMPLE_ATTEMPTS =>
                {
                    attempts += 1;
                    warn!(
                        "Document {} has a zero-norm vector, resampling ({}/{})",
                        id, attempts, MAX_RESAMPLE_ATTEMPTS
                    );
                    row.assign(&sample_vector(self.params.distribution, rng, self.params.dimension));
                }
                Err(VecBulkError::DivideByZero(_)) => {
                    return Err(VecBulkError::divide_by_zero(format!(
                        "document {} has a zero-norm vector (policy={}, redraws={})",
                        id, self.params.on_degenerate, attempts
                    )));
                }
                Err(e) => return Err(e),
            }
        }
    }
}

/// Generate a complete bulk payload in memory
///
/// Identifiers run from `id_offset` upward; the same seeded `rng` always
/// yields the same bytes.
pub fn generate<R: Rng>(
    count: usize,
    dimension: usize,
    index_name: &str,
    field_name: &str,
    distribution: Distribution,
    id_offset: u64,
    rng: &mut R,
) -> Result<Vec<u8>> {
    let params = GeneratorParams::new(count, dimension, index_name, field_name)
        .with_distribution(distribution)
        .with_id_offset(id_offset);

    VectorBulkGenerator::new(params)?.generate_bytes(rng)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sampler::rng_from_seed;
    use rand::rngs::mock::StepRng;
    use serde_json::Value;

    fn lines(payload: &[u8]) -> Vec<String> {
        String::from_utf8(payload.to_vec())
            .unwrap()
            .lines()
            .map(str::to_string)
            .collect()
    }

    fn norm(values: &[Value]) -> f64 {
        values
            .iter()
            .map(|v| v.as_f64().unwrap().powi(2))
            .sum::<f64>()
            .sqrt()
    }

    #[test]
    fn test_small_scenario() {
        let mut rng = rng_from_seed(Some(11));
        let payload = generate(3, 2, "idx", "vec", Distribution::Uniform, 1, &mut rng).unwrap();

        assert!(payload.ends_with(b"\n"));
        let lines = lines(&payload);
        assert_eq!(lines.len(), 6);
        assert_eq!(lines[0], r#"{"index":{"_index":"idx","_id":"1"}}"#);

        let doc: Value = serde_json::from_str(&lines[1]).unwrap();
        let vec = doc["vec"].as_array().unwrap();
        assert_eq!(vec.len(), 2);
        assert!((norm(vec) - 1.0).abs() < 1e-6);

        let action: Value = serde_json::from_str(&lines[2]).unwrap();
        assert_eq!(action["index"]["_id"], "2");
        let action: Value = serde_json::from_str(&lines[4]).unwrap();
        assert_eq!(action["index"]["_id"], "3");
    }

    #[test]
    fn test_zero_count_is_invalid() {
        let mut rng = rng_from_seed(Some(1));
        let result = generate(0, 15, "idx", "vec", Distribution::Uniform, 0, &mut rng);
        assert!(matches!(result, Err(VecBulkError::InvalidArgument(_))));

        let result = generate(10, 0, "idx", "vec", Distribution::Uniform, 0, &mut rng);
        assert!(matches!(result, Err(VecBulkError::InvalidArgument(_))));
    }

    #[test]
    fn test_all_vectors_unit_norm() {
        for distribution in [Distribution::Uniform, Distribution::Normal] {
            let mut rng = rng_from_seed(Some(5));
            let payload = generate(200, 15, "my-knn-index", "location", distribution, 0, &mut rng).unwrap();

            for (i, line) in lines(&payload).iter().enumerate().skip(1).step_by(2) {
                let doc: Value = serde_json::from_str(line).unwrap();
                let vec = doc["location"].as_array().unwrap();
                assert_eq!(vec.len(), 15);
                assert!((norm(vec) - 1.0).abs() < 1e-6, "line {} is not unit length", i + 1);
            }
        }
    }

    #[test]
    fn test_line_structure_and_ids() {
        let mut rng = rng_from_seed(Some(9));
        let payload = generate(50, 4, "test-index", "embedding", Distribution::Normal, 0, &mut rng).unwrap();
        let lines = lines(&payload);
        assert_eq!(lines.len(), 100);

        for (k, pair) in lines.chunks(2).enumerate() {
            let action: Value = serde_json::from_str(&pair[0]).unwrap();
            assert_eq!(action["index"]["_index"], "test-index");
            assert_eq!(action["index"]["_id"], k.to_string());

            let doc: Value = serde_json::from_str(&pair[1]).unwrap();
            let obj = doc.as_object().unwrap();
            assert_eq!(obj.len(), 1);
            assert_eq!(obj["embedding"].as_array().unwrap().len(), 4);
        }
    }

    #[test]
    fn test_reencoding_preserves_shape() {
        let mut rng = rng_from_seed(Some(21));
        let payload = generate(10, 3, "idx", "vec", Distribution::Uniform, 0, &mut rng).unwrap();

        let decoded: Vec<Value> = lines(&payload)
            .iter()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        let reencoded: Vec<String> = decoded.iter().map(|v| serde_json::to_string(v).unwrap()).collect();
        let redecoded: Vec<Value> = reencoded.iter().map(|l| serde_json::from_str(l).unwrap()).collect();

        assert_eq!(redecoded.len(), 20);
        assert_eq!(decoded, redecoded);
    }

    #[test]
    fn test_same_seed_same_bytes_regardless_of_chunk_size() {
        let base = GeneratorParams::new(37, 6, "idx", "vec").with_distribution(Distribution::Normal);

        let one_chunk = VectorBulkGenerator::new(base.clone().with_chunk_size(1024))
            .unwrap()
            .generate_bytes(&mut rng_from_seed(Some(99)))
            .unwrap();
        let small_chunks = VectorBulkGenerator::new(base.with_chunk_size(5))
            .unwrap()
            .generate_bytes(&mut rng_from_seed(Some(99)))
            .unwrap();

        assert_eq!(one_chunk, small_chunks);
    }

    #[test]
    fn test_progress_reports_each_chunk() {
        let params = GeneratorParams::new(10, 3, "idx", "vec").with_chunk_size(4);
        let generator = VectorBulkGenerator::new(params).unwrap();

        let mut seen = Vec::new();
        let summary = generator
            .write_to_with_progress(&mut rng_from_seed(Some(1)), std::io::sink(), |n| seen.push(n))
            .unwrap();

        assert_eq!(seen, vec![4, 8, 10]);
        assert_eq!(summary.documents, 10);
        assert_eq!(summary.lines, 20);
        assert_eq!(summary.first_id, 0);
        assert_eq!(summary.last_id, 9);
    }

    #[test]
    fn test_summary_bytes_match_payload() {
        let generator = VectorBulkGenerator::new(GeneratorParams::new(8, 5, "idx", "vec")).unwrap();
        let mut buf = Vec::new();
        let summary = generator.write_to(&mut rng_from_seed(Some(4)), &mut buf).unwrap();

        assert_eq!(summary.bytes, buf.len() as u64);
        assert_eq!(summary.resampled, 0);
    }

    #[test]
    fn test_zero_norm_aborts() {
        // Every uniform draw from this source is exactly 0.0
        let mut rng = StepRng::new(0, 0);
        let result = generate(2, 3, "idx", "vec", Distribution::Uniform, 0, &mut rng);

        assert!(matches!(result, Err(VecBulkError::DivideByZero(_))));
    }

    #[test]
    fn test_zero_norm_resample() {
        // First draw is 0.0, the next is 2^-53
        let mut rng = StepRng::new(0, 1 << 11);
        let params = GeneratorParams::new(1, 1, "idx", "vec")
            .with_degenerate_policy(DegeneratePolicy::Resample);
        let generator = VectorBulkGenerator::new(params).unwrap();

        let mut buf = Vec::new();
        let summary = generator.write_to(&mut rng, &mut buf).unwrap();

        assert_eq!(summary.resampled, 1);
        let lines = lines(&buf);
        assert_eq!(lines[1], r#"{"vec":[1.0]}"#);
    }

    #[test]
    fn test_resample_gives_up() {
        let params = GeneratorParams::new(1, 2, "idx", "vec")
            .with_degenerate_policy(DegeneratePolicy::Resample);
        let generator = VectorBulkGenerator::new(params).unwrap();

        let result = generator.generate_bytes(&mut StepRng::new(0, 0));
        assert!(matches!(result, Err(VecBulkError::DivideByZero(_))));
    }

    #[test]
    fn test_write_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("knn_bulk_data.json");
        let generator = VectorBulkGenerator::new(GeneratorParams::new(25, 15, "my-knn-index", "location")).unwrap();

        let summary = generator.write_file(&mut rng_from_seed(Some(3)), &path).unwrap();

        let content = std::fs::read(&path).unwrap();
        assert_eq!(content.len() as u64, summary.bytes);
        assert_eq!(lines(&content).len(), 50);
    }

    #[test]
    fn test_failed_file_write_leaves_no_output() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bulk.json");
        let generator = VectorBulkGenerator::new(GeneratorParams::new(3, 2, "idx", "vec")).unwrap();

        let result = generator.write_file(&mut StepRng::new(0, 0), &path);

        assert!(matches!(result, Err(VecBulkError::DivideByZero(_))));
        assert!(!path.exists());
    }
}

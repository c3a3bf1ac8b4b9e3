use ndarray::ArrayView1;
use serde::Serialize;
use serde_json::Value;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use tracing::{debug, info};
use vecbulk_common::{Result, VecBulkError};

use crate::normalize::l2_norm;

/// Default tolerance on |norm - 1|
pub const DEFAULT_NORM_TOLERANCE: f64 = 1e-6;

/// Expectations checked against a bulk payload
#[derive(Debug, Clone)]
pub struct VerifyOptions {
    /// Expected `_index` on every action (any when unset)
    pub index_name: Option<String>,

    /// Expected document field
    pub field_name: String,

    /// Expected vector length (taken from the first document when unset)
    pub dimension: Option<usize>,

    /// Expected first identifier (taken from the first action when unset)
    pub id_offset: Option<u64>,

    pub tolerance: f64,
}

impl VerifyOptions {
    pub fn new(field_name: impl Into<String>) -> Self {
        Self {
            index_name: None,
            field_name: field_name.into(),
            dimension: None,
            id_offset: None,
            tolerance: DEFAULT_NORM_TOLERANCE,
        }
    }
}

/// What a verified payload contains
#[derive(Debug, Clone, Serialize)]
pub struct VerifyReport {
    pub documents: usize,
    pub dimension: usize,
    pub first_id: u64,
    pub last_id: u64,

    /// Largest |norm - 1| seen
    pub max_norm_deviation: f64,
}

/// Verify the bulk file at `path`
pub fn verify_file(path: &Path, options: &VerifyOptions) -> Result<VerifyReport> {
    let file = File::open(path)?;
    let report = verify_bulk(BufReader::new(file), options)?;
    info!("{} verified: {} documents, dim={}", path.display(), report.documents, report.dimension);
    Ok(report)
}

/// Check that a payload is well-formed bulk NDJSON of unit vectors
///
/// Lines must alternate action/document, every line must end with `\n`,
/// identifiers must be consecutive and every vector must have the same
/// length and unit norm.
pub fn verify_bulk<R: BufRead>(mut reader: R, options: &VerifyOptions) -> Result<VerifyReport> {
    let mut state = Verifier::new(options);
    let mut line = String::new();
    let mut line_no = 0usize;

    loop {
        line.clear();
        if reader.read_line(&mut line)? == 0 {
            break;
        }
        line_no += 1;

        let Some(content) = line.strip_suffix('\n') else {
            return Err(fail(line_no, "missing trailing newline"));
        };

        if line_no % 2 == 1 {
            state.check_action(line_no, content)?;
        } else {
            state.check_document(line_no, content)?;
        }
    }

    state.finish(line_no)
}

struct Verifier<'a> {
    options: &'a VerifyOptions,
    documents: usize,
    dimension: Option<usize>,
    first_id: Option<u64>,
    last_id: Option<u64>,
    max_norm_deviation: f64,
}

impl<'a> Verifier<'a> {
    fn new(options: &'a VerifyOptions) -> Self {
        Self {
            options,
            documents: 0,
            dimension: options.dimension,
            first_id: None,
            last_id: None,
            max_norm_deviation: 0.0,
        }
    }

    fn check_action(&mut self, line_no: usize, content: &str) -> Result<()> {
        let value: Value = serde_json::from_str(content)
            .map_err(|e| fail(line_no, format!("invalid JSON: {}", e)))?;

        let target = value
            .get("index")
            .and_then(Value::as_object)
            .ok_or_else(|| fail(line_no, "action line has no \"index\" object"))?;

        let index = target
            .get("_index")
            .and_then(Value::as_str)
            .ok_or_else(|| fail(line_no, "action line has no \"_index\""))?;

        if let Some(expected) = &self.options.index_name {
            if index != expected {
                return Err(fail(line_no, format!("expected _index \"{}\", found \"{}\"", expected, index)));
            }
        }

        let id = target
            .get("_id")
            .and_then(Value::as_str)
            .ok_or_else(|| fail(line_no, "action line has no string \"_id\""))?;
        let id: u64 = id
            .parse()
            .map_err(|_| fail(line_no, format!("_id \"{}\" is not a sequential integer", id)))?;

        let expected_id = match self.last_id {
            Some(prev) => Some(
                prev.checked_add(1)
                    .ok_or_else(|| fail(line_no, format!("_id \"{}\" follows the largest identifier", id)))?,
            ),
            None => self.options.id_offset,
        };
        if let Some(expected_id) = expected_id {
            if id != expected_id {
                return Err(fail(line_no, format!("expected _id \"{}\", found \"{}\"", expected_id, id)));
            }
        }

        self.first_id.get_or_insert(id);
        self.last_id = Some(id);
        Ok(())
    }

    fn check_document(&mut self, line_no: usize, content: &str) -> Result<()> {
        let value: Value = serde_json::from_str(content)
            .map_err(|e| fail(line_no, format!("invalid JSON: {}", e)))?;

        let object = value
            .as_object()
            .ok_or_else(|| fail(line_no, "document line is not an object"))?;
        if object.len() != 1 {
            return Err(fail(line_no, format!("document has {} fields, expected 1", object.len())));
        }

        let field = &self.options.field_name;
        let items = object
            .get(field)
            .and_then(Value::as_array)
            .ok_or_else(|| fail(line_no, format!("document has no \"{}\" array", field)))?;

        let components = items
            .iter()
            .map(Value::as_f64)
            .collect::<Option<Vec<f64>>>()
            .ok_or_else(|| fail(line_no, "vector holds a non-numeric value"))?;

        let dimension = *self.dimension.get_or_insert(components.len());
        if components.len() != dimension {
            return Err(fail(
                line_no,
                format!("vector has {} components, expected {}", components.len(), dimension),
            ));
        }

        let deviation = (l2_norm(ArrayView1::from(&components[..])) - 1.0).abs();
        if !(deviation <= self.options.tolerance) {
            return Err(fail(
                line_no,
                format!("vector norm is off by {:e} (tolerance {:e})", deviation, self.options.tolerance),
            ));
        }

        self.max_norm_deviation = self.max_norm_deviation.max(deviation);
        self.documents += 1;
        Ok(())
    }

    fn finish(self, lines: usize) -> Result<VerifyReport> {
        if lines % 2 == 1 {
            return Err(fail(lines, "action line without a document"));
        }

        let (Some(first_id), Some(last_id), Some(dimension)) = (self.first_id, self.last_id, self.dimension) else {
            return Err(VecBulkError::verification("payload is empty"));
        };

        debug!("Verified {} lines", lines);
        Ok(VerifyReport {
            documents: self.documents,
            dimension,
            first_id,
            last_id,
            max_norm_deviation: self.max_norm_deviation,
        })
    }
}

fn fail(line_no: usize, msg: impl std::fmt::Display) -> VecBulkError {
    VecBulkError::verification(format!("line {}: {}", line_no, msg))
}

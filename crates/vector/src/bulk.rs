use ndarray::ArrayView1;
use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;
use std::io::Write;
use vecbulk_common::{Result, VecBulkError};

/// Bulk action line: `{"index":{"_index":...,"_id":...}}`
#[derive(Debug, Serialize)]
pub struct ActionLine<'a> {
    pub index: IndexTarget<'a>,
}

/// Target of an index action
#[derive(Debug, Serialize)]
pub struct IndexTarget<'a> {
    #[serde(rename = "_index")]
    pub index: &'a str,

    #[serde(rename = "_id")]
    pub id: &'a str,
}

/// Document line: `{<field>:[...]}`
#[derive(Debug)]
pub struct DocumentLine<'f, 'v> {
    pub field: &'f str,
    pub vector: ArrayView1<'v, f64>,
}

impl Serialize for DocumentLine<'_, '_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(1))?;
        map.serialize_entry(self.field, &Components(self.vector))?;
        map.end()
    }
}

struct Components<'a>(ArrayView1<'a, f64>);

impl Serialize for Components<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_seq(self.0.iter())
    }
}

/// Counts bytes passed to the inner writer
#[derive(Debug)]
struct CountingWriter<W> {
    inner: W,
    bytes: u64,
}

impl<W: Write> Write for CountingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.bytes += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.inner.flush()
    }
}

/// Streams action/document pairs as NDJSON
///
/// Every line, including the last, ends with `\n`.
#[derive(Debug)]
pub struct BulkWriter<W: Write> {
    out: CountingWriter<W>,
    index_name: String,
    field_name: String,
    lines: usize,
}

impl<W: Write> BulkWriter<W> {
    pub fn new(inner: W, index_name: impl Into<String>, field_name: impl Into<String>) -> Self {
        Self {
            out: CountingWriter { inner, bytes: 0 },
            index_name: index_name.into(),
            field_name: field_name.into(),
            lines: 0,
        }
    }

    /// Write one record (action line + document line)
    pub fn write_record(&mut self, id: u64, vector: ArrayView1<f64>) -> Result<()> {
        if let Some((pos, value)) = vector.iter().enumerate().find(|(_, x)| !x.is_finite()) {
            return Err(VecBulkError::serialization(format!(
                "document {}: component {} is not finite ({})",
                id, pos, value
            )));
        }

        let id = id.to_string();
        let action = ActionLine {
            index: IndexTarget {
                index: &self.index_name,
                id: &id,
            },
        };
        serde_json::to_writer(&mut self.out, &action)?;
        self.out.write_all(b"\n")?;

        let document = DocumentLine {
            field: &self.field_name,
            vector,
        };
        serde_json::to_writer(&mut self.out, &document)?;
        self.out.write_all(b"\n")?;

        self.lines += 2;
        Ok(())
    }

    /// Lines written so far
    pub fn lines(&self) -> usize {
        self.lines
    }

    /// Bytes written so far
    pub fn bytes_written(&self) -> u64 {
        self.out.bytes
    }

    pub fn flush(&mut self) -> Result<()> {
        self.out.flush()?;
        Ok(())
    }

    /// Flush and return the inner writer
    pub fn into_inner(mut self) -> Result<W> {
        self.flush()?;
        Ok(self.out.inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_action_line_format() {
        let action = ActionLine {
            index: IndexTarget {
                index: "my-knn-index",
                id: "0",
            },
        };
        assert_eq!(
            serde_json::to_string(&action).unwrap(),
            r#"{"index":{"_index":"my-knn-index","_id":"0"}}"#
        );
    }

    #[test]
    fn test_document_line_format() {
        let v = array![0.6, 0.8];
        let doc = DocumentLine {
            field: "location",
            vector: v.view(),
        };
        assert_eq!(serde_json::to_string(&doc).unwrap(), r#"{"location":[0.6,0.8]}"#);
    }

    #[test]
    fn test_write_record() {
        let mut writer = BulkWriter::new(Vec::new(), "idx", "vec");
        writer.write_record(1, array![0.6, 0.8].view()).unwrap();
        writer.write_record(2, array![1.0, 0.0].view()).unwrap();

        assert_eq!(writer.lines(), 4);
        let bytes = writer.bytes_written();
        let out = String::from_utf8(writer.into_inner().unwrap()).unwrap();

        assert_eq!(
            out,
            concat!(
                "{\"index\":{\"_index\":\"idx\",\"_id\":\"1\"}}\n",
                "{\"vec\":[0.6,0.8]}\n",
                "{\"index\":{\"_index\":\"idx\",\"_id\":\"2\"}}\n",
                "{\"vec\":[1.0,0.0]}\n",
            )
        );
        assert_eq!(bytes, out.len() as u64);
    }

    #[test]
    fn test_write_record_from_row_views() {
        let rows = array![[0.6, 0.8], [0.0, 1.0]];
        let mut writer = BulkWriter::new(Vec::new(), String::from("idx"), String::from("vec"));

        for (i, row) in rows.rows().into_iter().enumerate() {
            writer.write_record(i as u64, row).unwrap();
        }

        let out = String::from_utf8(writer.into_inner().unwrap()).unwrap();
        assert_eq!(out.lines().nth(3), Some(r#"{"vec":[0.0,1.0]}"#));
        assert_eq!(rows.nrows(), 2);
    }

    #[test]
    fn test_field_name_is_escaped() {
        let mut writer = BulkWriter::new(Vec::new(), "idx", "my \"vec\"");
        writer.write_record(0, array![1.0].view()).unwrap();

        let out = String::from_utf8(writer.into_inner().unwrap()).unwrap();
        let doc: serde_json::Value = serde_json::from_str(out.lines().nth(1).unwrap()).unwrap();
        assert!(doc.get("my \"vec\"").is_some());
    }

    #[test]
    fn test_non_finite_component_rejected() {
        let mut writer = BulkWriter::new(Vec::new(), "idx", "vec");

        let err = writer.write_record(5, array![0.5, f64::NAN].view()).unwrap_err();
        assert!(matches!(err, VecBulkError::Serialization(_)));

        let err = writer.write_record(6, array![f64::INFINITY, 0.0].view()).unwrap_err();
        assert!(matches!(err, VecBulkError::Serialization(_)));

        // Nothing reaches the output for rejected records
        assert_eq!(writer.lines(), 0);
        assert!(writer.into_inner().unwrap().is_empty());
    }
}

use std::io::Write;
use std::path::Path;
use tracing::info;
use vecbulk_common::Result;

use crate::output::write_atomic;

/// Default search engine endpoint
pub const DEFAULT_ENDPOINT: &str = "http://localhost:9200";

/// Content type expected by the bulk API
pub const NDJSON_CONTENT_TYPE: &str = "application/x-ndjson";

/// Shell script that POSTs a bulk file with curl
///
/// The script is only written, never executed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadScript {
    /// Data file as referenced from the script (`@<data_file>`)
    pub data_file: String,

    /// Base URL; `/_bulk` is appended
    pub endpoint: String,
}

impl UploadScript {
    pub fn new(data_file: &Path, endpoint: &str) -> Self {
        Self {
            data_file: data_file.to_string_lossy().into_owned(),
            endpoint: endpoint.trim_end_matches('/').to_string(),
        }
    }

    /// Bulk API URL
    pub fn bulk_url(&self) -> String {
        format!("{}/_bulk", self.endpoint)
    }

    /// Script text
    ///
    /// The URL and data file are single-quoted, so the shell expands nothing in them.
    pub fn render(&self) -> String {
        format!(
            "#!/bin/bash\ncurl -H \"Content-Type: {}\" -X POST {} --data-binary {}\n",
            NDJSON_CONTENT_TYPE,
            shell_quote(&self.bulk_url()),
            shell_quote(&format!("@{}", self.data_file))
        )
    }

    /// Write the script to `path` (mode 0755 on Unix)
    pub fn write(&self, path: &Path) -> Result<()> {
        let script = self.render();
        write_atomic(path, |w| {
            w.write_all(script.as_bytes())?;
            Ok(())
        })?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755))?;
        }

        info!("Upload script written to {}", path.display());
        Ok(())
    }
}

/// Single-quote a word for bash (`'` becomes `'\''`)
fn shell_quote(word: &str) -> String {
    format!("'{}'", word.replace('\'', "'\\''"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render() {
        let script = UploadScript::new(Path::new("knn_bulk_data.json"), DEFAULT_ENDPOINT);
        assert_eq!(
            script.render(),
            "#!/bin/bash\ncurl -H \"Content-Type: application/x-ndjson\" -X POST 'http://localhost:9200/_bulk' --data-binary '@knn_bulk_data.json'\n"
        );
    }

    #[test]
    fn test_data_file_is_not_expanded() {
        let script = UploadScript::new(Path::new("out $(touch pwned) \"x\".json"), DEFAULT_ENDPOINT);
        let rendered = script.render();

        assert!(rendered.ends_with(" --data-binary '@out $(touch pwned) \"x\".json'\n"));
    }

    #[test]
    fn test_single_quote_in_data_file() {
        let script = UploadScript::new(Path::new("it's.json"), DEFAULT_ENDPOINT);
        assert!(script.render().ends_with(" --data-binary '@it'\\''s.json'\n"));
    }

    #[test]
    fn test_endpoint_trailing_slash() {
        let script = UploadScript::new(Path::new("bulk_vectors.json"), "http://search:9200/");
        assert_eq!(script.bulk_url(), "http://search:9200/_bulk");
    }

    #[test]
    fn test_write() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("knn_bulk_upload.sh");
        let script = UploadScript::new(Path::new("test_bulk_data.json"), DEFAULT_ENDPOINT);

        script.write(&path).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.starts_with("#!/bin/bash\n"));
        assert!(content.contains("@test_bulk_data.json"));

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = std::fs::metadata(&path).unwrap().permissions().mode();
            assert_eq!(mode & 0o777, 0o755);
        }
    }
}

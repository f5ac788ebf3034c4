//! Script loading for worker programs and `importScripts()`
//!
//! Supported sources:
//! - `blob:` URLs from the host [`BlobStore`]
//! - `file:` URLs and plain paths (plain paths resolve against `base_path`)
//! - `http:` / `https:` URLs, fetched with a blocking client on the worker thread

use std::path::{Path, PathBuf};
use std::sync::Arc;
use url::Url;

use super::blob::{BLOB_SCHEME, BlobStore};
use super::{RuntimeError, RuntimeResult};

/// Loads script text by URL. Cheap to clone and safe to move into worker threads.
#[derive(Debug, Clone)]
pub struct ScriptLoader {
    blobs: Arc<BlobStore>,
    base_path: PathBuf,
}

impl ScriptLoader {
    pub fn new(blobs: Arc<BlobStore>, base_path: impl AsRef<Path>) -> Self {
        Self {
            blobs,
            base_path: base_path.as_ref().to_path_buf(),
        }
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    pub fn blobs(&self) -> &Arc<BlobStore> {
        &self.blobs
    }

    /// Load the script behind `specifier`
    pub fn load(&self, specifier: &str) -> RuntimeResult<String> {
        if specifier.starts_with(BLOB_SCHEME) {
            return self
                .blobs
                .get(specifier)
                .map(|blob| blob.content)
                .ok_or_else(|| RuntimeError::ScriptNotFound(specifier.to_string()));
        }

        match Url::parse(specifier) {
            Ok(url) => match url.scheme() {
                "file" => {
                    let path = url
                        .to_file_path()
                        .map_err(|_| RuntimeError::ScriptNotFound(specifier.to_string()))?;
                    self.read_file(&path, specifier)
                }
                "http" | "https" => fetch(specifier),
                scheme => Err(RuntimeError::Fetch {
                    url: specifier.to_string(),
                    message: format!("unsupported scheme '{}'", scheme),
                }),
            },
            // Not a URL: a path on the local filesystem
            Err(_) => {
                let path = self.base_path.join(specifier);
                self.read_file(&path, specifier)
            }
        }
    }

    fn read_file(&self, path: &Path, specifier: &str) -> RuntimeResult<String> {
        if !path.is_file() {
            return Err(RuntimeError::ScriptNotFound(specifier.to_string()));
        }
        Ok(std::fs::read_to_string(path)?)
    }
}

fn fetch(url: &str) -> RuntimeResult<String> {
    let fetch_error = |e: reqwest::Error| RuntimeError::Fetch {
        url: url.to_string(),
        message: e.to_string(),
    };

    tracing::debug!(url = %url, "fetching script");
    reqwest::blocking::get(url)
        .and_then(|response| response.error_for_status())
        .and_then(|response| response.text())
        .map_err(fetch_error)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn loader(base: &Path) -> ScriptLoader {
        ScriptLoader::new(Arc::new(BlobStore::new()), base)
    }

    #[test]
    fn test_load_blob() {
        let loader = loader(Path::new("."));
        let url = loader
            .blobs()
            .create_object_url("var a = 1;".to_string(), "application/javascript");
        assert_eq!(loader.load(&url).unwrap(), "var a = 1;");

        loader.blobs().revoke_object_url(&url);
        assert!(matches!(
            loader.load(&url),
            Err(RuntimeError::ScriptNotFound(_))
        ));
    }

    #[test]
    fn test_load_file_url_and_relative_path() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("dep.js");
        fs::write(&file, "function dep() { return 1; }").unwrap();

        let loader = loader(dir.path());
        let url = Url::from_file_path(&file).unwrap();
        assert_eq!(
            loader.load(url.as_str()).unwrap(),
            "function dep() { return 1; }"
        );
        assert_eq!(
            loader.load("dep.js").unwrap(),
            "function dep() { return 1; }"
        );
    }

    #[test]
    fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let loader = loader(dir.path());
        assert!(matches!(
            loader.load("missing.js"),
            Err(RuntimeError::ScriptNotFound(_))
        ));
    }

    #[test]
    fn test_unsupported_scheme() {
        let loader = loader(Path::new("."));
        assert!(matches!(
            loader.load("ftp://example.com/x.js"),
            Err(RuntimeError::Fetch { .. })
        ));
    }
}

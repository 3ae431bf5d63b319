use anyhow::Context;
use async_trait::async_trait;

use super::{KeyMap, Loader};

/// Key store backed by a local JSON file of `identity -> secret(s)`.
/// Reloads are signal-driven only; a lookup miss does not re-read the file.
pub struct FileLoader {
    path: String,
}

impl FileLoader {
    pub fn new(path: &str) -> Self {
        FileLoader {
            path: path.to_string(),
        }
    }
}

#[async_trait]
impl Loader for FileLoader {
    async fn load(&self) -> anyhow::Result<KeyMap> {
        let content = tokio::fs::read(&self.path)
            .await
            .with_context(|| format!("reading key file {}", self.path))?;

        serde_json::from_slice(&content).with_context(|| format!("parsing key file {}", self.path))
    }

    fn path(&self) -> &str {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[tokio::test]
    async fn test_loads_single_and_rotating_secrets() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"{{"plain": "secret", "rotating": ["old", "new"]}}"#
        )
        .unwrap();

        let loader = FileLoader::new(file.path().to_str().unwrap());
        let keys = loader.load().await.unwrap();

        assert_eq!(keys["plain"].candidates(), ["secret"]);
        assert_eq!(keys["rotating"].candidates(), ["old", "new"]);
    }

    #[tokio::test]
    async fn test_missing_file_is_an_error() {
        let loader = FileLoader::new("/nonexistent/keys.json");
        assert!(loader.load().await.is_err());
    }

    #[tokio::test]
    async fn test_malformed_file_is_an_error() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "{{not json").unwrap();

        let loader = FileLoader::new(file.path().to_str().unwrap());
        assert!(loader.load().await.is_err());
    }
}

use std::collections::HashMap;
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use reqwest::Client;
use tracing::debug;

use super::{KeyMap, Loader, Secrets};

const FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// Key store backed by a Propsd property endpoint: a flat key-value set
/// shared with other consumers. Only keys under the configured prefix are
/// retained, with the prefix and delimiter stripped to recover identities.
pub struct PropsdLoader {
    path: String,
    prefix: String,
    delimiter: String,
    client: Client,
}

impl PropsdLoader {
    pub fn new(path: &str, prefix: &str, delimiter: &str) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(FETCH_TIMEOUT)
            .build()
            .context("creating HTTP client")?;

        Ok(PropsdLoader {
            path: path.to_string(),
            prefix: prefix.to_string(),
            delimiter: delimiter.to_string(),
            client,
        })
    }

    /// Filter the property set by prefix, then strip the prefix and
    /// delimiter from each retained key. An empty prefix keeps every key
    /// unstripped.
    fn filter(&self, properties: HashMap<String, String>) -> KeyMap {
        properties
            .into_iter()
            .filter(|(key, _)| key.starts_with(&self.prefix))
            .map(|(key, secret)| {
                let identity = if self.prefix.is_empty() {
                    key
                } else {
                    key.replacen(&self.prefix, "", 1)
                        .replacen(&self.delimiter, "", 1)
                };

                (identity, Secrets::Single(secret))
            })
            .collect()
    }
}

#[async_trait]
impl Loader for PropsdLoader {
    async fn load(&self) -> anyhow::Result<KeyMap> {
        debug!(url = %self.path, prefix = %self.prefix, "fetching properties");

        let response = self
            .client
            .get(&self.path)
            .send()
            .await
            .with_context(|| format!("fetching properties from {}", self.path))?
            .error_for_status()
            .with_context(|| format!("fetching properties from {}", self.path))?;

        let properties: HashMap<String, String> = response
            .json()
            .await
            .with_context(|| format!("parsing properties from {}", self.path))?;

        Ok(self.filter(properties))
    }

    fn path(&self) -> &str {
        &self.path
    }

    fn refetch_on_miss(&self) -> bool {
        true
    }
}

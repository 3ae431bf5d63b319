use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use reqwest::Client;
use tracing::debug;

use super::{KeyMap, Loader};

const FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// Key store backed by a remote HTTP endpoint serving the same JSON object
/// a local key file would contain.
pub struct RemoteLoader {
    path: String,
    client: Client,
}

impl RemoteLoader {
    pub fn new(path: &str) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(FETCH_TIMEOUT)
            .build()
            .context("creating HTTP client")?;

        Ok(RemoteLoader {
            path: path.to_string(),
            client,
        })
    }
}

#[async_trait]
impl Loader for RemoteLoader {
    async fn load(&self) -> anyhow::Result<KeyMap> {
        debug!(url = %self.path, "fetching keys");

        let response = self
            .client
            .get(&self.path)
            .send()
            .await
            .with_context(|| format!("fetching keys from {}", self.path))?
            .error_for_status()
            .with_context(|| format!("fetching keys from {}", self.path))?;

        response
            .json()
            .await
            .with_context(|| format!("parsing keys from {}", self.path))
    }

    fn path(&self) -> &str {
        &self.path
    }

    fn refetch_on_miss(&self) -> bool {
        true
    }
}

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use tokio::sync::{broadcast, RwLock};
use tracing::{error, info};
use url::Url;

use crate::config::DbConfig;
use crate::errors::Error;

pub mod file;
pub mod propsd;
pub mod remote;

pub use file::FileLoader;
pub use propsd::PropsdLoader;
pub use remote::RemoteLoader;

/// The in-memory key mapping: identity to candidate secrets.
pub type KeyMap = HashMap<String, Secrets>;

/// One or more secrets for an identity. An array supports key rotation:
/// verification tries each candidate in order.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum Secrets {
    Single(String),
    Rotating(Vec<String>),
}

impl Secrets {
    pub fn candidates(&self) -> &[String] {
        match self {
            Secrets::Single(secret) => std::slice::from_ref(secret),
            Secrets::Rotating(secrets) => secrets,
        }
    }
}

/// Notifications emitted over the store's lifetime. Load failures are
/// reported here instead of surfacing into any request's call path.
#[derive(Debug, Clone)]
pub enum StoreEvent {
    Updated,
    Failed(String),
}

/// Load mechanism for a key store. Implementations fetch the complete key
/// mapping from their backing source; the store handles sharing, reload
/// signaling and lookups.
#[async_trait]
pub trait Loader: Send + Sync {
    async fn load(&self) -> anyhow::Result<KeyMap>;

    fn path(&self) -> &str;

    /// Whether a lookup miss should trigger one synchronous re-fetch before
    /// the identity is declared unknown. Remote sources use this to tolerate
    /// eventual-consistency windows after key provisioning.
    fn refetch_on_miss(&self) -> bool {
        false
    }
}

/// A long-lived, shared key database. The mapping is replaced wholesale on
/// every successful load; readers always observe either the pre-reload or
/// the post-reload mapping, never a partial one.
#[derive(Clone)]
pub struct KeyStore {
    keys: Arc<RwLock<KeyMap>>,
    loader: Arc<dyn Loader>,
    events: broadcast::Sender<StoreEvent>,
}

impl KeyStore {
    pub fn new(loader: Arc<dyn Loader>) -> Self {
        let (events, _) = broadcast::channel(16);

        KeyStore {
            keys: Arc::new(RwLock::new(KeyMap::new())),
            loader,
            events,
        }
    }

    /// Build a store from configuration, trigger the initial asynchronous
    /// load and start listening for the configured reload signal.
    pub fn spawn(config: &DbConfig) -> anyhow::Result<Self> {
        let store = KeyStore::new(loader_for(config)?);

        info!("Using key database: {}", store.path());

        let initial = store.clone();
        tokio::spawn(async move { initial.reload().await });

        #[cfg(unix)]
        spawn_signal_listener(store.clone(), &config.signal)?;

        Ok(store)
    }

    pub fn path(&self) -> &str {
        self.loader.path()
    }

    /// Subscribe to update/error notifications.
    pub fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.events.subscribe()
    }

    /// Replace the in-memory mapping from the backing source. A failed load
    /// keeps the last-known-good mapping and reports through the event
    /// channel; it never propagates an error to the caller.
    pub async fn reload(&self) {
        match self.loader.load().await {
            Ok(keys) => {
                let count = keys.len();
                {
                    let mut guard = self.keys.write().await;
                    *guard = keys;
                }

                info!(path = %self.loader.path(), keys = count, "key database loaded");
                let _ = self.events.send(StoreEvent::Updated);
            }
            Err(err) => {
                error!(path = %self.loader.path(), error = %format!("{err:#}"), "key database load failed");
                let _ = self.events.send(StoreEvent::Failed(format!("{err:#}")));
            }
        }
    }

    /// Look up an identity's candidate secrets. On a miss, sources that
    /// support it get one synchronous re-fetch before the identity is
    /// declared unknown.
    pub async fn lookup(&self, identity: &str) -> Result<Secrets, Error> {
        if let Some(secrets) = self.keys.read().await.get(identity) {
            return Ok(secrets.clone());
        }

        if self.loader.refetch_on_miss() {
            // Run the fetch on its own task so it completes and caches even
            // if the requesting connection goes away mid-flight.
            let store = self.clone();
            let _ = tokio::spawn(async move { store.reload().await }).await;

            if let Some(secrets) = self.keys.read().await.get(identity) {
                return Ok(secrets.clone());
            }
        }

        Err(Error::authorization("Invalid authentication factors"))
    }
}

/// Pick a load mechanism from the configured path: the `propsd` flag selects
/// the namespace-filtered store, an absolute `http(s)` URL the remote store,
/// anything else a local file.
fn loader_for(config: &DbConfig) -> anyhow::Result<Arc<dyn Loader>> {
    if config.propsd {
        return Ok(Arc::new(PropsdLoader::new(
            &config.path,
            &config.prefix,
            &config.delimiter,
        )?));
    }

    if let Ok(url) = Url::parse(&config.path) {
        if url.has_host() && matches!(url.scheme(), "http" | "https") {
            return Ok(Arc::new(RemoteLoader::new(&config.path)?));
        }
    }

    Ok(Arc::new(FileLoader::new(&config.path)))
}

#[cfg(unix)]
fn spawn_signal_listener(store: KeyStore, name: &str) -> anyhow::Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let kind = match name.to_ascii_uppercase().as_str() {
        "SIGHUP" | "HUP" => SignalKind::hangup(),
        "SIGUSR1" | "USR1" => SignalKind::user_defined1(),
        "SIGUSR2" | "USR2" => SignalKind::user_defined2(),
        other => anyhow::bail!("unsupported reload signal {other}"),
    };

    let mut stream = signal(kind)?;
    let signal_name = name.to_ascii_uppercase();

    tokio::spawn(async move {
        while stream.recv().await.is_some() {
            info!(signal = %signal_name, path = %store.path(), "reloading key database on signal");
            store.reload().await;
        }
    });

    Ok(())
}

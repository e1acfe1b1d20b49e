use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

use crate::plugin_system::descriptor::PluginDescriptor;
use crate::plugin_system::error::PluginSystemError;
use crate::plugin_system::manifest::PluginManifest;

/// A plugin surfaced by the external discovery walker: its identity plus
/// the loader handle that can produce its descriptor.
#[derive(Clone)]
pub struct DiscoveredPlugin {
    pub identity: String,
    pub loader: Arc<dyn ContainerLoader>,
}

impl DiscoveredPlugin {
    pub fn new(identity: &str, loader: Arc<dyn ContainerLoader>) -> Self {
        Self {
            identity: identity.to_string(),
            loader,
        }
    }
}

impl fmt::Debug for DiscoveredPlugin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DiscoveredPlugin")
            .field("identity", &self.identity)
            .finish_non_exhaustive()
    }
}

/// Boundary trait for the sandboxed container loader.
///
/// Given an identity it yields the plugin's descriptor: metadata plus the
/// construction and hook callbacks. The core never touches container bytes;
/// containers without usable metadata must be reported as
/// `InvalidDescriptor` and never reach the registry.
#[async_trait]
pub trait ContainerLoader: Send + Sync {
    async fn load_descriptor(&self, identity: &str) -> Result<PluginDescriptor, PluginSystemError>;
}

/// Add/remove signals pushed by the external filesystem watcher. The core
/// treats these as opaque triggers for registry insertion and removal.
#[derive(Debug)]
pub enum WatchEvent {
    Added(DiscoveredPlugin),
    Removed(String),
}

/// Creates the channel pair connecting an external discovery walker to the
/// manager: the walker pushes into the sender, the manager consumes the
/// stream.
pub fn discovery_channel(capacity: usize) -> (mpsc::Sender<DiscoveredPlugin>, ReceiverStream<DiscoveredPlugin>) {
    let (tx, rx) = mpsc::channel(capacity);
    (tx, ReceiverStream::new(rx))
}

/// Reference [`ContainerLoader`] that reads JSON manifests from a
/// directory, mapping an identity to `<root>/<identity>.json`. It binds no
/// hook callbacks; real container loaders supply their own binding.
#[derive(Debug, Clone)]
pub struct ManifestContainerLoader {
    root: PathBuf,
}

impl ManifestContainerLoader {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl ContainerLoader for ManifestContainerLoader {
    async fn load_descriptor(&self, identity: &str) -> Result<PluginDescriptor, PluginSystemError> {
        let path = self.root.join(format!("{}.json", identity));
        let data = std::fs::read_to_string(&path).map_err(|e| {
            PluginSystemError::InvalidDescriptor {
                message: format!("failed to read manifest {}: {}", path.display(), e),
            }
        })?;
        PluginManifest::from_json_str(&data)?.into_descriptor()
    }
}

//! Remote configuration channel.
//!
//! The attested control channel hands configuration documents to this
//! listener. Each document is applied as one batch through
//! [`ConfigHandle::apply_remote`]; a rejected batch leaves the current store
//! in place.

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};

use crate::config::error::ConfigError;
use crate::config::handle::ConfigHandle;

/// One batch received from the remote channel.
#[derive(Debug)]
pub struct RemoteUpdate {
    document: String,
    reply: Option<oneshot::Sender<Result<(), ConfigError>>>,
}

impl RemoteUpdate {
    /// Create an update whose outcome is reported on the returned receiver.
    pub fn new(document: impl Into<String>) -> (Self, oneshot::Receiver<Result<(), ConfigError>>) {
        let (reply, outcome) = oneshot::channel();
        (
            Self {
                document: document.into(),
                reply: Some(reply),
            },
            outcome,
        )
    }

    /// Create an update nobody waits on.
    pub fn detached(document: impl Into<String>) -> Self {
        Self {
            document: document.into(),
            reply: None,
        }
    }
}

/// Consumes remote batches and applies them to a [`ConfigHandle`].
pub struct RemoteConfigListener {
    handle: Arc<ConfigHandle>,
    updates: mpsc::UnboundedReceiver<RemoteUpdate>,
}

impl RemoteConfigListener {
    /// Create a listener.
    ///
    /// Returns the listener and the sender the control channel pushes into.
    pub fn new(handle: Arc<ConfigHandle>) -> (Self, mpsc::UnboundedSender<RemoteUpdate>) {
        let (tx, updates) = mpsc::unbounded_channel();
        (Self { handle, updates }, tx)
    }

    /// Apply batches in arrival order until every sender is dropped.
    pub async fn run(mut self) {
        tracing::info!("Remote configuration listener started");

        while let Some(update) = self.updates.recv().await {
            let outcome = match self.handle.apply_remote(&update.document) {
                Ok(store) => {
                    tracing::info!(
                        explicit = store.explicit_keys().count(),
                        "Remote configuration batch accepted"
                    );
                    Ok(())
                }
                Err(e) => {
                    tracing::error!(
                        "Failed to apply remote configuration: {}. Keeping current configuration.",
                        e
                    );
                    Err(e)
                }
            };

            if let Some(reply) = update.reply {
                let _ = reply.send(outcome);
            }
        }

        tracing::info!("Remote configuration listener stopped");
    }
}

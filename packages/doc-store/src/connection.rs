//! Connection readiness.
//!
//! A connection starts out `Connecting` and settles exactly once, on
//! `Ready` or `Failed`. Operations wait for it to settle instead of failing
//! early.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;

use dotstore_core::Error as StoreError;

use crate::collection::Collection;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionState {
    Connecting,
    Ready,
    Failed(String),
}

impl ConnectionState {
    pub fn is_settled(&self) -> bool {
        !matches!(self, ConnectionState::Connecting)
    }
}

/// Observable readiness of a collection.
#[derive(Debug, Clone)]
pub struct Connection {
    state: watch::Receiver<ConnectionState>,
}

impl Connection {
    /// Ping `collection` in the background.
    ///
    /// Must be called from within a tokio runtime.
    pub fn establish(collection: Arc<dyn Collection>, timeout: Duration) -> Self {
        let (sender, receiver) = watch::channel(ConnectionState::Connecting);

        tokio::spawn(async move {
            let state = match tokio::time::timeout(timeout, collection.ping()).await {
                Ok(Ok(())) => {
                    tracing::info!(collection = collection.name(), "document store ready");
                    ConnectionState::Ready
                }
                Ok(Err(e)) => {
                    tracing::error!(
                        collection = collection.name(),
                        error = %e,
                        "document store connection failed"
                    );
                    ConnectionState::Failed(e.to_string())
                }
                Err(_) => {
                    tracing::error!(
                        collection = collection.name(),
                        ?timeout,
                        "document store connection timed out"
                    );
                    ConnectionState::Failed(format!("no answer within {:?}", timeout))
                }
            };
            let _ = sender.send(state);
        });

        Self { state: receiver }
    }

    /// A connection that is already settled.
    pub fn settled(state: ConnectionState) -> Self {
        let (_, receiver) = watch::channel(state);
        Self { state: receiver }
    }

    pub fn state(&self) -> ConnectionState {
        self.state.borrow().clone()
    }

    /// Wait until the connection settles; fail unless it is ready.
    pub async fn wait_ready(&self) -> Result<(), StoreError> {
        let mut receiver = self.state.clone();
        let settled = receiver
            .wait_for(ConnectionState::is_settled)
            .await
            .map(|state| state.clone());

        match settled {
            Ok(ConnectionState::Ready) => Ok(()),
            Ok(ConnectionState::Failed(message)) => Err(StoreError::Connection { message }),
            Ok(ConnectionState::Connecting) | Err(_) => Err(StoreError::Connection {
                message: "connection attempt was abandoned".to_string(),
            }),
        }
    }
}

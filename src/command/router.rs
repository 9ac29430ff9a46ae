//! Command router - hands inbound server commands to the registered handler

use devlink_shared::{Mode, ServerCommand};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};

/// Application callback for server commands
pub type CommandHandler = Arc<dyn Fn(ServerCommand) + Send + Sync>;

/// Routes commands from whichever transport is active to a single handler
#[derive(Clone, Default)]
pub struct CommandRouter {
    handler: Arc<RwLock<Option<CommandHandler>>>,
    dispatched: Arc<AtomicU64>,
}

impl std::fmt::Debug for CommandRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandRouter")
            .field("dispatched", &self.dispatched.load(Ordering::Relaxed))
            .finish()
    }
}

impl CommandRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the handler, replacing any previous one
    pub async fn register<F>(&self, handler: F)
    where
        F: Fn(ServerCommand) + Send + Sync + 'static,
    {
        *self.handler.write().await = Some(Arc::new(handler));
    }

    /// Number of commands handed to a handler so far
    pub fn dispatched(&self) -> u64 {
        self.dispatched.load(Ordering::Relaxed)
    }

    /// Dispatch a command on its own task so the caller never waits on the
    /// handler. Returns false when no handler is registered.
    pub async fn dispatch(&self, command: ServerCommand, source: Mode) -> bool {
        let handler = self.handler.read().await.clone();

        match handler {
            Some(handler) => {
                info!("[LINK] Server command via {}: {}", source, command.name);
                self.dispatched.fetch_add(1, Ordering::Relaxed);
                tokio::spawn(async move {
                    handler(command);
                });
                true
            }
            None => {
                debug!(
                    "[LINK] Server command via {} dropped, no handler: {}",
                    source, command.name
                );
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    fn command(name: &str) -> ServerCommand {
        ServerCommand {
            name: name.into(),
            data: serde_json::Value::Null,
        }
    }

    #[tokio::test]
    async fn test_dispatch_without_handler() {
        let router = CommandRouter::new();
        assert!(!router.dispatch(command("noop"), Mode::LongPoll).await);
        assert_eq!(router.dispatched(), 0);
    }

    #[tokio::test]
    async fn test_dispatch_reaches_handler() {
        let router = CommandRouter::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        router
            .register(move |cmd| {
                let _ = tx.send(cmd.name);
            })
            .await;

        assert!(router.dispatch(command("sync"), Mode::Socket).await);
        assert_eq!(rx.recv().await.as_deref(), Some("sync"));
        assert_eq!(router.dispatched(), 1);
    }

    #[tokio::test]
    async fn test_register_replaces_handler() {
        let router = CommandRouter::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let first = tx.clone();
        router
            .register(move |_| {
                let _ = first.send("first");
            })
            .await;
        router
            .register(move |_| {
                let _ = tx.send("second");
            })
            .await;

        router.dispatch(command("x"), Mode::PeriodicPing).await;
        assert_eq!(rx.recv().await, Some("second"));
    }
}

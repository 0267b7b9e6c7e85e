//! Remote control channel
//!
//! Operators publish lifecycle commands on the job identity's topic; every
//! subscribed instance receives them. The subscription only queues parsed
//! commands. The job's run loop applies them between crawl steps with
//! [`ControlReceiver::apply_pending`], so lifecycle state is only ever changed
//! from the job's own task.
//!
//! Delivery is best-effort: no acknowledgement, ordering, or redelivery.

use crawlgate_common::Result;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::job::{JobIdentity, JobLifecycle};
use crate::store::SharedStore;

/// Lifecycle command carried on the control topic
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ControlCommand {
    Pause,
    Continue,
    RunAsync,
    Exit,
}

impl ControlCommand {
    /// Parse a message body; anything but an exact command word is ignored
    pub fn parse(body: &str) -> Option<Self> {
        match body {
            "PAUSE" => Some(ControlCommand::Pause),
            "CONTINUE" => Some(ControlCommand::Continue),
            "RUNASYNC" => Some(ControlCommand::RunAsync),
            "EXIT" => Some(ControlCommand::Exit),
            _ => None,
        }
    }

    /// Wire form of the command
    pub fn as_str(&self) -> &'static str {
        match self {
            ControlCommand::Pause => "PAUSE",
            ControlCommand::Continue => "CONTINUE",
            ControlCommand::RunAsync => "RUNASYNC",
            ControlCommand::Exit => "EXIT",
        }
    }

    pub fn apply(&self, job: &dyn JobLifecycle) {
        match self {
            ControlCommand::Pause => job.pause(),
            ControlCommand::Continue => job.resume(),
            ControlCommand::RunAsync => job.run_async(),
            ControlCommand::Exit => job.exit(),
        }
    }
}

impl std::fmt::Display for ControlCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Publish `command` to every instance of `identity`
pub async fn send_command(
    store: &dyn SharedStore,
    identity: &JobIdentity,
    command: ControlCommand,
) -> Result<()> {
    store.publish(identity.as_str(), command.as_str()).await?;
    info!(identity = %identity, command = %command, "Control command published");
    Ok(())
}

pub struct ControlChannel;

impl ControlChannel {
    /// Subscribe to the control topic of `identity`
    ///
    /// Never fails: without a store, or when subscribing fails, the job runs
    /// without remote control and the receiver stays empty.
    pub async fn subscribe(
        store: Option<&Arc<dyn SharedStore>>,
        identity: &JobIdentity,
    ) -> ControlReceiver {
        let Some(store) = store else {
            return ControlReceiver::disconnected();
        };

        let mut messages = match store.subscribe(identity.as_str()).await {
            Ok(messages) => messages,
            Err(e) => {
                warn!(identity = %identity, error = %e, "Register control failed, continuing without remote control");
                return ControlReceiver::disconnected();
            },
        };

        let (tx, rx) = mpsc::unbounded_channel();
        let topic = identity.to_string();
        let forwarder = tokio::spawn(async move {
            while let Some(body) = messages.recv().await {
                match ControlCommand::parse(&body) {
                    Some(command) => {
                        debug!(identity = %topic, command = %command, "Control command received");
                        if tx.send(command).is_err() {
                            break;
                        }
                    },
                    None => debug!(identity = %topic, body = %body, "Ignoring unrecognized control message"),
                }
            }
        });

        info!(identity = %identity, "Control channel subscribed");

        ControlReceiver {
            commands: Some(rx),
            forwarder: Some(forwarder),
        }
    }
}

/// Commands received for the local job, waiting to be applied
pub struct ControlReceiver {
    commands: Option<mpsc::UnboundedReceiver<ControlCommand>>,
    forwarder: Option<JoinHandle<()>>,
}

impl ControlReceiver {
    /// Receiver that never yields a command
    pub fn disconnected() -> Self {
        Self {
            commands: None,
            forwarder: None,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.commands.is_some()
    }

    pub fn try_next(&mut self) -> Option<ControlCommand> {
        self.commands.as_mut()?.try_recv().ok()
    }

    /// Wait for the next command
    ///
    /// Returns `None` once the subscription has ended. A disconnected receiver
    /// never resolves, so it can sit in a `select!` beside the crawl loop.
    pub async fn next(&mut self) -> Option<ControlCommand> {
        match self.commands.as_mut() {
            Some(commands) => commands.recv().await,
            None => std::future::pending().await,
        }
    }

    /// Apply every queued command to `job` in arrival order
    pub fn apply_pending(&mut self, job: &dyn JobLifecycle) -> usize {
        let mut applied = 0;
        while let Some(command) = self.try_next() {
            info!(command = %command, "Applying control command");
            command.apply(job);
            applied += 1;
        }
        applied
    }
}

impl Drop for ControlReceiver {
    fn drop(&mut self) {
        if let Some(forwarder) = self.forwarder.take() {
            forwarder.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_is_exact() {
        assert_eq!(ControlCommand::parse("PAUSE"), Some(ControlCommand::Pause));
        assert_eq!(ControlCommand::parse("CONTINUE"), Some(ControlCommand::Continue));
        assert_eq!(ControlCommand::parse("RUNASYNC"), Some(ControlCommand::RunAsync));
        assert_eq!(ControlCommand::parse("EXIT"), Some(ControlCommand::Exit));
        assert_eq!(ControlCommand::parse("pause"), None);
        assert_eq!(ControlCommand::parse(" EXIT"), None);
        assert_eq!(ControlCommand::parse(""), None);
    }

    #[test]
    fn test_wire_form_parses_back() {
        for command in [
            ControlCommand::Pause,
            ControlCommand::Continue,
            ControlCommand::RunAsync,
            ControlCommand::Exit,
        ] {
            assert_eq!(ControlCommand::parse(command.as_str()), Some(command));
        }
    }

    #[test]
    fn test_disconnected_receiver_is_empty() {
        let mut receiver = ControlReceiver::disconnected();
        assert!(!receiver.is_connected());
        assert_eq!(receiver.try_next(), None);
    }
}

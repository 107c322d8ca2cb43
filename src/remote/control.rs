use async_trait::async_trait;
use url::Url;

use crate::config::Credentials;
use crate::remote::TransportError;

/// Commands understood by a control channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlCommand {
    ChangeDir(String),
    RemoveDir(String),
    Delete(String),
}

impl std::fmt::Display for ControlCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ControlCommand::ChangeDir(path) => write!(f, "change directory to {}", path),
            ControlCommand::RemoveDir(path) => write!(f, "remove directory {}", path),
            ControlCommand::Delete(path) => write!(f, "delete {}", path),
        }
    }
}

#[async_trait]
pub trait ControlConnector: Send + Sync {
    async fn connect(
        &self,
        endpoint: &Url,
        credentials: &Credentials,
    ) -> Result<Box<dyn ControlSession>, TransportError>;
}

/// An open control connection. Callers must call [`disconnect`] exactly
/// once when they are done, whatever the outcome of the commands.
///
/// [`disconnect`]: ControlSession::disconnect
#[async_trait]
pub trait ControlSession: Send {
    async fn send(&mut self, command: &ControlCommand) -> Result<(), TransportError>;

    async fn disconnect(&mut self) -> Result<(), TransportError>;
}

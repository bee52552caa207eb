use std::sync::Arc;

use shared::protocol::{ControlCommand, CTL_PATH};
use tracing::debug;

use crate::{error::ClientError, RemoteFs};

/// Writes one-line commands to the feed service's `ctl` file.
///
/// Nothing is read back: success only means the write completed.
#[derive(Clone)]
pub struct CommandDispatcher {
    fsys: Arc<dyn RemoteFs>,
}

impl CommandDispatcher {
    pub fn new(fsys: Arc<dyn RemoteFs>) -> Self {
        Self { fsys }
    }

    pub async fn send(&self, command: &ControlCommand) -> Result<(), ClientError> {
        let line = command.to_string();
        debug!(command = command.verb(), "writing ctl command");
        self.fsys
            .write_file(CTL_PATH, line.as_bytes())
            .await
            .map_err(|source| ClientError::Command {
                verb: command.verb(),
                source,
            })
    }
}

use std::{process, sync::Arc};

use async_trait::async_trait;
use client_core::{ClientError, RemoteFs, Shutdown};
use tracing::{error, info};

/// Ends the process once the last window closes or a window cannot be made.
pub struct ProcessShutdown {
    fsys: Arc<dyn RemoteFs>,
}

impl ProcessShutdown {
    pub fn new(fsys: Arc<dyn RemoteFs>) -> Self {
        Self { fsys }
    }
}

#[async_trait]
impl Shutdown for ProcessShutdown {
    async fn finish(&self) {
        info!("last window closed; unmounting");
        self.fsys.unmount().await;
        process::exit(0);
    }

    async fn abort(&self, error: &ClientError) {
        error!(error = %error, "exiting");
        process::exit(1);
    }
}

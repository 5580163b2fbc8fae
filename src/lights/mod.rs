use std::time::Duration;

use anyhow::Result;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::sleep;

use crate::color::Color;
use crate::config::LightsConfig;
use crate::error::AmbiError;

pub mod opc;

use opc::OpcBackend;

pub type LightId = u16;

/// Lets queued commands reach the lights before the session goes away
const CLOSE_GRACE: Duration = Duration::from_millis(100);

/// Where fixture colors go.
pub trait LightSink {
    async fn set_color(&mut self, light: LightId, color: Color) -> Result<(), AmbiError>;

    /// Flushes what was sent so far and ends the session.
    async fn close(self);
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct LightCommand {
    pub light: LightId,
    pub color: Color,
}

pub enum Backend {
    Opc(OpcBackend),
    Log,
}

impl Backend {
    pub fn from_config(config: &LightsConfig) -> Backend {
        match config {
            LightsConfig::Opc { address, channel } => Backend::Opc(OpcBackend::new(address, *channel)),
            LightsConfig::Log => Backend::Log,
        }
    }

    async fn write(&mut self, batch: &[LightCommand]) -> Result<()> {
        match self {
            Backend::Opc(opc) => opc.write(batch).await,
            Backend::Log => {
                for command in batch {
                    log::info!("Light {} -> {} {}", command.light, command.color, command.color.swatch());
                }
                Ok(())
            }
        }
    }

    async fn close(&mut self) {
        if let Backend::Opc(opc) = self {
            opc.close().await;
        }
    }
}

/// Handle to the lighting session, which runs on its own task.
pub struct Lights {
    tx: mpsc::Sender<LightCommand>,
    worker: JoinHandle<()>,
}

impl Lights {
    pub fn start(backend: Backend) -> Lights {
        let (tx, rx) = mpsc::channel(50);
        let worker = tokio::spawn(run(backend, rx));

        Lights { tx, worker }
    }
}

impl LightSink for Lights {
    async fn set_color(&mut self, light: LightId, color: Color) -> Result<(), AmbiError> {
        self.tx
            .send(LightCommand { light, color })
            .await
            .map_err(|_| AmbiError::Lights("lights task stopped".into()))
    }

    async fn close(self) {
        log::info!("Stopping lights in {}ms", CLOSE_GRACE.as_millis());
        sleep(CLOSE_GRACE).await;

        let Lights { tx, worker } = self;
        drop(tx);

        if let Err(e) = worker.await {
            log::error!("Lights task failed: {}", e);
        }
    }
}

async fn run(mut backend: Backend, mut rx: mpsc::Receiver<LightCommand>) {
    log::info!("Starting Lights");

    let mut batch = Vec::new();

    while let Some(command) = rx.recv().await {
        batch.push(command);
        // Everything already queued goes out in the same frame
        while let Ok(command) = rx.try_recv() {
            batch.push(command);
        }

        log::trace!("Received colors {:?}", batch);

        match backend.write(&batch).await {
            Ok(()) => log::trace!("Sucessfully set colors"),
            Err(e) => log::error!("Failed to set colors: {:#}", e),
        }

        batch.clear();
    }

    backend.close().await;

    log::info!("Lights stopping");
}

use std::sync::Arc;

use operator_desk_channels::ChannelManager;
use operator_desk_core::bus::InboundMessage;
use operator_desk_core::config::Config;
use operator_desk_core::engine::RelayEngine;
use operator_desk_core::keepalive::KeepAliveService;
use tokio::sync::{broadcast, mpsc};
use tracing::{error, info};

use crate::server::run_server;
use crate::state::AppState;

/// Inbound messages buffered between the platform handlers and the relay
pub const INBOUND_QUEUE_CAPACITY: usize = 1024;

/// Wires channels, relay engine, HTTP server and keep-alive together and
/// drives them until shutdown
pub struct Manager {
    config: Config,
    engine: Arc<RelayEngine>,
    channels: Arc<ChannelManager>,
    inbound_tx: mpsc::Sender<InboundMessage>,
    inbound_rx: mpsc::Receiver<InboundMessage>,
    keepalive: KeepAliveService,
}

impl Manager {
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        let (inbound_tx, inbound_rx) = mpsc::channel(INBOUND_QUEUE_CAPACITY);

        let mut channels = ChannelManager::new(config.channels.clone());
        channels.set_inbound_sender(inbound_tx.clone());
        channels.initialize().await?;
        let channels = Arc::new(channels);

        let engine = Arc::new(RelayEngine::new(config.relay.clone(), channels.clone()));
        let keepalive = KeepAliveService::new(&config);

        Ok(Self {
            config,
            engine,
            channels,
            inbound_tx,
            inbound_rx,
            keepalive,
        })
    }

    pub fn engine(&self) -> Arc<RelayEngine> {
        self.engine.clone()
    }

    /// Sender feeding the relay, as handed to every channel
    pub fn inbound_sender(&self) -> mpsc::Sender<InboundMessage> {
        self.inbound_tx.clone()
    }

    pub async fn run(mut self, shutdown_tx: broadcast::Sender<()>) -> anyhow::Result<()> {
        info!("Manager loop started");

        self.channels.start_all().await?;
        self.keepalive.start().await;

        let state = AppState::new(self.engine.clone(), shutdown_tx.clone());
        let server_config = self.config.server.clone();
        let server_shutdown = shutdown_tx.subscribe();
        let server = tokio::spawn(async move {
            if let Err(e) = run_server(state, &server_config, server_shutdown).await {
                error!("Server error: {}", e);
            }
        });

        let mut shutdown_rx = shutdown_tx.subscribe();
        loop {
            tokio::select! {
                msg = self.inbound_rx.recv() => match msg {
                    Some(msg) => self.engine.handle_inbound(msg).await,
                    None => {
                        info!("Inbound queue closed, stopping loop");
                        break;
                    }
                },
                _ = shutdown_rx.recv() => {
                    info!("Shutdown signal received");
                    break;
                }
            }
        }

        self.keepalive.stop().await;
        self.channels.stop_all().await?;
        // Server task exits on its own once the shutdown signal lands
        let _ = shutdown_tx.send(());
        if let Err(e) = server.await {
            error!("Server task failed: {}", e);
        }

        info!("Manager stopped");
        Ok(())
    }
}

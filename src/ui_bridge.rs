use crate::config::Config;
use crate::protocol::{Notification, UiCommand};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::net::UdpSocket;
use tokio::sync::mpsc;

pub enum UiEvent {
    Command(UiCommand),
}

/// Where state notifications go.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, notification: Notification);
}

pub struct UiBridge {
    socket: Arc<UdpSocket>,
    target_addr: String,
    buffer_size: usize,
    tx: mpsc::Sender<UiEvent>,
}

// UI进程和核心进程通过本地UDP通信，端口在配置中指定
impl UiBridge {
    pub async fn new(config: &Config, tx: mpsc::Sender<UiEvent>) -> anyhow::Result<Self> {
        let socket = UdpSocket::bind(format!("{}:{}", config.ui_local_ip, config.ui_local_port)).await?;
        let target_addr = format!("{}:{}", config.ui_remote_ip, config.ui_remote_port);
        log::info!(
            "UI bridge listening on {}, notifying {}",
            socket.local_addr()?,
            target_addr
        );

        Ok(Self {
            socket: Arc::new(socket),
            target_addr,
            buffer_size: config.ui_buffer_size.max(512),
            tx,
        })
    }

    pub async fn run(&self) -> anyhow::Result<()> {
        let mut buf = vec![0u8; self.buffer_size];
        loop {
            let (len, peer) = self.socket.recv_from(&mut buf).await?;
            if len == 0 {
                continue;
            }
            let Ok(text) = std::str::from_utf8(&buf[..len]) else {
                log::warn!("Ignoring non UTF-8 datagram from {}", peer);
                continue;
            };
            match UiCommand::parse(text) {
                Ok(cmd) => {
                    log::debug!("UI command from {}: {:?}", peer, cmd);
                    if let Err(e) = self.tx.send(UiEvent::Command(cmd)).await {
                        log::error!("Failed to forward UI event: {}", e);
                        break;
                    }
                }
                Err(e) => log::warn!("Ignoring malformed UI message {:?}: {}", text, e),
            }
        }
        Ok(())
    }

    pub async fn send_message(&self, msg: &str) -> anyhow::Result<()> {
        self.socket
            .send_to(msg.as_bytes(), &self.target_addr)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl Notifier for UiBridge {
    async fn notify(&self, notification: Notification) {
        let msg = match notification.to_json() {
            Ok(msg) => msg,
            Err(e) => {
                log::error!("Failed to serialize notification: {}", e);
                return;
            }
        };
        if let Err(e) = self.send_message(&msg).await {
            log::warn!("Failed to send to UI: {}", e);
        }
    }
}

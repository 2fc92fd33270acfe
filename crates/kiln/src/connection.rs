//! ConnectionManager - owns the single long-lived channel to Blender.
//!
//! `acquire` hands out the channel only after it answers a cheap probe
//! command. A channel that fails the probe, or lost its socket on an earlier
//! call, is closed and replaced; callers never receive a stale one.

use kilnconf::BlenderConfig;
use tracing::{info, warn};

use crate::channel::FramedChannel;
use crate::command::{CommandFrame, ResponseFrame};
use crate::error::{BridgeError, Result};

#[derive(Debug)]
pub struct ConnectionManager {
    config: BlenderConfig,
    channel: Option<FramedChannel>,
}

impl ConnectionManager {
    pub fn new(config: BlenderConfig) -> Self {
        Self {
            config,
            channel: None,
        }
    }

    pub fn config(&self) -> &BlenderConfig {
        &self.config
    }

    /// Whether a channel with a live socket is currently held.
    pub fn is_connected(&self) -> bool {
        self.channel.as_ref().is_some_and(FramedChannel::is_connected)
    }

    /// Return a validated channel, creating one if needed.
    pub async fn acquire(&mut self) -> Result<&mut FramedChannel> {
        if let Some(mut channel) = self.channel.take() {
            if channel.is_connected() {
                match self.probe(&mut channel).await {
                    Ok(()) => return Ok(self.channel.insert(channel)),
                    Err(e) => {
                        warn!(error = %e, "Existing connection is no longer valid");
                        channel.disconnect().await;
                    }
                }
            } else {
                info!("Cached channel lost its socket, reconnecting");
            }
        }

        let mut channel = FramedChannel::from_config(&self.config);
        if !channel.connect().await {
            return Err(BridgeError::Connection(format!(
                "Could not connect to Blender at {}. Make sure the Blender addon is running.",
                self.config.address()
            )));
        }

        info!(address = %self.config.address(), "Created new persistent connection to Blender");
        Ok(self.channel.insert(channel))
    }

    /// Close and forget the channel.
    pub async fn shutdown(&mut self) {
        if let Some(mut channel) = self.channel.take() {
            info!("Disconnecting from Blender");
            channel.disconnect().await;
        }
    }

    /// Any failure, including a remote error, counts as dead.
    async fn probe(&self, channel: &mut FramedChannel) -> Result<()> {
        let frame = CommandFrame::new(self.config.probe_command.clone(), Default::default());
        let bytes = channel.send(&frame).await?;
        ResponseFrame::decode(&bytes)?.into_result()?;
        Ok(())
    }
}

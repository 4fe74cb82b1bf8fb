//! Sending command frames through a transport.

use std::sync::Arc;

use tokio::sync::Mutex;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use super::{CommandConfig, CommandEncoder, DiscreteCommand, PositionTarget};
use crate::error::{CommandError, Result};
use crate::transport::Transport;
use crate::types::GeoPoint;

/// Encodes commands and sends them to the current target.
///
/// Control-input frames go to the target's command port, planner frames to
/// its planning port.
pub struct CommandDispatcher {
    transport: Arc<dyn Transport>,
    encoder: CommandEncoder,
    config: CommandConfig,
    /// Serializes indexed sequences so their frames never interleave.
    sequence: Mutex<()>,
}

impl CommandDispatcher {
    pub fn new(transport: Arc<dyn Transport>, config: CommandConfig) -> Self {
        Self::with_encoder(transport, CommandEncoder::new(), config)
    }

    pub fn with_encoder(transport: Arc<dyn Transport>, encoder: CommandEncoder, config: CommandConfig) -> Self {
        Self {
            transport,
            encoder,
            config,
            sequence: Mutex::new(()),
        }
    }

    pub fn encoder(&self) -> &CommandEncoder {
        &self.encoder
    }

    pub fn config(&self) -> &CommandConfig {
        &self.config
    }

    async fn send_command_frame(&self, frame: &[u8]) -> Result<usize> {
        let target = self.transport.target();
        self.transport.send(frame, &target.host, target.command_port).await
    }

    async fn send_planning_frame(&self, frame: &[u8]) -> Result<usize> {
        let target = self.transport.target();
        self.transport.send(frame, &target.host, target.planning_port).await
    }

    /// One frame, one send.
    pub async fn send_discrete(&self, command: DiscreteCommand) -> Result<()> {
        let frame = self.encoder.discrete(command)?;
        self.send_command_frame(&frame).await?;
        info!(?command, cmd_idx = %command.cmd_idx(), "command sent");
        Ok(())
    }

    /// Send an indexed command and return the number of datagrams sent.
    ///
    /// Indices in 1..=25 go out `repeat_count` times with `repeat_interval`
    /// between sends, followed immediately by one index-zero frame. Other
    /// indices are sent once. Stopping the transport aborts the sequence
    /// with [`CommandError::Cancelled`].
    pub async fn send_indexed(&self, cmd_idx: i32) -> Result<usize> {
        let sequence = self.encoder.indexed(cmd_idx)?;
        let Some(reset) = sequence.reset else {
            self.send_command_frame(&sequence.active).await?;
            debug!(cmd_idx, "out-of-range index sent once");
            return Ok(1);
        };

        let _guard = self.sequence.lock().await;
        let cancel = self.transport.shutdown_token();
        let mut sent = 0;

        for i in 0..self.config.repeat_count {
            if i > 0 {
                tokio::select! {
                    () = cancel.cancelled() => {
                        warn!(cmd_idx, sent, "command sequence cancelled");
                        return Err(CommandError::Cancelled { sent }.into());
                    }
                    () = sleep(self.config.repeat_interval) => {}
                }
            }
            if cancel.is_cancelled() {
                return Err(CommandError::Cancelled { sent }.into());
            }
            self.send_command_frame(&sequence.active).await?;
            sent += 1;
        }

        if cancel.is_cancelled() {
            return Err(CommandError::Cancelled { sent }.into());
        }
        self.send_command_frame(&reset).await?;
        sent += 1;

        info!(cmd_idx, sent, "indexed command sequence complete");
        Ok(sent)
    }

    pub async fn send_mission(&self, mission: i32, value: f32) -> Result<()> {
        let frame = self.encoder.mission(mission, value)?;
        self.send_command_frame(&frame).await?;
        info!(mission, value, "mission command sent");
        Ok(())
    }

    /// Merge gains into the cache and push the full set.
    pub async fn set_parameters<'a, I>(&self, values: I) -> Result<()>
    where
        I: IntoIterator<Item = (&'a str, f32)>,
    {
        let frame = self.encoder.set_parameters(values)?;
        self.send_command_frame(&frame).await?;
        info!("parameters pushed");
        Ok(())
    }

    /// Send one position target to the planner.
    pub async fn goto(&self, target: PositionTarget) -> Result<()> {
        let frame = self.encoder.gcs_command(target)?;
        self.send_planning_frame(&frame).await?;
        info!(x = target.x, y = target.y, z = target.z, "position target sent");
        Ok(())
    }

    /// Upload a waypoint list; `cruise_speed` falls back to the configured
    /// default.
    pub async fn upload_waypoints(&self, points: &[GeoPoint], cruise_speed: Option<f64>) -> Result<()> {
        let speed = cruise_speed.unwrap_or(self.config.cruise_speed);
        let frame = self.encoder.waypoints(points, speed)?;
        self.send_planning_frame(&frame).await?;
        info!(count = points.len(), speed, "waypoints uploaded");
        Ok(())
    }
}

//! CommandInvoker - one command, one round trip, under one lock.
//!
//! The wire protocol is strictly request-then-response on a single socket,
//! so the lock is held from `acquire` through the fully decoded response.
//! No retries happen here.

use std::sync::Arc;

use kilnconf::BlenderConfig;
use serde::Serialize;
use serde_json::{Map, Value};
use tokio::sync::Mutex;
use tracing::{error, info, warn};

use crate::command::{Command, CommandFrame, ResponseFrame};
use crate::connection::ConnectionManager;
use crate::error::{BridgeError, Result};

/// Optional addon features, reported by the status command.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Capabilities {
    pub polyhaven_enabled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Clone)]
pub struct CommandInvoker {
    manager: Arc<Mutex<ConnectionManager>>,
}

impl CommandInvoker {
    pub fn new(config: BlenderConfig) -> Self {
        Self::from_manager(ConnectionManager::new(config))
    }

    pub fn from_manager(manager: ConnectionManager) -> Self {
        Self {
            manager: Arc::new(Mutex::new(manager)),
        }
    }

    pub async fn invoke(&self, command: &Command) -> Result<Map<String, Value>> {
        let frame = command.to_frame()?;
        self.invoke_frame(&frame).await
    }

    /// Untyped entry point: a command name and its params, relayed as-is.
    pub async fn invoke_raw(
        &self,
        command_type: &str,
        params: Map<String, Value>,
    ) -> Result<Map<String, Value>> {
        self.invoke(&Command::raw(command_type, params)).await
    }

    #[tracing::instrument(
        name = "blender.invoke",
        skip(self, frame),
        fields(command.type = %frame.command_type)
    )]
    pub async fn invoke_frame(&self, frame: &CommandFrame) -> Result<Map<String, Value>> {
        let mut manager = self.manager.lock().await;
        let channel = manager.acquire().await?;

        let params = Value::Object(frame.params.clone());
        info!(params = %params, "Sending command");
        let bytes = channel.send(frame).await?;

        let response = match ResponseFrame::decode(&bytes) {
            Ok(response) => response,
            Err(e) => {
                let preview = String::from_utf8_lossy(&bytes[..bytes.len().min(200)]).into_owned();
                warn!(error = %e, raw = %preview, "Invalid response envelope from Blender");
                channel.disconnect().await;
                return Err(e);
            }
        };

        response.into_result().inspect_err(|e| {
            if let BridgeError::Remote(message) = e {
                error!(message = %message, "Blender error");
            }
        })
    }

    /// Ask the addon which optional integrations are enabled.
    pub async fn capabilities(&self) -> Result<Capabilities> {
        let result = self.invoke(&Command::GetPolyhavenStatus).await?;
        Ok(Capabilities {
            polyhaven_enabled: result
                .get("enabled")
                .and_then(Value::as_bool)
                .unwrap_or(false),
            message: result
                .get("message")
                .and_then(Value::as_str)
                .map(str::to_string),
        })
    }

    /// Establish (or validate) the connection without sending a command.
    pub async fn connect(&self) -> Result<()> {
        let mut manager = self.manager.lock().await;
        manager.acquire().await.map(|_| ())
    }

    pub async fn is_connected(&self) -> bool {
        self.manager.lock().await.is_connected()
    }

    pub async fn shutdown(&self) {
        self.manager.lock().await.shutdown().await;
    }
}

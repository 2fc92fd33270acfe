//! Trellis text-to-3D jobs: task snapshots, the service seam, and polling.
//!
//! Tasks are created and mutated only by the remote service. This side
//! observes snapshots and never writes them back.

pub mod client;
pub mod poller;

pub use client::TrellisClient;
pub use poller::{PollPolicy, Sleeper, TaskPoller, TaskSummary, TokioSleeper};

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error::{BridgeError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Queued,
    Processing,
    Complete,
    Error,
}

impl TaskStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Complete | TaskStatus::Error)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Queued => "queued",
            TaskStatus::Processing => "processing",
            TaskStatus::Complete => "complete",
            TaskStatus::Error => "error",
        }
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One snapshot of a remote task, as the service reports it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    #[serde(rename = "request_id")]
    pub id: String,
    pub status: TaskStatus,
    #[serde(default)]
    pub task_type: String,
    #[serde(rename = "request_output_dir", default)]
    pub output_dir: Option<String>,
    #[serde(rename = "client_ip", default)]
    pub client_identifier: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

impl Task {
    /// `{base_url}/output/{client}/{id}/output.glb`, when the task reported
    /// an output directory and a client identifier.
    pub fn output_locator(&self, base_url: &str) -> Option<String> {
        self.output_dir.as_deref().filter(|d| !d.is_empty())?;
        let client = self.client_identifier.as_deref().filter(|c| !c.is_empty())?;
        Some(format!(
            "{}/output/{}/{}/output.glb",
            base_url.trim_end_matches('/'),
            client,
            self.id
        ))
    }
}

/// Parameters for a text-to-3D submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct GenerationRequest {
    /// Description of the single object to generate.
    pub prompt: String,
    #[serde(default)]
    pub negative_prompt: String,
    #[serde(default = "default_steps")]
    pub geometry_sample_steps: u32,
    #[serde(default = "default_geometry_guidance")]
    pub geometry_cfg_strength: f64,
    #[serde(default = "default_steps")]
    pub texture_sample_steps: u32,
    #[serde(default = "default_texture_guidance")]
    pub texture_cfg_strength: f64,
}

fn default_steps() -> u32 {
    12
}

fn default_geometry_guidance() -> f64 {
    7.5
}

fn default_texture_guidance() -> f64 {
    3.5
}

impl GenerationRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            negative_prompt: String::new(),
            geometry_sample_steps: default_steps(),
            geometry_cfg_strength: default_geometry_guidance(),
            texture_sample_steps: default_steps(),
            texture_cfg_strength: default_texture_guidance(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.prompt.trim().is_empty() {
            return Err(BridgeError::InvalidCommand("prompt must not be empty".to_string()));
        }
        if self.geometry_sample_steps == 0 || self.texture_sample_steps == 0 {
            return Err(BridgeError::InvalidCommand(
                "sample steps must be at least 1".to_string(),
            ));
        }
        for (field, value) in [
            ("geometry_cfg_strength", self.geometry_cfg_strength),
            ("texture_cfg_strength", self.texture_cfg_strength),
        ] {
            if !value.is_finite() || value <= 0.0 {
                return Err(BridgeError::InvalidCommand(format!(
                    "{} must be a positive number",
                    field
                )));
            }
        }
        Ok(())
    }
}

/// The remote job service as the poller sees it.
#[async_trait]
pub trait JobService: Send + Sync {
    /// Root URL that output locators hang off.
    fn base_url(&self) -> &str;

    /// Submit a generation job and return its task id.
    async fn submit_job(&self, request: &GenerationRequest) -> Result<String>;

    /// Fetch the current snapshot of a task.
    async fn get_job(&self, task_id: &str) -> Result<Task>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn task(output_dir: Option<&str>, client: Option<&str>) -> Task {
        Task {
            id: "abc123".into(),
            status: TaskStatus::Complete,
            task_type: "text_to_3d".into(),
            output_dir: output_dir.map(str::to_string),
            client_identifier: client.map(str::to_string),
            error: None,
        }
    }

    #[test]
    fn task_decodes_service_field_names() {
        let task: Task = serde_json::from_value(json!({
            "request_id": "abc123",
            "status": "processing",
            "task_type": "text_to_3d",
            "request_output_dir": null,
            "client_ip": "10.0.0.7"
        }))
        .unwrap();

        assert_eq!(task.id, "abc123");
        assert_eq!(task.status, TaskStatus::Processing);
        assert!(!task.status.is_terminal());
        assert_eq!(task.output_dir, None);
        assert_eq!(task.client_identifier.as_deref(), Some("10.0.0.7"));
    }

    #[test]
    fn output_locator_convention() {
        let t = task(Some("/srv/output/10.0.0.7/abc123"), Some("10.0.0.7"));
        assert_eq!(
            t.output_locator("http://trellis:8000/").as_deref(),
            Some("http://trellis:8000/output/10.0.0.7/abc123/output.glb")
        );
    }

    #[test]
    fn output_locator_needs_dir_and_client() {
        assert_eq!(task(None, Some("10.0.0.7")).output_locator("http://t"), None);
        assert_eq!(task(Some(""), Some("10.0.0.7")).output_locator("http://t"), None);
        assert_eq!(task(Some("/srv/out"), None).output_locator("http://t"), None);
    }

    #[test]
    fn generation_defaults_and_validation() {
        let request: GenerationRequest =
            serde_json::from_value(json!({"prompt": "a wooden chair"})).unwrap();
        assert_eq!(request, GenerationRequest::new("a wooden chair"));
        assert!(request.validate().is_ok());

        assert!(GenerationRequest::new("   ").validate().is_err());

        let mut zero_steps = GenerationRequest::new("chair");
        zero_steps.texture_sample_steps = 0;
        assert!(zero_steps.validate().is_err());

        let mut nan = GenerationRequest::new("chair");
        nan.geometry_cfg_strength = f64::NAN;
        assert!(nan.validate().is_err());
    }
}

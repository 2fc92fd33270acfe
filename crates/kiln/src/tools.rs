//! Tool facade - the named operations an agent calls.
//!
//! Every operation returns a JSON value and never fails: errors come back as
//! `{"error": "..."}` so the caller can show them to the agent as-is. Blender
//! tools go through the [`CommandInvoker`]; text-to-3D goes through the job
//! service and the [`TaskPoller`].

use std::sync::Arc;

use kilnconf::KilnConfig;
use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tracing::{info, warn};

use crate::command::{
    AssetCategoriesParams, Command, CreateObjectParams, DownloadAssetParams, ExecuteCodeParams,
    ImportModelParams, ModifyObjectParams, ObjectRef, SearchAssetsParams, SetMaterialParams,
    SetTextureParams,
};
use crate::error::{BridgeError, Result};
use crate::invoker::CommandInvoker;
use crate::jobs::{GenerationRequest, JobService, PollPolicy, TaskPoller, TrellisClient};

pub const POLYHAVEN_DISABLED: &str =
    "PolyHaven integration is disabled. Select it in the sidebar in BlenderMCP, then run it again.";

/// Catalog entry for one tool.
#[derive(Debug, Clone, Serialize)]
pub struct ToolInfo {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
}

/// Arguments for tools that take none.
#[derive(Debug, Clone, Default, Deserialize, JsonSchema)]
pub struct NoArgs {}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct TaskStatusArgs {
    pub task_id: String,
}

#[derive(Clone)]
pub struct Tools {
    invoker: CommandInvoker,
    jobs: Arc<dyn JobService>,
    poller: TaskPoller,
}

impl Tools {
    pub fn new(invoker: CommandInvoker, jobs: Arc<dyn JobService>, policy: PollPolicy) -> Self {
        let poller = TaskPoller::new(jobs.clone(), policy);
        Self {
            invoker,
            jobs,
            poller,
        }
    }

    pub fn from_config(config: &KilnConfig) -> Result<Self> {
        let jobs: Arc<dyn JobService> = Arc::new(TrellisClient::from_config(&config.trellis)?);
        Ok(Self::new(
            CommandInvoker::new(config.blender.clone()),
            jobs,
            PollPolicy::from_config(&config.trellis),
        ))
    }

    /// Replace the poller, e.g. to inject a different sleeper.
    pub fn with_poller(mut self, poller: TaskPoller) -> Self {
        self.poller = poller;
        self
    }

    pub fn invoker(&self) -> &CommandInvoker {
        &self.invoker
    }

    /// Try to connect up front. Failure is logged, not fatal; the next tool
    /// call connects lazily.
    pub async fn startup(&self) {
        match self.invoker.connect().await {
            Ok(()) => info!("Successfully connected to Blender on startup"),
            Err(e) => {
                warn!(error = %e, "Could not connect to Blender on startup");
                warn!("Make sure the Blender addon is running before using Blender tools");
            }
        }
    }

    pub async fn shutdown(&self) {
        self.invoker.shutdown().await;
    }

    // ------------------------------------------------------------------------
    // Scene
    // ------------------------------------------------------------------------

    pub async fn get_scene_info(&self) -> Value {
        self.relay(Command::GetSceneInfo).await
    }

    pub async fn get_object_info(&self, args: ObjectRef) -> Value {
        self.relay(Command::GetObjectInfo(args)).await
    }

    pub async fn create_object(&self, args: CreateObjectParams) -> Value {
        self.relay(Command::CreateObject(args)).await
    }

    pub async fn modify_object(&self, args: ModifyObjectParams) -> Value {
        self.relay(Command::ModifyObject(args)).await
    }

    pub async fn delete_object(&self, args: ObjectRef) -> Value {
        self.relay(Command::DeleteObject(args)).await
    }

    pub async fn set_material(&self, args: SetMaterialParams) -> Value {
        self.relay(Command::SetMaterial(args)).await
    }

    pub async fn execute_blender_code(&self, args: ExecuteCodeParams) -> Value {
        self.relay(Command::ExecuteCode(args)).await
    }

    // ------------------------------------------------------------------------
    // PolyHaven
    // ------------------------------------------------------------------------

    pub async fn get_polyhaven_status(&self) -> Value {
        match self.invoker.capabilities().await {
            Ok(caps) => serde_json::to_value(&caps).unwrap_or_else(|e| error_value(e.to_string())),
            Err(e) => error_payload(&e),
        }
    }

    pub async fn get_polyhaven_categories(&self, args: AssetCategoriesParams) -> Value {
        self.relay_polyhaven(Command::GetPolyhavenCategories(args)).await
    }

    pub async fn search_polyhaven_assets(&self, args: SearchAssetsParams) -> Value {
        self.relay_polyhaven(Command::SearchPolyhavenAssets(args)).await
    }

    pub async fn download_polyhaven_asset(&self, args: DownloadAssetParams) -> Value {
        self.relay_polyhaven(Command::DownloadPolyhavenAsset(args)).await
    }

    pub async fn set_texture(&self, args: SetTextureParams) -> Value {
        self.relay(Command::SetTexture(args)).await
    }

    // ------------------------------------------------------------------------
    // Text-to-3D
    // ------------------------------------------------------------------------

    /// Submit a generation job. Returns immediately; the caller polls.
    #[tracing::instrument(name = "tool.create_3d_model_from_text", skip(self, args))]
    pub async fn create_3d_model_from_text(&self, args: GenerationRequest) -> Value {
        match self.jobs.submit_job(&args).await {
            Ok(task_id) => json!({
                "task_id": task_id,
                "status": "queued",
                "message": "Task created successfully. The 3D model generation is in progress.",
                "next_step": format!(
                    "You MUST now call get_task_status with task_id {} to check progress.",
                    task_id
                ),
                "workflow": [
                    "1. Submit the generation task with create_3d_model_from_text (done)",
                    format!("2. Call get_task_status with task_id: {}", task_id),
                    "3. If the task is not complete, call get_task_status again",
                    "4. When it is complete, import the model_url with import_glb_model",
                ],
            }),
            Err(e) => {
                warn!(error = %e, "Error creating 3D model from text");
                error_payload(&e)
            }
        }
    }

    #[tracing::instrument(name = "tool.get_task_status", skip(self, args), fields(task.id = %args.task_id))]
    pub async fn get_task_status(&self, args: TaskStatusArgs) -> Value {
        if args.task_id.trim().is_empty() {
            return error_value("task_id must not be empty");
        }
        match self.poller.poll(&args.task_id).await {
            Ok(summary) => {
                serde_json::to_value(&summary).unwrap_or_else(|e| error_value(e.to_string()))
            }
            Err(e) => {
                warn!(error = %e, "Error checking task status");
                error_payload(&e)
            }
        }
    }

    pub async fn import_glb_model(&self, args: ImportModelParams) -> Value {
        self.relay(Command::ImportGlbModel(args)).await
    }

    // ------------------------------------------------------------------------
    // Dispatch
    // ------------------------------------------------------------------------

    /// Call a tool by name with JSON arguments. `Null` counts as `{}`.
    ///
    /// The Trellis tools also answer to their `_trellis` names.
    pub async fn call(&self, name: &str, args: Value) -> Value {
        let args = match args {
            Value::Null => Value::Object(Map::new()),
            other => other,
        };

        match name {
            "get_scene_info" => self.get_scene_info().await,
            "get_object_info" => with_args(args, |a| self.get_object_info(a)).await,
            "create_object" => with_args(args, |a| self.create_object(a)).await,
            "modify_object" => with_args(args, |a| self.modify_object(a)).await,
            "delete_object" => with_args(args, |a| self.delete_object(a)).await,
            "set_material" => with_args(args, |a| self.set_material(a)).await,
            "execute_blender_code" => with_args(args, |a| self.execute_blender_code(a)).await,
            "get_polyhaven_status" => self.get_polyhaven_status().await,
            "get_polyhaven_categories" => {
                with_args(args, |a| self.get_polyhaven_categories(a)).await
            }
            "search_polyhaven_assets" => with_args(args, |a| self.search_polyhaven_assets(a)).await,
            "download_polyhaven_asset" => {
                with_args(args, |a| self.download_polyhaven_asset(a)).await
            }
            "set_texture" => with_args(args, |a| self.set_texture(a)).await,
            "create_3d_model_from_text" | "create_3d_model_from_text_trellis" => {
                with_args(args, |a| self.create_3d_model_from_text(a)).await
            }
            "get_task_status" | "get_trellis_task_status" => {
                with_args(args, |a| self.get_task_status(a)).await
            }
            "import_glb_model" | "import_trellis_glb_model" => {
                with_args(args, |a| self.import_glb_model(a)).await
            }
            other => error_value(format!("Unknown tool: {}", other)),
        }
    }

    async fn relay(&self, command: Command) -> Value {
        match self.invoker.invoke(&command).await {
            Ok(result) => unwrap_result(&command, result),
            Err(e) => {
                warn!(command = command.command_type(), error = %e, "Tool call failed");
                error_payload(&e)
            }
        }
    }

    /// Like `relay`, but only when the addon reports PolyHaven as enabled.
    async fn relay_polyhaven(&self, command: Command) -> Value {
        match self.invoker.capabilities().await {
            Ok(caps) if caps.polyhaven_enabled => self.relay(command).await,
            Ok(_) => error_value(POLYHAVEN_DISABLED),
            Err(e) => error_payload(&e),
        }
    }
}

/// The whole tool catalog, in dispatch order.
pub fn catalog() -> Vec<ToolInfo> {
    vec![
        tool::<NoArgs>("get_scene_info", "Get detailed information about the current Blender scene"),
        tool::<ObjectRef>("get_object_info", "Get detailed information about a specific object in the scene"),
        tool::<CreateObjectParams>("create_object", "Create a new primitive object in the scene"),
        tool::<ModifyObjectParams>("modify_object", "Modify an existing object's transform or visibility"),
        tool::<ObjectRef>("delete_object", "Delete an object from the scene"),
        tool::<SetMaterialParams>("set_material", "Set or create a material for an object"),
        tool::<ExecuteCodeParams>("execute_blender_code", "Execute arbitrary Python code in Blender"),
        tool::<NoArgs>("get_polyhaven_status", "Check whether PolyHaven integration is enabled in Blender"),
        tool::<AssetCategoriesParams>("get_polyhaven_categories", "List PolyHaven categories for an asset type"),
        tool::<SearchAssetsParams>("search_polyhaven_assets", "Search PolyHaven assets with optional category filtering"),
        tool::<DownloadAssetParams>("download_polyhaven_asset", "Download a PolyHaven asset and import it into Blender"),
        tool::<SetTextureParams>("set_texture", "Apply a previously downloaded PolyHaven texture to an object"),
        tool::<GenerationRequest>(
            "create_3d_model_from_text",
            "Start a text-to-3D generation task. Does not wait: poll get_task_status with the returned task_id",
        ),
        tool::<TaskStatusArgs>("get_task_status", "Check a text-to-3D task, polling briefly until it finishes"),
        tool::<ImportModelParams>("import_glb_model", "Import a generated GLB model from a URL into Blender"),
    ]
}

fn tool<T: JsonSchema>(name: &str, description: &str) -> ToolInfo {
    ToolInfo {
        name: name.to_string(),
        description: description.to_string(),
        input_schema: schemars::schema_for!(T).to_value(),
    }
}

async fn with_args<T, F, Fut>(args: Value, f: F) -> Value
where
    T: DeserializeOwned,
    F: FnOnce(T) -> Fut,
    Fut: std::future::Future<Output = Value>,
{
    match serde_json::from_value(args) {
        Ok(parsed) => f(parsed).await,
        Err(e) => error_payload(&BridgeError::InvalidCommand(e.to_string())),
    }
}

/// The addon sometimes reports failure inside a successful envelope: an
/// `error` string, `success: false` with a `message`, or, for an import, a
/// `status` other than `"success"`.
fn unwrap_result(command: &Command, result: Map<String, Value>) -> Value {
    if let Some(Value::String(message)) = result.get("error") {
        return error_value(message.clone());
    }

    let import_failed = matches!(command, Command::ImportGlbModel(_))
        && result.get("status").and_then(Value::as_str) != Some("success");
    if import_failed || result.get("success") == Some(&Value::Bool(false)) {
        let message = result
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("Unknown error");
        return error_value(message);
    }

    Value::Object(result)
}

fn error_payload(error: &BridgeError) -> Value {
    error_value(error.to_string())
}

fn error_value(message: impl Into<String>) -> Value {
    json!({ "error": message.into() })
}

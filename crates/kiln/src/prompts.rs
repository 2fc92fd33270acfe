//! Prompts - guidance text an agent can fetch before using the tools
//!
//! Each prompt is a fixed block of instructions naming the tools in
//! [`catalog`](crate::tools::catalog) and the order to use them in.

use serde::Serialize;
use tracing::debug;

use crate::error::{BridgeError, Result};

/// Catalog entry for one prompt.
#[derive(Debug, Clone, Serialize)]
pub struct PromptInfo {
    pub name: String,
    pub description: String,
}

/// Registry of available prompts.
pub struct PromptRegistry;

impl PromptRegistry {
    /// List all available prompts.
    pub fn list() -> Vec<PromptInfo> {
        vec![PromptInfo {
            name: "asset_creation_strategy".into(),
            description: "Preferred strategy for creating assets in Blender".into(),
        }]
    }

    /// Get the text of a prompt by name.
    pub fn get(name: &str) -> Result<String> {
        debug!(prompt = name, "Getting prompt");

        match name {
            "asset_creation_strategy" => Ok(ASSET_CREATION_STRATEGY.to_string()),
            _ => Err(BridgeError::InvalidCommand(format!("Unknown prompt: {}", name))),
        }
    }
}

const ASSET_CREATION_STRATEGY: &str = r#"When creating 3D content in Blender, check which integrations are available first.

0. Start by reading the scene with get_scene_info.

1. Check the integrations:
   a. PolyHaven
      Call get_polyhaven_status. When it is enabled:
      - objects and models: download_polyhaven_asset with asset_type="models"
      - materials and textures: download_polyhaven_asset with asset_type="textures",
        then set_texture to apply one to an object
      - environment lighting: download_polyhaven_asset with asset_type="hdris"
   b. Trellis text-to-3D
      Trellis is good at one item per task. Do not use it to:
      - generate a whole scene in one shot
      - generate the ground
      - generate parts of an item separately and assemble them afterwards
      To create a model:
      1. Start a task with create_3d_model_from_text.
      2. Poll get_task_status with the returned task_id until it reports
         complete or failed. Call it again while must_poll_again is true.
      3. Import the result with import_glb_model using the returned model_url.
      4. Check the world_bounding_box of the imported mesh and adjust its
         location, scale and rotation so it sits in the right spot.
      A model that was already generated can be duplicated with
      execute_blender_code instead of starting another task.

2. When the integrations are disabled, or when falling back to basic tools:
   - create_object for primitives (CUBE, SPHERE, CYLINDER, ...)
   - set_material for basic colors and materials

3. Give every object you add to the scene a meaningful name.

4. Check the world_bounding_box of each item:
   - objects that should not overlap do not clip into each other
   - items have the right spatial relationship

5. After setting location, scale or rotation through create_object or
   modify_object, confirm the result with get_object_info.

Only fall back to basic creation tools when:
- PolyHaven and Trellis are unavailable
- a simple primitive is explicitly requested
- no suitable PolyHaven asset exists
- Trellis failed to generate the desired asset
- the task only needs a basic material or color
"#;

//! Wire frames for the Blender addon socket and the typed commands that produce them.
//!
//! A request is one JSON object `{"type": <name>, "params": {...}}` with no
//! delimiter; a response is `{"status": "success", "result": {...}}` or
//! `{"status": "error", "message": "..."}`.
//!
//! Each known command has a fixed params struct, validated before it is
//! serialized. Anything else goes through [`Command::Raw`] unchanged.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{BridgeError, Result};

/// One request frame. Immutable once built; one per round trip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandFrame {
    #[serde(rename = "type")]
    pub command_type: String,
    #[serde(default)]
    pub params: Map<String, Value>,
}

impl CommandFrame {
    pub fn new(command_type: impl Into<String>, params: Map<String, Value>) -> Self {
        Self {
            command_type: command_type.into(),
            params,
        }
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(self).map_err(|e| BridgeError::InvalidCommand(e.to_string()))
    }
}

/// Response envelope, keyed by `status`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum ResponseFrame {
    Success {
        #[serde(default)]
        result: Map<String, Value>,
    },
    Error {
        #[serde(default = "unknown_remote_error")]
        message: String,
    },
}

fn unknown_remote_error() -> String {
    "Unknown error from Blender".to_string()
}

impl ResponseFrame {
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        serde_json::from_slice(bytes).map_err(|e| BridgeError::Malformed(e.to_string()))
    }

    /// The result mapping, or the remote message as [`BridgeError::Remote`].
    pub fn into_result(self) -> Result<Map<String, Value>> {
        match self {
            ResponseFrame::Success { result } => Ok(result),
            ResponseFrame::Error { message } => Err(BridgeError::Remote(message)),
        }
    }
}

// ============================================================================
// Params
// ============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "UPPERCASE")]
pub enum PrimitiveType {
    #[default]
    Cube,
    Sphere,
    Cylinder,
    Plane,
    Cone,
    Torus,
    Empty,
    Camera,
    Light,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum AssetType {
    #[default]
    Hdris,
    Textures,
    Models,
    All,
}

/// Identifies an object by name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ObjectRef {
    #[serde(alias = "object_name")]
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct CreateObjectParams {
    #[serde(rename = "type", default)]
    pub object_type: PrimitiveType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub location: [f64; 3],
    /// Euler rotation in radians.
    #[serde(default)]
    pub rotation: [f64; 3],
    #[serde(default = "unit_scale")]
    pub scale: [f64; 3],
}

fn unit_scale() -> [f64; 3] {
    [1.0, 1.0, 1.0]
}

impl Default for CreateObjectParams {
    fn default() -> Self {
        Self {
            object_type: PrimitiveType::default(),
            name: None,
            location: [0.0; 3],
            rotation: [0.0; 3],
            scale: unit_scale(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ModifyObjectParams {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<[f64; 3]>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rotation: Option<[f64; 3]>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scale: Option<[f64; 3]>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visible: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SetMaterialParams {
    pub object_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub material_name: Option<String>,
    /// RGB or RGBA, each component in 0.0..=1.0.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<Vec<f64>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ExecuteCodeParams {
    pub code: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct AssetCategoriesParams {
    #[serde(default)]
    pub asset_type: AssetType,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SearchAssetsParams {
    #[serde(default = "all_assets")]
    pub asset_type: AssetType,
    /// Comma-separated category filter.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub categories: Option<String>,
}

fn all_assets() -> AssetType {
    AssetType::All
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct DownloadAssetParams {
    pub asset_id: String,
    pub asset_type: AssetType,
    #[serde(default = "default_resolution")]
    pub resolution: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_format: Option<String>,
}

fn default_resolution() -> String {
    "1k".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SetTextureParams {
    pub object_name: String,
    pub texture_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ImportModelParams {
    #[serde(alias = "model_url")]
    pub url: String,
}

// ============================================================================
// Command
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    GetSceneInfo,
    GetObjectInfo(ObjectRef),
    CreateObject(CreateObjectParams),
    ModifyObject(ModifyObjectParams),
    DeleteObject(ObjectRef),
    SetMaterial(SetMaterialParams),
    ExecuteCode(ExecuteCodeParams),
    GetPolyhavenStatus,
    GetPolyhavenCategories(AssetCategoriesParams),
    SearchPolyhavenAssets(SearchAssetsParams),
    DownloadPolyhavenAsset(DownloadAssetParams),
    SetTexture(SetTextureParams),
    ImportGlbModel(ImportModelParams),
    /// Opaque passthrough for commands this crate does not model.
    Raw {
        command_type: String,
        params: Map<String, Value>,
    },
}

impl Command {
    pub fn raw(command_type: impl Into<String>, params: Map<String, Value>) -> Self {
        Command::Raw {
            command_type: command_type.into(),
            params,
        }
    }

    /// Wire name sent as `type`.
    pub fn command_type(&self) -> &str {
        match self {
            Command::GetSceneInfo => "get_scene_info",
            Command::GetObjectInfo(_) => "get_object_info",
            Command::CreateObject(_) => "create_object",
            Command::ModifyObject(_) => "modify_object",
            Command::DeleteObject(_) => "delete_object",
            Command::SetMaterial(_) => "set_material",
            Command::ExecuteCode(_) => "execute_code",
            Command::GetPolyhavenStatus => "get_polyhaven_status",
            Command::GetPolyhavenCategories(_) => "get_polyhaven_categories",
            Command::SearchPolyhavenAssets(_) => "search_polyhaven_assets",
            Command::DownloadPolyhavenAsset(_) => "download_polyhaven_asset",
            Command::SetTexture(_) => "set_texture",
            Command::ImportGlbModel(_) => "import_trellis_glb_model",
            Command::Raw { command_type, .. } => command_type,
        }
    }

    pub fn validate(&self) -> Result<()> {
        match self {
            Command::GetSceneInfo | Command::GetPolyhavenStatus => Ok(()),
            Command::GetObjectInfo(p) | Command::DeleteObject(p) => non_empty("name", &p.name),
            Command::CreateObject(p) => {
                if let Some(name) = &p.name {
                    non_empty("name", name)?;
                }
                finite_vec3("location", &p.location)?;
                finite_vec3("rotation", &p.rotation)?;
                finite_vec3("scale", &p.scale)
            }
            Command::ModifyObject(p) => {
                non_empty("name", &p.name)?;
                for (field, value) in [
                    ("location", &p.location),
                    ("rotation", &p.rotation),
                    ("scale", &p.scale),
                ] {
                    if let Some(v) = value {
                        finite_vec3(field, v)?;
                    }
                }
                Ok(())
            }
            Command::SetMaterial(p) => {
                non_empty("object_name", &p.object_name)?;
                if let Some(name) = &p.material_name {
                    non_empty("material_name", name)?;
                }
                match &p.color {
                    Some(color) => validate_color(color),
                    None => Ok(()),
                }
            }
            Command::ExecuteCode(p) => non_empty("code", &p.code),
            Command::GetPolyhavenCategories(_) | Command::SearchPolyhavenAssets(_) => Ok(()),
            Command::DownloadPolyhavenAsset(p) => {
                non_empty("asset_id", &p.asset_id)?;
                non_empty("resolution", &p.resolution)?;
                if p.asset_type == AssetType::All {
                    return Err(BridgeError::InvalidCommand(
                        "asset_type must be one of hdris, textures, models".to_string(),
                    ));
                }
                Ok(())
            }
            Command::SetTexture(p) => {
                non_empty("object_name", &p.object_name)?;
                non_empty("texture_id", &p.texture_id)
            }
            Command::ImportGlbModel(p) => non_empty("url", &p.url),
            Command::Raw { command_type, .. } => non_empty("type", command_type),
        }
    }

    /// Validate, then build the wire frame.
    pub fn to_frame(&self) -> Result<CommandFrame> {
        self.validate()?;

        let params = match self {
            Command::GetSceneInfo | Command::GetPolyhavenStatus => Map::new(),
            Command::GetObjectInfo(p) | Command::DeleteObject(p) => params_of(p)?,
            Command::CreateObject(p) => params_of(p)?,
            Command::ModifyObject(p) => params_of(p)?,
            Command::SetMaterial(p) => params_of(p)?,
            Command::ExecuteCode(p) => params_of(p)?,
            Command::GetPolyhavenCategories(p) => params_of(p)?,
            Command::SearchPolyhavenAssets(p) => params_of(p)?,
            Command::DownloadPolyhavenAsset(p) => params_of(p)?,
            Command::SetTexture(p) => params_of(p)?,
            Command::ImportGlbModel(p) => params_of(p)?,
            Command::Raw { params, .. } => params.clone(),
        };

        Ok(CommandFrame::new(self.command_type(), params))
    }
}

fn params_of<T: Serialize>(params: &T) -> Result<Map<String, Value>> {
    match serde_json::to_value(params) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(other) => Err(BridgeError::InvalidCommand(format!(
            "params must serialize to an object, got {}",
            other
        ))),
        Err(e) => Err(BridgeError::InvalidCommand(e.to_string())),
    }
}

fn non_empty(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(BridgeError::InvalidCommand(format!("{} must not be empty", field)));
    }
    Ok(())
}

fn finite_vec3(field: &str, v: &[f64; 3]) -> Result<()> {
    if v.iter().all(|c| c.is_finite()) {
        Ok(())
    } else {
        Err(BridgeError::InvalidCommand(format!("{} must contain finite numbers", field)))
    }
}

fn validate_color(color: &[f64]) -> Result<()> {
    if !(3..=4).contains(&color.len()) {
        return Err(BridgeError::InvalidCommand(format!(
            "color must have 3 or 4 components, got {}",
            color.len()
        )));
    }
    if color.iter().any(|c| !(0.0..=1.0).contains(c)) {
        return Err(BridgeError::InvalidCommand(
            "color components must be within 0.0..=1.0".to_string(),
        ));
    }
    Ok(())
}

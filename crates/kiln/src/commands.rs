//! CLI command implementations

use anyhow::{bail, Context, Result};
use kiln::{catalog, CommandInvoker, PromptRegistry, Tools};
use kilnconf::KilnConfig;
use serde_json::{Map, Value};

/// Parse an optional JSON argument into an object. Missing means `{}`.
fn parse_object(json: Option<&str>) -> Result<Map<String, Value>> {
    let Some(json) = json else {
        return Ok(Map::new());
    };
    match serde_json::from_str(json).context("Failed to parse JSON arguments")? {
        Value::Object(map) => Ok(map),
        other => bail!("Expected a JSON object, got: {}", other),
    }
}

fn print_json(value: &impl serde::Serialize) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Print the tool catalog
pub fn tools() -> Result<()> {
    print_json(&catalog())
}

/// List prompts, or print the text of one
pub fn prompt(name: Option<&str>) -> Result<()> {
    match name {
        None => print_json(&PromptRegistry::list()),
        Some(name) => {
            println!("{}", PromptRegistry::get(name)?);
            Ok(())
        }
    }
}

/// Call one tool by name and print its JSON result
pub async fn call(config: &KilnConfig, name: &str, json: Option<&str>) -> Result<()> {
    let args = Value::Object(parse_object(json)?);
    let tools = Tools::from_config(config)?;

    let result = tools.call(name, args).await;
    tools.shutdown().await;

    print_json(&result)?;
    if result.get("error").is_some() {
        bail!("Tool {} reported an error", name);
    }
    Ok(())
}

/// Connect and report which optional addon features are enabled
pub async fn ping(config: &KilnConfig) -> Result<()> {
    let invoker = CommandInvoker::new(config.blender.clone());

    let start = std::time::Instant::now();
    let capabilities = invoker
        .capabilities()
        .await
        .with_context(|| format!("Blender at {} did not answer", config.blender.address()))?;
    let elapsed = start.elapsed();
    invoker.shutdown().await;

    eprintln!("Blender at {} answered in {:?}", config.blender.address(), elapsed);
    print_json(&capabilities)
}

/// Send a raw command type and params, print the result mapping
pub async fn send(config: &KilnConfig, command_type: &str, json: Option<&str>) -> Result<()> {
    let params = parse_object(json)?;
    let invoker = CommandInvoker::new(config.blender.clone());

    let result = invoker.invoke_raw(command_type, params).await;
    invoker.shutdown().await;

    print_json(&Value::Object(result?))
}

/// Poll a text-to-3D task once (bounded) and print the summary
pub async fn status(config: &KilnConfig, task_id: &str) -> Result<()> {
    let tools = Tools::from_config(config)?;
    let summary = tools
        .call("get_task_status", serde_json::json!({ "task_id": task_id }))
        .await;
    print_json(&summary)
}

/// Print the effective configuration
pub fn show_config(config: &KilnConfig) -> Result<()> {
    print!("{}", config.to_toml());
    Ok(())
}

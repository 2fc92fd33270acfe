//! kiln - bridge from a tool-calling agent to a running Blender instance
//! and the Trellis text-to-3D service.
//!
//! - `channel`: framed JSON request/response over one TCP socket
//! - `connection`: the single long-lived channel, probed before reuse
//! - `invoker`: serialized command round trips
//! - `command`: wire frames and typed command params
//! - `jobs`: Trellis task snapshots, HTTP client and bounded polling
//! - `tools`: the named operations exposed to an agent
//! - `prompts`: guidance text for agents using the tools

pub mod channel;
pub mod command;
pub mod connection;
pub mod error;
pub mod invoker;
pub mod jobs;
pub mod prompts;
pub mod tools;

pub use channel::FramedChannel;
pub use command::{Command, CommandFrame, ResponseFrame};
pub use connection::ConnectionManager;
pub use error::{BridgeError, Result};
pub use invoker::{Capabilities, CommandInvoker};
pub use jobs::{
    GenerationRequest, JobService, PollPolicy, Task, TaskPoller, TaskStatus, TaskSummary,
    TrellisClient,
};
pub use prompts::{PromptInfo, PromptRegistry};
pub use tools::{catalog, ToolInfo, Tools};

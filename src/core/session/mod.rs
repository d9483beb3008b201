//! Sessions and their working directories

pub mod orch;
pub mod paths;

pub use orch::{DeviceInfo, OrchSession, SqlCatalog, StateTransition, ORCHESTRATE_VERSION};
pub use paths::{OrchPath, WorkflowPaths, CONSUMED_DIR, EGRESS_DIR, IN_PROCESS_DIR};

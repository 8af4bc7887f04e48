//! mcp-bridge: run callback-driven commands as blocking calls, from the
//! command line or as an MCP `run_command` tool.

pub mod bridge;
pub mod cmd;
pub mod command;
pub mod config;
pub mod mcp;
pub mod utils;

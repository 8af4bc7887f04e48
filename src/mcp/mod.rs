//! MCP server exposing bridged commands as a tool.
//!
//! tools/list -> `run_command`
//! tools/call run_command { args, mode?, timeout_secs? }
//!   -> bridge on a blocking thread (bounded by `max_concurrent`)
//!   -> text content, or error content "<kind>: <message>"
//!
//! Client cancellation of a call triggers the bridge interrupt.

use anyhow::{Context, Result};
use rmcp::model::{
    CallToolRequestParam, CallToolResult, Content, Implementation, JsonObject, ListToolsResult,
    PaginatedRequestParam, ProtocolVersion, ServerCapabilities, ServerInfo, Tool,
};
use rmcp::service::RequestContext;
use rmcp::{ErrorData as McpError, RoleServer, ServerHandler, ServiceExt};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;

use crate::bridge::{Bridge, BridgeConfig, Interrupt};
use crate::cmd::mode::{Mode, normalize_line};
use crate::command::{CommandSpec, ProcessCommand, parse_target};
use crate::config::Settings;

pub const RUN_COMMAND_TOOL: &str = "run_command";

/// Arguments of the `run_command` tool.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RunCommandParams {
    /// Shell-style arguments appended to the base target
    #[serde(default)]
    pub args: Option<String>,
    #[serde(default)]
    pub mode: Option<String>,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

impl RunCommandParams {
    pub fn from_arguments(arguments: Option<JsonObject>) -> Result<Self, McpError> {
        let value = serde_json::Value::Object(arguments.unwrap_or_default());
        serde_json::from_value(value)
            .map_err(|e| McpError::invalid_params(format!("invalid run_command arguments: {e}"), None))
    }

    fn mode(&self) -> Result<Mode, McpError> {
        match self.mode.as_deref() {
            None => Ok(Mode::default()),
            Some(raw) => Mode::from_str_ci(raw).ok_or_else(|| {
                McpError::invalid_params(
                    format!("unknown mode '{raw}' (expected last, first or collect)"),
                    None,
                )
            }),
        }
    }
}

#[derive(Clone)]
pub struct BridgeServer {
    settings: Arc<Settings>,
    bridge: Bridge,
    permits: Arc<Semaphore>,
}

impl BridgeServer {
    pub fn new(settings: Settings) -> Self {
        let bridge = Bridge::new(settings.bridge_config());
        let permits = Arc::new(Semaphore::new(settings.max_concurrent));
        Self {
            settings: Arc::new(settings),
            bridge,
            permits,
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Serve over stdin/stdout until the client disconnects.
    pub async fn serve_stdio(self) -> Result<()> {
        tracing::info!(
            name = %self.settings.server_name,
            version = %self.settings.server_version,
            target = self.settings.target.as_deref().unwrap_or("<none>"),
            "starting MCP bridge server on stdio"
        );
        let service = self
            .serve(rmcp::transport::stdio())
            .await
            .context("Failed to initialize MCP session")?;
        let reason = service.waiting().await.context("MCP session task failed")?;
        tracing::info!(?reason, "MCP session ended");
        Ok(())
    }

    /// The tools advertised by `tools/list`.
    pub fn tool_definitions(&self) -> Vec<Tool> {
        let args_help = match &self.settings.target {
            Some(t) => format!("Arguments appended to '{t}' (shell-style quoting)."),
            None => "Full command line to run (shell-style quoting).".to_string(),
        };
        let schema = serde_json::json!({
            "type": "object",
            "properties": {
                "args": { "type": "string", "description": args_help },
                "mode": {
                    "type": "string",
                    "enum": ["last", "first", "collect"],
                    "default": "last",
                    "description": "Reduce output to the last line, the first line (stops the command), or all lines."
                },
                "timeout_secs": {
                    "type": "integer",
                    "minimum": 1,
                    "description": "Override the wait ceiling for this call."
                }
            }
        });
        let schema = match schema {
            serde_json::Value::Object(map) => map,
            _ => JsonObject::new(),
        };
        vec![Tool::new(
            RUN_COMMAND_TOOL,
            "Run a command to completion and return its output.",
            Arc::new(schema),
        )]
    }

    fn command_for(&self, params: &RunCommandParams) -> Result<CommandSpec, McpError> {
        let args = params.args.as_deref().unwrap_or("");
        let spec = match &self.settings.target {
            Some(t) => parse_target(t).and_then(|base| base.with_args(args)),
            None => parse_target(args),
        };
        spec.map_err(|e| McpError::invalid_params(format!("{e:#}"), None))
    }

    fn bridge_for(&self, params: &RunCommandParams) -> Result<Bridge, McpError> {
        match params.timeout_secs {
            None => Ok(self.bridge.clone()),
            Some(0) => Err(McpError::invalid_params(
                "timeout_secs must be at least 1",
                None,
            )),
            Some(secs) => Ok(Bridge::new(BridgeConfig {
                ceiling: Duration::from_secs(secs),
                ..*self.bridge.config()
            })),
        }
    }

    /// Execute one `run_command` call; `interrupt` abandons the wait.
    pub async fn run_tool(
        &self,
        params: RunCommandParams,
        interrupt: Interrupt,
    ) -> Result<CallToolResult, McpError> {
        let spec = self.command_for(&params)?;
        let mode = params.mode()?;
        let bridge = self.bridge_for(&params)?;

        let permit = self
            .permits
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| McpError::internal_error("server is shutting down", None))?;
        let runtime = tokio::runtime::Handle::current();
        let label = spec.to_string();
        tracing::debug!(command = %label, %mode, "run_command");

        let outcome = tokio::task::spawn_blocking(move || {
            let _permit = permit;
            bridge.run_interruptible(
                ProcessCommand::new(spec, runtime),
                normalize_line,
                mode.strategy(&label),
                &interrupt,
            )
        })
        .await
        .map_err(|e| McpError::internal_error(format!("bridge task failed: {e}"), None))?;

        Ok(match outcome {
            Ok(text) => CallToolResult::success(vec![Content::text(text)]),
            Err(e) => CallToolResult::error(vec![Content::text(format!("{}: {e}", e.kind()))]),
        })
    }
}

impl ServerHandler for BridgeServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::V_2024_11_05,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation {
                name: self.settings.server_name.clone(),
                version: self.settings.server_version.clone(),
                ..Implementation::from_build_env()
            },
            instructions: Some(
                "Call run_command to execute a command and receive its output once it finishes."
                    .to_string(),
            ),
        }
    }

    async fn list_tools(
        &self,
        _request: Option<PaginatedRequestParam>,
        _context: RequestContext<RoleServer>,
    ) -> Result<ListToolsResult, McpError> {
        Ok(ListToolsResult {
            next_cursor: None,
            tools: self.tool_definitions(),
        })
    }

    async fn call_tool(
        &self,
        request: CallToolRequestParam,
        context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, McpError> {
        if request.name != RUN_COMMAND_TOOL {
            return Err(McpError::invalid_params(
                format!("unknown tool: {}", request.name),
                None,
            ));
        }
        let params = RunCommandParams::from_arguments(request.arguments)?;

        let interrupt = Interrupt::new();
        let watcher = {
            let interrupt = interrupt.clone();
            let ct = context.ct.clone();
            tokio::spawn(async move {
                ct.cancelled().await;
                tracing::debug!("client cancelled run_command");
                interrupt.trigger();
            })
        };
        let result = self.run_tool(params, interrupt).await;
        watcher.abort();
        result
    }
}

/*!
`serve.rs`

Implements the `serve` subcommand: expose the bridge as an MCP server over
stdio with a single `run_command` tool.

  mcp-bridge -t docker serve
  mcp-bridge -c bridge.yaml serve --server-name ops --max-concurrent 8

Flags given here override the config file and environment.
*/

use anyhow::{Context, Result};
use clap::Args;

use crate::config::Settings;
use crate::mcp::BridgeServer;

#[derive(Args, Debug, Default)]
pub struct ServeArgs {
    /// Name reported during MCP initialization
    #[arg(long, value_name = "NAME")]
    pub server_name: Option<String>,

    /// Version reported during MCP initialization
    #[arg(long, value_name = "VERSION")]
    pub server_version: Option<String>,

    /// Maximum number of commands running at once
    #[arg(long, value_name = "N")]
    pub max_concurrent: Option<usize>,
}

impl ServeArgs {
    /// Fold these flags into `settings`.
    pub fn apply(&self, settings: &mut Settings) {
        if let Some(name) = &self.server_name {
            settings.server_name = name.clone();
        }
        if let Some(version) = &self.server_version {
            settings.server_version = version.clone();
        }
        if let Some(n) = self.max_concurrent {
            settings.max_concurrent = n;
        }
    }
}

pub fn execute_serve(args: ServeArgs, mut settings: Settings) -> Result<()> {
    args.apply(&mut settings);
    settings.validate()?;

    let rt = tokio::runtime::Runtime::new().context("Failed to create Tokio runtime")?;
    rt.block_on(BridgeServer::new(settings).serve_stdio())
}

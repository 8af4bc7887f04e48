/*!
`run.rs`

Implements the `run` subcommand: execute the target command line once
through the async bridge and print the reduced result.

  mcp-bridge -t docker run ps --format '{{.Names}}' --mode collect
  mcp-bridge run --mode first -- tail -f /var/log/syslog

Ctrl-C interrupts the wait (the child is left to the runtime shutdown).

JSON Success Output:
{
  "status": "ok",
  "target": "docker ps",
  "mode": "collect",
  "elapsed_ms": 42,
  "result": "web\ndb"
}

JSON Error Output:
{
  "status": "error",
  "error_kind": "timeout|execution|strategy|interrupted",
  "error": "message"
}
*/

use anyhow::{Context, Result};
use clap::Args;
use std::time::Instant;

use super::format::{Role, StyleOptions, box_header, color, emoji};
use super::mode::{Mode, normalize_line};
use crate::bridge::{Bridge, BridgeError, Interrupt};
use crate::command::{CommandSpec, ProcessCommand, parse_target};
use crate::config::Settings;

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Arguments appended to the target (or the whole command line if no target is set)
    #[arg(value_name = "ARGS", trailing_var_arg = true, allow_hyphen_values = true)]
    pub args: Vec<String>,

    /// How output lines are reduced to one result
    #[arg(short, long, value_enum, default_value_t = Mode::Last)]
    pub mode: Mode,

    /// Output JSON
    #[arg(long)]
    pub json: bool,
}

pub fn execute_run(args: RunArgs, settings: &Settings) -> Result<()> {
    let spec = match resolve_command(settings.target.as_deref(), &args.args) {
        Ok(spec) => spec,
        Err(e) => return output_error(args.json, "usage", &e.to_string()),
    };

    let rt = tokio::runtime::Runtime::new().context("Failed to create Tokio runtime")?;
    let interrupt = Interrupt::new();
    let on_ctrl_c = interrupt.clone();
    rt.spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("interrupted; abandoning wait");
            on_ctrl_c.trigger();
        }
    });

    let bridge = Bridge::new(settings.bridge_config());
    let label = spec.to_string();
    let started = Instant::now();
    let outcome = bridge.run_interruptible(
        ProcessCommand::new(spec, rt.handle().clone()),
        normalize_line,
        args.mode.strategy(&label),
        &interrupt,
    );
    let elapsed_ms = started.elapsed().as_millis();
    rt.shutdown_background();

    match outcome {
        Ok(result) => {
            output_success(&args, &label, elapsed_ms, &result);
            Ok(())
        }
        Err(e) => output_bridge_error(args.json, &e),
    }
}

/// Combine the configured target with positional arguments.
pub(crate) fn resolve_command(target: Option<&str>, extra: &[String]) -> Result<CommandSpec> {
    match target {
        Some(t) => Ok(parse_target(t)?.with_arg_list(extra)),
        None => {
            let Some((program, rest)) = extra.split_first() else {
                anyhow::bail!("no command given (use --target, BRIDGE_TARGET, or pass a command line)");
            };
            Ok(CommandSpec {
                original: extra.join(" "),
                program: program.clone(),
                args: rest.to_vec(),
            })
        }
    }
}

fn output_success(args: &RunArgs, target: &str, elapsed_ms: u128, result: &str) {
    if args.json {
        let body = serde_json::json!({
            "status": "ok",
            "target": target,
            "mode": args.mode.to_string(),
            "elapsed_ms": elapsed_ms,
            "result": result,
        });
        println!(
            "{}",
            serde_json::to_string_pretty(&body).unwrap_or_else(|_| body.to_string())
        );
        return;
    }

    let style = StyleOptions::detect();
    println!(
        "{}",
        box_header(
            format!("{} {}", emoji("success", &style), target),
            Some(format!("mode={} • {elapsed_ms} ms", args.mode)),
            &style,
        )
    );
    if result.is_empty() {
        println!(
            "{}",
            color(Role::Dim, format!("{} (no output)", emoji("info", &style)), &style)
        );
    } else {
        println!("{result}");
    }
}

fn output_bridge_error(json: bool, err: &BridgeError) -> Result<()> {
    output_error(json, err.kind(), &err.to_string())
}

fn output_error(json: bool, kind: &str, msg: &str) -> Result<()> {
    if json {
        let err = serde_json::json!({"status":"error","error_kind":kind,"error":msg});
        println!(
            "{}",
            serde_json::to_string_pretty(&err).unwrap_or_else(|_| err.to_string())
        );
    } else {
        let style = StyleOptions::detect();
        let title = format!("{} Run Error ({kind})", emoji("error", &style));
        println!("{}", box_header(title, Some(color(Role::Error, msg, &style)), &style));
        if kind == "timeout" {
            println!(
                "{} {}",
                emoji("clock", &style),
                color(
                    Role::Dim,
                    "Raise --timeout or pick --mode first for commands that never exit.",
                    &style
                )
            );
        }
    }
    anyhow::bail!(msg.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn target_plus_args() {
        let spec = resolve_command(Some("docker"), &strings(&["ps", "-a"])).unwrap();
        assert_eq!(spec.program, "docker");
        assert_eq!(spec.args, vec!["ps", "-a"]);
    }

    #[test]
    fn args_alone_form_command() {
        let spec = resolve_command(None, &strings(&["echo", "hi there"])).unwrap();
        assert_eq!(spec.program, "echo");
        assert_eq!(spec.args, vec!["hi there"], "already split args are kept verbatim");
    }

    #[test]
    fn nothing_to_run() {
        let err = resolve_command(None, &[]).unwrap_err();
        assert!(err.to_string().contains("no command"));
    }

    #[test]
    fn json_error_output_still_fails() {
        let err = output_error(true, "timeout", "took too long").unwrap_err();
        assert_eq!(err.to_string(), "took too long");
    }
}

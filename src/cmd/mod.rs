/*!
Subcommand dispatcher module.

Layout:
  src/cmd/
    mod.rs     (this file)
    mode.rs    (Mode enum: last / first / collect -> strategies)
    format.rs  (boxed headers, color, emoji for human output)
    run.rs     (RunArgs   + execute_run)
    serve.rs   (ServeArgs + execute_serve)

Conventions:
  - Each subcommand module exposes exactly one public `execute_*` function
    that returns `anyhow::Result<()>`.
  - Argument structs derive `clap::Args` and are kept minimal.
*/

pub mod format;
pub mod mode;
pub mod run;
pub mod serve;

pub use mode::Mode;
pub use run::{RunArgs, execute_run};
pub use serve::{ServeArgs, execute_serve};

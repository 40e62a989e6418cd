//! Entry point wiring: parses the CLI surface, initialises tracing, and
//! either lists the built-in presets or assembles an `EngineConfig` and
//! hands it to the renderer.

mod cli;
mod defaults;
mod manifest;
mod run;

use anyhow::Result;
use cli::Command;

fn main() -> Result<()> {
    let cli = cli::parse();
    run::initialise_tracing();

    match cli.command {
        Some(Command::Presets) => run::list_presets(),
        None => run::run(cli.run),
    }
}

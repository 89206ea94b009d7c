mod command;
mod logging;
mod repl;

use std::env;
use std::path::PathBuf;

use anyhow::{Context, Result};
use dapmux_config::{load_config, Config, DefaultPaths};
use dapmux_engine::DebugEngine;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tracing::{error, info, warn};

use crate::command::parse_line;
use crate::repl::{Flow, Repl};

/// Read commands from `input` until `quit` or end of input.
async fn command_loop<R: AsyncBufRead + Unpin>(repl: &Repl, input: R) -> Result<()> {
    let mut lines = input.lines();
    while let Some(raw) = lines.next_line().await.context("failed to read a command")? {
        let line = match parse_line(&raw) {
            Ok(Some(line)) => line,
            Ok(None) => continue,
            Err(message) => {
                println!("{}", serde_json::json!({ "error": message }));
                continue;
            }
        };
        match repl.execute(line).await {
            Ok(Flow::Print(value)) => println!("{value}"),
            Ok(Flow::Quit) => break,
            Err(e) => {
                warn!("command failed: {e:#}");
                println!("{}", serde_json::json!({ "error": format!("{e:#}") }));
            }
        }
    }
    Ok(())
}

async fn run(script: Option<PathBuf>) -> Result<()> {
    let paths = DefaultPaths::new().context("failed to detect platform paths")?;
    let project_dir = env::current_dir().ok();
    let config = load_config(&paths.config_dir(), project_dir.as_deref());

    // Logging follows the config, so a load failure is reported once the
    // subscriber is up.
    let (config, load_error) = match config {
        Ok(config) => (config, None),
        Err(e) => (Config::default(), Some(e)),
    };
    let log_path = logging::init(&config.log, &paths)?;
    if let Some(e) = load_error {
        error!("config load failed, using defaults: {e}");
        eprintln!("dapmux: config load failed, using defaults: {e}");
    }
    info!(log = %log_path.display(), "dapmux starting");

    let repl = Repl::new(DebugEngine::new(config));
    let result = match script {
        Some(path) => {
            let file = tokio::fs::File::open(&path)
                .await
                .with_context(|| format!("failed to open {}", path.display()))?;
            command_loop(&repl, BufReader::new(file)).await
        }
        None => command_loop(&repl, BufReader::new(tokio::io::stdin())).await,
    };
    repl.engine().stop_all().await;
    info!("dapmux exiting");
    result
}

fn main() {
    let script = env::args().nth(1).map(PathBuf::from);

    let outcome = tokio::runtime::Runtime::new()
        .context("failed to start the async runtime")
        .and_then(|runtime| runtime.block_on(run(script)));
    if let Err(e) = outcome {
        eprintln!("dapmux: {:#}", e);
        std::process::exit(1);
    }
}

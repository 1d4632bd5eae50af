use std::sync::Arc;

use agent_sandbox::cli::ConsolePrompt;
use agent_sandbox::core::{ExecutionReport, ExecutionRequest};
use agent_sandbox::hold::ExecMode;
use agent_sandbox::logging;
use agent_sandbox::Sandbox;
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging system
    let _guard = logging::init_logging()?;

    tracing::info!("=== Sandbox Demo Starting ===");

    let mut args: Vec<String> = std::env::args().skip(1).collect();
    let mode = if args.first().map(String::as_str) == Some("--hold") {
        args.remove(0);
        ExecMode::Hold
    } else {
        ExecMode::Release
    };
    if args.is_empty() {
        anyhow::bail!("Usage: sandbox-demo [--hold] <command...>");
    }
    let command = args.join(" ");
    let cwd = std::env::current_dir()?;

    let sandbox = Sandbox::new()
        .with_mode(mode)
        .with_handler(Arc::new(ConsolePrompt::new()));

    // Ctrl-C aborts the running command through the cancellation token
    let cancel = CancellationToken::new();
    let ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            ctrl_c.cancel();
        }
    });

    let request = ExecutionRequest::new(&command, &cwd);
    match sandbox.execute(request, &cancel).await? {
        ExecutionReport::Denied(refusal) => {
            eprintln!("Denied [{}]: {}", refusal.permission, refusal.reason);
        }
        ExecutionReport::Completed(outcome) => {
            print!("{}", outcome.output);
            if outcome.timed_out {
                eprintln!("(timed out)");
            }
            if outcome.aborted {
                eprintln!("(aborted)");
            }
            if outcome.killed_for_size {
                eprintln!("(output limit exceeded)");
            }
            tracing::info!("Command finished with exit code {:?}", outcome.exit_code);
        }
    }

    tracing::info!("=== Sandbox Demo Shutting Down ===");

    Ok(())
}

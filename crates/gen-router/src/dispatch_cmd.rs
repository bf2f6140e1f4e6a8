use std::io::Read;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use tracing::info;

use gr_config::{RouterConfig, validate_loaded_config};
use gr_core::{OutputFormat, Policy, RouterError, Turn};
use gr_executor::{CancellationToken, DispatchRequest, Dispatcher, HttpTransport};
use gr_scheduler::InMemoryCooldownStore;
use gr_session::ExpectedShape;

pub(crate) struct DispatchArgs {
    pub policy: Policy,
    pub shape: String,
    pub allow_extra: bool,
    pub history: Option<String>,
    pub system: Option<String>,
    pub cd: Option<String>,
    pub input: Option<String>,
}

/// Handle `gr dispatch`.
pub(crate) async fn handle_dispatch(args: DispatchArgs, format: OutputFormat) -> Result<()> {
    let project_root = crate::determine_project_root(args.cd.as_deref())?;
    let config = RouterConfig::load_or_default(&project_root)?;
    validate_loaded_config(&config)?;

    let mut shape: ExpectedShape = args
        .shape
        .parse()
        .map_err(|e: String| anyhow::anyhow!("Invalid --shape: {e}"))?;
    if args.allow_extra {
        shape = shape.allow_extra_fields();
    }

    let history = match &args.history {
        Some(path) => read_history(path)?,
        None => Vec::new(),
    };
    let input = match args.input {
        Some(input) => input,
        None => read_stdin()?,
    };
    if input.trim().is_empty() {
        bail!("Input is empty; pass it as an argument or on stdin");
    }

    let mut request = DispatchRequest::new(args.policy, input, shape).with_history(history);
    if let Some(system) = args.system {
        request = request.with_system(system);
    }

    let transport = Arc::new(HttpTransport::from_config(&config)?);
    let cooldowns = Arc::new(InMemoryCooldownStore::with_system_clock());
    let dispatcher = Dispatcher::from_config(&config, transport, cooldowns);

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("interrupt received; cancelling dispatch");
            trigger.cancel();
        }
    });

    match dispatcher.dispatch(&request, &cancel).await {
        Ok(dispatched) => {
            match format {
                OutputFormat::Json => {
                    println!("{}", serde_json::to_string_pretty(&dispatched)?);
                }
                OutputFormat::Text => {
                    println!("{}", serde_json::to_string_pretty(&dispatched.payload)?);
                    eprintln!(
                        "Answered by {} after {} attempt(s).",
                        dispatched.endpoint,
                        dispatched.attempts.len()
                    );
                }
            }
            Ok(())
        }
        Err(err) => {
            report_failure(&err, &format)?;
            std::process::exit(exit_code(&err));
        }
    }
}

fn report_failure(err: &RouterError, format: &OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => {
            let output = serde_json::json!({
                "error": err.kind(),
                "http_status": err.http_status(),
                "message": err.user_message(),
                "tried": err.tried(),
                "retry_after_secs": err.retry_after_secs(),
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        OutputFormat::Text => {
            eprintln!("Error: {err}");
            eprintln!("{}", err.user_message());
            if let Some(secs) = err.retry_after_secs() {
                eprintln!("Retry after: {secs}s");
            }
        }
    }
    Ok(())
}

/// 130 mirrors the shell convention for SIGINT.
fn exit_code(err: &RouterError) -> i32 {
    match err {
        RouterError::Cancelled { .. } => 130,
        RouterError::ExhaustedAllEndpoints { .. } => 1,
    }
}

fn read_history(path: &str) -> Result<Vec<Turn>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read history file: {path}"))?;
    serde_json::from_str(&content).with_context(|| format!("Failed to parse history file: {path}"))
}

fn read_stdin() -> Result<String> {
    let mut buffer = String::new();
    std::io::stdin()
        .read_to_string(&mut buffer)
        .context("Failed to read input from stdin")?;
    Ok(buffer)
}

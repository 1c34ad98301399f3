use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use piper_gateway::{
    connect_ws_issuer, demo_method_dispatcher, run_gateway_server, ServeConfig,
    METHOD_APPEND_SUFFIX, METHOD_MAKE_GREETING,
};
use piper_session::MethodDispatcher;
use piper_wire::Param;
use serde_json::json;
use tracing_subscriber::{filter::LevelFilter, EnvFilter};

#[derive(Debug, Parser)]
#[command(name = "piper", about = "Promise-pipelined call demo over a WebSocket gateway")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the gateway with the demo methods registered.
    Serve {
        #[arg(long, env = "PIPER_BIND", default_value = "127.0.0.1:8790")]
        bind: String,
    },
    /// Connect to a gateway and run the pipelined greeting scenario.
    Demo {
        #[arg(long, env = "PIPER_URL", default_value = "ws://127.0.0.1:8790/ws")]
        url: String,
        #[arg(long, default_value = "Alice")]
        name: String,
        #[arg(long, default_value = "!!!")]
        suffix: String,
    },
}

fn init_tracing() {
    let env_filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::WARN.into())
        .from_env_lossy();

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .compact()
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    match cli.command {
        Command::Serve { bind } => run_serve_command(bind).await,
        Command::Demo { url, name, suffix } => run_demo_command(url, name, suffix).await,
    }
}

async fn run_serve_command(bind: String) -> Result<()> {
    let dispatcher = Arc::new(demo_method_dispatcher());
    run_gateway_server(ServeConfig { bind }, dispatcher).await
}

async fn run_demo_command(url: String, name: String, suffix: String) -> Result<()> {
    // The demo registers no methods of its own; it only issues calls.
    let (issuer, driver_task) = connect_ws_issuer(&url, Arc::new(MethodDispatcher::new())).await?;

    // The second call references the first call's not-yet-available result,
    // so both frames go out before any reply comes back.
    let greeting = issuer.call_pipelined(METHOD_MAKE_GREETING, vec![Param::literal(json!(name))])?;
    let decorated = issuer.call_pipelined(
        METHOD_APPEND_SUFFIX,
        vec![Param::Reference(greeting), Param::literal(json!(suffix))],
    )?;

    let decorated_value = issuer.await_reference(decorated).await?;
    let greeting_value = issuer.await_reference(greeting).await?;
    println!("greeting:  {greeting_value}");
    println!("decorated: {decorated_value}");

    driver_task.abort();
    Ok(())
}

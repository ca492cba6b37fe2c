//! relayq CLI — seed weighted channels and drain them with a worker.

use std::sync::Arc;

use clap::Parser;
use serde_json::json;
use tracing_subscriber::EnvFilter;

use relayq::config::Config;
use relayq::error::HandlerError;
use relayq::event::TracingObserver;
use relayq::payload::Payload;
use relayq::queue::{AggregateQueue, MemoryQueue, QueueDriver};
use relayq::worker::{PayloadHandler, Worker};

#[derive(Parser)]
#[command(name = "relayq", about = "Durable work-queue demo worker")]
struct Cli {
    /// Payloads to seed into each channel
    #[arg(long, default_value_t = 10)]
    jobs: u32,
    /// Seed for deterministic channel selection and uid assignment
    #[arg(long)]
    seed: Option<u64>,
}

/// Executes `{"fun": ..., "args": [...]}` payloads.
struct EchoHandler;

#[async_trait::async_trait]
impl PayloadHandler for EchoHandler {
    async fn handle(&self, content: &serde_json::Value) -> Result<(), HandlerError> {
        let Some(fun) = content.get("fun").and_then(|v| v.as_str()) else {
            return Err(HandlerError::Invalid(
                "payload carries no function tag".to_string(),
            ));
        };
        let args = content
            .get("args")
            .and_then(|v| v.as_array())
            .cloned()
            .unwrap_or_default();

        match fun {
            "echo" => {
                let line: Vec<String> = args.iter().map(render_arg).collect();
                println!("{}", line.join(" "));
                Ok(())
            }
            other => Err(HandlerError::Invalid(format!("unknown function: {other}"))),
        }
    }
}

fn render_arg(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    let config = Config::from_env()?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config.log_level.clone())),
        )
        .init();

    let mut queue = match cli.seed {
        Some(seed) => AggregateQueue::with_seed(seed),
        None => AggregateQueue::new(),
    };
    let mail = match cli.seed {
        Some(seed) => Arc::new(MemoryQueue::with_seed(seed)),
        None => Arc::new(MemoryQueue::new()),
    };
    let sync = match cli.seed {
        Some(seed) => Arc::new(MemoryQueue::with_seed(seed.wrapping_add(1))),
        None => Arc::new(MemoryQueue::new()),
    };
    queue.add_queue("mail", mail, 0.1)?;
    queue.add_queue("sync", sync, 0.9)?;

    for i in 0..cli.jobs {
        queue
            .push(
                Payload::new(json!({"fun": "echo", "args": [format!("mail job {i}")]})).into(),
                Some("mail"),
            )
            .await?;
        queue
            .push(
                Payload::new(json!({"fun": "echo", "args": [format!("sync job {i}")]})).into(),
                Some("sync"),
            )
            .await?;
    }

    let mut worker = Worker::new(config.worker_id.clone(), queue, Arc::new(EchoHandler))
        .with_config(config.worker_config())
        .observe(Arc::new(TracingObserver));

    let processed = worker.run_until_empty().await?;
    tracing::info!(processed, "drain complete");
    Ok(())
}

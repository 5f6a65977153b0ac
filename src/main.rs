//! Command-line interface for kaftail
//!
//! # Usage Examples
//!
//! ```bash
//! # Follow a topic interactively (only new messages)
//! kaftail consume --brokers localhost:9092 --topic events
//!
//! # Everything from the beginning, then exit
//! kaftail consume --brokers localhost:9092 --topic events \
//!   --from-beginning --exit --print-key --print-partitions
//!
//! # The last 50 messages per partition, oldest first
//! kaftail consume --brokers localhost:9092 --topic events --tail 50
//!
//! # Consumer-group streaming with schema-registry decoding
//! kaftail consume --brokers localhost:9092 --topic orders \
//!   --group billing --schema-registry-url http://localhost:8081 \
//!   --output json
//!
//! # Bare protobuf decoding from a .proto file
//! kaftail consume --brokers localhost:9092 --topic orders \
//!   --proto-file order.proto --value-proto-type Order
//! ```

use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use kaftail::sink::{JsonSink, PrintOpts, TextSink};
use kaftail_broker::{BrokerConfig, KafkaBroker};
use kaftail_codec::RegistryConfig;
use kaftail_consume::{ConsumeFlags, OutputFormat, Sink};
use tokio_util::sync::CancellationToken;

#[derive(Parser)]
#[command(name = "kaftail")]
#[command(about = "A command-line consumer for Kafka topics with schema-aware decoding")]
#[command(long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Consume messages from a topic
    Consume {
        /// Broker connection options
        #[command(flatten)]
        broker: BrokerConfig,

        /// Schema registry options
        #[command(flatten)]
        registry: RegistryConfig,

        /// Consumption options
        #[command(flatten)]
        flags: ConsumeFlags,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if let Err(e) = run().await {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
    Ok(())
}

async fn run() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Consume {
            broker,
            registry,
            flags,
        } => {
            let client = KafkaBroker::connect(broker, flags.isolation_level)
                .context("Failed to create Kafka client")?;
            let (key_chain, value_chain) =
                kaftail::build_chains(&flags, &registry).context("Failed to set up decoding")?;

            // Ctrl-C drives the orchestrator's shutdown sequence
            let shutdown = CancellationToken::new();
            let interrupt = shutdown.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    tracing::info!("interrupt received, shutting down");
                    interrupt.cancel();
                }
            });

            let opts = PrintOpts::from(&flags);
            let mut sink: Box<dyn Sink> = match flags.output {
                OutputFormat::Text => Box::new(TextSink::new(opts)),
                OutputFormat::Json => Box::new(JsonSink::new(opts)),
            };

            kaftail_consume::run(
                Arc::new(client),
                &flags,
                key_chain,
                value_chain,
                sink.as_mut(),
                shutdown,
            )
            .await?;
        }
    }

    Ok(())
}

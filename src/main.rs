use clap::{Parser, ValueEnum};
use serde::Serialize;
use std::net::SocketAddr;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use knight_path::board::find_shortest_path_str;
use knight_path::config::{ProcessorConfig, ServiceConfig};
use knight_path::node::Node;
use knight_path::shutdown::cancel_on_signal;

#[derive(Parser, Debug)]
#[command(name = "knight-path")]
#[command(version)]
#[command(about = "Shortest knight paths computed through an asynchronous job pipeline")]
#[command(propagate_version = true)]
struct Args {
    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Start the HTTP API and the change-feed processors
    Serve(ServeArgs),

    /// Compute a path locally without the pipeline
    Solve {
        /// Start square, e.g. A1
        start: String,

        /// End square, e.g. H8
        end: String,

        /// Output format
        #[arg(long, short = 'o', default_value = "table")]
        output: OutputFormat,
    },
}

// =============================================================================
// Serve Arguments
// =============================================================================

#[derive(Parser, Debug)]
struct ServeArgs {
    /// Address to bind the HTTP API to
    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    /// Port for the HTTP API
    #[arg(long, default_value = "7071")]
    port: u16,

    /// Number of processor workers (one change-feed partition each)
    #[arg(long, default_value = "1")]
    workers: usize,

    /// Maximum changes per batch
    #[arg(long, default_value = "100")]
    batch_size: usize,

    /// Maximum requests computed concurrently within a batch
    #[arg(long, default_value = "8")]
    max_concurrency: usize,

    /// Deliveries of a failing batch before it is given up on (store outages excepted)
    #[arg(long, default_value = "5")]
    max_delivery_attempts: u32,

    /// Capacity of the in-memory request store
    #[arg(long, default_value = "100000")]
    max_requests: usize,
}

#[derive(Debug, Clone, ValueEnum)]
enum OutputFormat {
    Table,
    Json,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SolveOutput {
    start_position: String,
    end_position: String,
    shortest_path: Vec<String>,
    number_of_moves: usize,
}

fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();
}

async fn run_serve(args: ServeArgs) -> Result<(), Box<dyn std::error::Error>> {
    init_logging();

    let listen_addr: SocketAddr = format!("{}:{}", args.host, args.port).parse()?;
    let processor = ProcessorConfig {
        batch_size: args.batch_size,
        max_concurrency: args.max_concurrency,
        max_delivery_attempts: args.max_delivery_attempts,
        ..ProcessorConfig::default()
    };
    let config = ServiceConfig {
        max_requests: args.max_requests,
        ..ServiceConfig::new(listen_addr)
    }
    .with_workers(args.workers)
    .with_processor(processor);

    tracing::info!(
        listen_addr = %config.listen_addr,
        workers = config.workers,
        batch_size = config.processor.batch_size,
        max_concurrency = config.processor.max_concurrency,
        "Starting knight-path service"
    );

    let shutdown = CancellationToken::new();
    cancel_on_signal(shutdown.clone());

    Node::new(config).run(shutdown).await?;
    tracing::info!("Service stopped");
    Ok(())
}

fn run_solve(start: &str, end: &str, output: &OutputFormat) -> Result<(), Box<dyn std::error::Error>> {
    let path = find_shortest_path_str(start, end)?;
    let squares: Vec<String> = path.iter().map(|p| p.to_string()).collect();
    let moves = squares.len().saturating_sub(1);

    match output {
        OutputFormat::Json => {
            let out = SolveOutput {
                start_position: start.to_string(),
                end_position: end.to_string(),
                shortest_path: squares,
                number_of_moves: moves,
            };
            println!("{}", serde_json::to_string_pretty(&out)?);
        }
        OutputFormat::Table => {
            println!("From:  {}", start);
            println!("To:    {}", end);
            println!("Moves: {}", moves);
            println!("Path:  {}", squares.join(" -> "));
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    match args.command {
        Commands::Serve(serve_args) => run_serve(serve_args).await?,
        Commands::Solve { start, end, output } => run_solve(&start, &end, &output)?,
    }

    Ok(())
}

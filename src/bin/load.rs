//! Load generator for a running columnkv server
//!
//! Opens many concurrent connections, writes disjoint keys, reads them back
//! and reports throughput and latency percentiles for each phase.

use clap::Parser;
use columnkv::Client;
use std::time::{Duration, Instant};

#[derive(Parser, Debug)]
#[command(author, version, about = "columnkv load generator", long_about = None)]
struct Args {
    /// Server address
    #[arg(long, default_value = "127.0.0.1:8080")]
    addr: String,

    /// Concurrent client connections
    #[arg(long, default_value_t = 100)]
    clients: usize,

    /// Requests per client and phase
    #[arg(long, default_value_t = 1000)]
    requests: usize,

    /// Auth token, when the server requires one
    #[arg(long)]
    token: Option<String>,
}

#[derive(Debug)]
struct LoadResults {
    operation: &'static str,
    total_operations: usize,
    duration: Duration,
    ops_per_second: f64,
    avg_latency_ms: f64,
    p95_latency_ms: f64,
    p99_latency_ms: f64,
}

impl LoadResults {
    fn new(operation: &'static str, duration: Duration, latencies: &mut [Duration]) -> Self {
        latencies.sort();

        let total_operations = latencies.len();
        let ops_per_second = total_operations as f64 / duration.as_secs_f64();
        let avg_latency_ms = if latencies.is_empty() {
            0.0
        } else {
            latencies.iter().map(|d| d.as_secs_f64() * 1000.0).sum::<f64>() / total_operations as f64
        };

        let percentile = |p: f64| {
            let index = (total_operations as f64 * p) as usize;
            latencies.get(index).unwrap_or(&Duration::ZERO).as_secs_f64() * 1000.0
        };

        Self {
            operation,
            total_operations,
            duration,
            ops_per_second,
            avg_latency_ms,
            p95_latency_ms: percentile(0.95),
            p99_latency_ms: percentile(0.99),
        }
    }

    fn print(&self) {
        println!("=== {} ===", self.operation);
        println!("Total operations: {}", self.total_operations);
        println!("Duration: {:.2}s", self.duration.as_secs_f64());
        println!("Throughput: {:.2} ops/sec", self.ops_per_second);
        println!("Average latency: {:.2}ms", self.avg_latency_ms);
        println!("P95 latency: {:.2}ms", self.p95_latency_ms);
        println!("P99 latency: {:.2}ms", self.p99_latency_ms);
        println!();
    }
}

#[derive(Clone, Copy, PartialEq)]
enum Phase {
    Set,
    Lookup,
}

async fn connect(addr: &str, token: &Option<String>) -> columnkv::Result<Client> {
    let client = Client::connect(addr).await?;
    Ok(match token {
        Some(token) => client.with_auth_token(token.clone()),
        None => client,
    })
}

async fn run_phase(args: &Args, phase: Phase) -> anyhow::Result<LoadResults> {
    let mut handles = Vec::with_capacity(args.clients);
    let start = Instant::now();

    for client_id in 0..args.clients {
        let addr = args.addr.clone();
        let token = args.token.clone();
        let requests = args.requests;

        handles.push(tokio::spawn(async move {
            let mut client = connect(&addr, &token).await?;
            let mut latencies = Vec::with_capacity(requests);
            let mut mismatches = 0usize;

            for i in 0..requests {
                let key = format!("load_key_{}_{}", client_id, i);
                let value = format!("load_value_{}_{}", client_id, i);

                let op_start = Instant::now();
                match phase {
                    Phase::Set => client.set(&key, &value).await?,
                    Phase::Lookup => {
                        if client.lookup(&key).await?.as_deref() != Some(value.as_str()) {
                            mismatches += 1;
                        }
                    }
                }
                latencies.push(op_start.elapsed());
            }

            client.close().await?;
            Ok::<_, columnkv::ColumnKvError>((latencies, mismatches))
        }));
    }

    let mut all_latencies = Vec::with_capacity(args.clients * args.requests);
    let mut mismatches = 0;
    for handle in handles {
        let (latencies, bad) = handle.await??;
        all_latencies.extend(latencies);
        mismatches += bad;
    }

    if mismatches > 0 {
        println!("{} lookups returned an unexpected value", mismatches);
    }

    let name = match phase {
        Phase::Set => "SET",
        Phase::Lookup => "LOOKUP",
    };
    Ok(LoadResults::new(name, start.elapsed(), &mut all_latencies))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    println!("columnkv load test");
    println!("Server: {}", args.addr);
    println!("Clients: {}, requests per client: {}", args.clients, args.requests);
    println!();

    run_phase(&args, Phase::Set).await?.print();
    run_phase(&args, Phase::Lookup).await?.print();

    Ok(())
}

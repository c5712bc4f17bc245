//! Interactive line client for columnkv
//!
//! Forwards each typed line to the server and prints the reply. `EXIT`
//! closes the connection without sending a request.

use clap::Parser;
use columnkv::{tls, Client};
use std::io::{self, BufRead, Write};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about = "columnkv interactive client", long_about = None)]
struct Args {
    /// Commands carry an auth token: SET <token> <key> <value>, LOOKUP <token> <key>
    #[arg(long)]
    auth: bool,

    /// Connect over TLS
    #[arg(long)]
    tls: bool,

    /// CA bundle used to verify the server certificate
    #[arg(long, default_value = "./client.pem")]
    ca_cert: PathBuf,

    /// Server host
    address: String,

    /// Server port
    port: u16,
}

/// Reject lines that cannot be valid once a token is required
fn well_formed_with_auth(line: &str) -> bool {
    let parts: Vec<&str> = line.split_whitespace().collect();
    match parts.first().map(|verb| verb.to_uppercase()) {
        Some(verb) if verb == "SET" => parts.len() == 4,
        Some(verb) if verb == "LOOKUP" => parts.len() == 3,
        _ => true,
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let addr = format!("{}:{}", args.address, args.port);

    let mut client = if args.tls {
        let connector = tls::load_connector(&args.ca_cert)?;
        Client::connect_tls(&addr, &args.address, &connector).await?
    } else {
        Client::connect(&addr).await?
    };

    println!("Connected to server at {}", addr);
    if args.auth {
        println!("Authentication is enabled. Enter commands with auth token.");
        println!("Enter commands (SET <auth_token> <key> <value> or LOOKUP <auth_token> <key>)");
    } else {
        println!("Enter commands (SET <key> <value> or LOOKUP <key>)");
    }
    println!("Type 'EXIT' to terminate connection.");

    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();
    loop {
        print!("> ");
        io::stdout().flush()?;

        let line = match lines.next() {
            Some(line) => line?,
            None => break,
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line == "EXIT" {
            println!("Exiting...");
            break;
        }
        if args.auth && !well_formed_with_auth(line) {
            println!("Invalid command format. Use SET or LOOKUP with an auth token.");
            continue;
        }

        match client.send_line(line).await {
            Ok(reply) => println!("{}", reply),
            Err(e) => {
                eprintln!("Connection error: {}", e);
                break;
            }
        }
    }

    client.close().await.ok();
    Ok(())
}

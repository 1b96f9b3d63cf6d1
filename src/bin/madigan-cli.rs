use clap::{Parser, Subcommand};
use serde_json::Value;
use std::collections::HashMap;
use tokio::net::TcpStream;

use madigan_bridge::net::{read_frame, write_frame, FrameError, MAX_FRAME_LEN};
use madigan_bridge::protocol::{decode_bytes, Command, CompositeKey, Registration, Report};

#[derive(Parser)]
#[command(name = "madigan-cli")]
#[command(about = "Command line client for the Madigan bridge", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:17000")]
    url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the control list of a connected device
    Controls { context: String },
    /// Show the parameter description of a plugin
    Paraminfo { uri: String },
    /// Read a parameter value
    Get {
        context: String,
        #[arg(value_name = "TYPE")]
        kind: String,
        key: String,
        /// Wait up to this long for the device to report
        #[arg(long)]
        wait_ms: Option<u64>,
    },
    /// Write a parameter value
    Set {
        context: String,
        #[arg(value_name = "TYPE")]
        kind: String,
        key: String,
        value: String,
    },
    /// Show the most recent messages from a device
    State { id: String },
    /// Connect as a device and answer commands until interrupted
    Device {
        id: String,
        plugin: String,
        #[arg(short, long, default_value = "127.0.0.1:5555")]
        address: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();

    match cli.command {
        Commands::Controls { context } => {
            let res = client
                .get(format!("{}/controls", cli.url))
                .query(&[("context", context)])
                .send()
                .await?;
            print_json(res).await?;
        }
        Commands::Paraminfo { uri } => {
            let res = client
                .get(format!("{}/paraminfo", cli.url))
                .query(&[("uri", uri)])
                .send()
                .await?;
            print_json(res).await?;
        }
        Commands::Get {
            context,
            kind,
            key,
            wait_ms,
        } => {
            let mut query = vec![("context", context), ("type", kind), ("key", key)];
            if let Some(wait) = wait_ms {
                query.push(("wait_ms", wait.to_string()));
            }
            let res = client
                .get(format!("{}/madigan-parameter", cli.url))
                .query(&query)
                .send()
                .await?;
            print_text(res).await?;
        }
        Commands::Set {
            context,
            kind,
            key,
            value,
        } => {
            let res = client
                .patch(format!("{}/madigan-parameter", cli.url))
                .query(&[("context", context), ("type", kind), ("key", key), ("value", value)])
                .send()
                .await?;
            print_text(res).await?;
        }
        Commands::State { id } => {
            let res = client
                .get(format!("{}/madigan-state", cli.url))
                .query(&[("id", id)])
                .send()
                .await?;
            print_text(res).await?;
        }
        Commands::Device { id, plugin, address } => {
            emulate_device(&address, id, plugin).await?;
        }
    }

    Ok(())
}

/// Register as `id` and answer `get`/`set` commands with reports.
async fn emulate_device(
    address: &str,
    source: String,
    plugin: String,
) -> Result<(), Box<dyn std::error::Error>> {
    let stream = TcpStream::connect(address).await?;
    let (mut reader, mut writer) = stream.into_split();

    let registration = Registration { source, plugin };
    write_frame(&mut writer, registration.encode().as_bytes()).await?;
    println!("Registered as {} ({})", registration.source, registration.plugin);

    let mut values: HashMap<CompositeKey, String> = HashMap::new();
    loop {
        let payload = match read_frame(&mut reader, MAX_FRAME_LEN).await {
            Ok(payload) => payload,
            Err(FrameError::Closed) => {
                println!("Bridge closed the connection");
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        };
        if payload.is_empty() {
            continue;
        }

        let map = decode_bytes(&payload)?;
        let report = match Command::from_map(&map) {
            Some(Command::Set { key, value }) => {
                println!("set {key} = {value}");
                values.insert(key.clone(), value.clone());
                Report { key, value }
            }
            Some(Command::Get { key }) => {
                let value = values.get(&key).cloned().unwrap_or_default();
                println!("get {key} -> {value:?}");
                Report { key, value }
            }
            Some(Command::Raw { kind, key, value }) => {
                println!("raw {kind}/{key} = {value}");
                continue;
            }
            None => {
                eprintln!("Unrecognised message: {}", String::from_utf8_lossy(&payload));
                continue;
            }
        };
        write_frame(&mut writer, report.encode().as_bytes()).await?;
    }
}

async fn print_text(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    let text = res.text().await?;
    if !status.is_success() {
        eprintln!("Error: bridge returned status {}", status);
        eprintln!("Response: {}", text);
        return Ok(());
    }
    print!("{}", text);
    if !text.is_empty() && !text.ends_with('\n') {
        println!();
    }
    Ok(())
}

async fn print_json(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    if !status.is_success() {
        eprintln!("Error: bridge returned status {}", status);
        if let Ok(text) = res.text().await {
            eprintln!("Response: {}", text);
        }
        return Ok(());
    }

    let json: Value = res.json().await?;
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}

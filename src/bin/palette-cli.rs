use clap::{Parser, Subcommand};
use reqwest::StatusCode;
use serde_json::{json, Value};

const VERSION_HEADER: &str = "x-config-version";

#[derive(Parser)]
#[command(name = "palette-cli")]
#[command(about = "Management CLI for the palette server", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:8080")]
    url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the current palette
    Get,
    /// Print every palette change until interrupted
    Watch {
        /// Version to start from; defaults to whatever is current
        #[arg(long)]
        baseline: Option<u64>,
    },
    /// Publish a new palette
    Set {
        /// Comma-separated hex colors, e.g. FF0000,00FF00
        #[arg(long, value_delimiter = ',', required = true)]
        colors: Vec<String>,
        #[arg(long)]
        display_ms: i64,
        #[arg(long)]
        fadeout_ms: i64,
    },
    /// Show accepted colors and bounds
    Limits,
    /// Show server status
    Status,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();
    let colors_url = format!("{}/colors", cli.url);

    match cli.command {
        Commands::Get => {
            let res = client.get(&colors_url).send().await?;
            print_palette(res).await?;
        }
        Commands::Watch { baseline } => {
            let mut baseline = match baseline {
                Some(v) => v,
                None => {
                    let res = client.get(&colors_url).send().await?;
                    print_palette(res).await?.unwrap_or_default()
                }
            };
            loop {
                let res = client
                    .get(&colors_url)
                    .query(&[("hang", "1".to_string()), ("baseline", baseline.to_string())])
                    .send()
                    .await?;
                if !res.status().is_success() {
                    eprintln!("Error: server returned status {}", res.status());
                    tokio::time::sleep(std::time::Duration::from_secs(1)).await;
                    continue;
                }
                // A timeout answers with the baseline version; only a new
                // version is a change.
                let version = version_of(&res);
                if version.is_some() && version != Some(baseline) {
                    if let Some(version) = print_palette(res).await? {
                        baseline = version;
                    }
                }
            }
        }
        Commands::Set {
            colors,
            display_ms,
            fadeout_ms,
        } => {
            let payload = json!({
                "colors": colors,
                "display_duration_ms": display_ms,
                "fadeout_duration_ms": fadeout_ms,
            });
            let res = client.post(&colors_url).json(&payload).send().await?;
            let status = res.status();
            if status == StatusCode::OK {
                println!("Stored as version {}", version_of(&res).unwrap_or_default());
            } else {
                eprintln!("Error: server returned status {}", status);
                eprintln!("{}", res.text().await?.trim_end());
                std::process::exit(1);
            }
        }
        Commands::Limits => {
            let res = client.get(format!("{}/limits", cli.url)).send().await?;
            print_json(res).await?;
        }
        Commands::Status => {
            let res = client.get(format!("{}/status", cli.url)).send().await?;
            print_json(res).await?;
        }
    }

    Ok(())
}

fn version_of(res: &reqwest::Response) -> Option<u64> {
    res.headers()
        .get(VERSION_HEADER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse().ok())
}

/// Print a palette response prefixed with its version; returns the version.
async fn print_palette(res: reqwest::Response) -> Result<Option<u64>, Box<dyn std::error::Error>> {
    let version = version_of(&res);
    let status = res.status();
    if !status.is_success() {
        eprintln!("Error: server returned status {}", status);
        return Ok(None);
    }
    let json: Value = res.json().await?;
    println!(
        "[version {}] {}",
        version.map(|v| v.to_string()).unwrap_or_else(|| "?".into()),
        serde_json::to_string(&json)?
    );
    Ok(version)
}

async fn print_json(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    if !status.is_success() {
        eprintln!("Error: server returned status {}", status);
        if let Ok(text) = res.text().await {
            eprintln!("Response: {}", text);
        }
        return Ok(());
    }

    let json: Value = res.json().await?;
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}

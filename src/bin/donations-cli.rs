use clap::{Parser, Subcommand};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde_json::Value;

#[derive(Parser)]
#[command(name = "donations-cli")]
#[command(about = "Management CLI for the donation service", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:8080")]
    url: String,

    #[arg(short, long, env = "DONATIONS_ADMIN_KEY", default_value = "CHANGE_ME_IN_PRODUCTION")]
    key: String,

    /// Identity sent as X-Actor-Id for change approval commands.
    #[arg(short, long)]
    actor: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check service status
    Status,
    /// List transactions flagged for manual review
    Review,
    /// Run one reconciliation sweep now
    Sweep,
    /// Re-verify a single donation by reference
    Verify { reference: String },
    /// List pending administrative changes
    Changes,
    /// Approve a pending change
    Approve {
        id: String,
        #[arg(long)]
        note: Option<String>,
    },
    /// Reject a pending change
    Reject {
        id: String,
        #[arg(long)]
        note: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();

    let mut headers = HeaderMap::new();
    headers.insert(
        AUTHORIZATION,
        HeaderValue::from_str(&format!("Bearer {}", cli.key))?,
    );
    if let Some(actor) = &cli.actor {
        headers.insert("x-actor-id", HeaderValue::from_str(actor)?);
    }

    let res = match cli.command {
        Commands::Status => {
            client.get(format!("{}/admin/status", cli.url))
                .headers(headers)
                .send()
                .await?
        }
        Commands::Review => {
            client.get(format!("{}/admin/review", cli.url))
                .headers(headers)
                .send()
                .await?
        }
        Commands::Sweep => {
            client.post(format!("{}/admin/sweep", cli.url))
                .headers(headers)
                .send()
                .await?
        }
        Commands::Verify { reference } => {
            client.post(format!("{}/donations/verify", cli.url))
                .json(&serde_json::json!({ "reference": reference }))
                .send()
                .await?
        }
        Commands::Changes => {
            client.get(format!("{}/admin/changes", cli.url))
                .headers(headers)
                .send()
                .await?
        }
        Commands::Approve { id, note } => {
            let req = client.post(format!("{}/admin/changes/{}/approve", cli.url, id))
                .headers(headers);
            with_note(req, note).send().await?
        }
        Commands::Reject { id, note } => {
            let req = client.post(format!("{}/admin/changes/{}/reject", cli.url, id))
                .headers(headers);
            with_note(req, note).send().await?
        }
    };

    print_response(res).await
}

fn with_note(req: reqwest::RequestBuilder, note: Option<String>) -> reqwest::RequestBuilder {
    match note {
        Some(note) => req.query(&[("note", note)]),
        None => req,
    }
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    if !status.is_success() {
        eprintln!("Error: service returned status {}", status);
        if let Ok(text) = res.text().await {
            eprintln!("Response: {}", text);
        }
        return Ok(());
    }

    let json: Value = res.json().await?;
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}

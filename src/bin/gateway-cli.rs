use clap::{Parser, Subcommand};
use futures_util::StreamExt;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde_json::Value;
use tokio_tungstenite::tungstenite::{client::IntoClientRequest, Message};

#[derive(Parser)]
#[command(name = "gateway-cli")]
#[command(about = "Management CLI for the tenant gateway", long_about = None)]
struct Cli {
    /// Admin API base URL.
    #[arg(short, long, default_value = "http://localhost:8081")]
    url: String,

    /// Admin API key.
    #[arg(short, long, default_value = "")]
    key: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check gateway status
    Status,
    /// Show live log subscribers per project
    Hub,
    /// Show shadow cache entry counts
    Cache,
    /// Drop the cached project for a path prefix
    InvalidateProject { prefix: String },
    /// Drop the cached rules of a project
    InvalidateRules { project_id: String },
    /// Reload the project store file
    Reload,
    /// Stream a project's live log
    Tail {
        project_id: String,

        /// Gateway WebSocket base URL.
        #[arg(long, default_value = "ws://localhost:8080")]
        gateway: String,

        #[arg(long, default_value = "/api/v1")]
        api_prefix: String,

        /// Bearer token, when the gateway requires an identity.
        #[arg(long)]
        token: Option<String>,
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

    let (method, path) = match cli.command {
        Commands::Status => (reqwest::Method::GET, "/admin/status".to_string()),
        Commands::Hub => (reqwest::Method::GET, "/admin/hub".to_string()),
        Commands::Cache => (reqwest::Method::GET, "/admin/cache".to_string()),
        Commands::InvalidateProject { prefix } => (
            reqwest::Method::POST,
            format!(
                "/admin/cache/projects/{}/invalidate",
                prefix.trim_start_matches('/')
            ),
        ),
        Commands::InvalidateRules { project_id } => (
            reqwest::Method::POST,
            format!("/admin/cache/rules/{project_id}/invalidate"),
        ),
        Commands::Reload => (reqwest::Method::POST, "/admin/store/reload".to_string()),
        Commands::Tail {
            project_id,
            gateway,
            api_prefix,
            token,
        } => {
            let url = format!("{gateway}{api_prefix}/projects/{project_id}/logs");
            return tail(&url, token.as_deref()).await;
        }
    };

    let res = client
        .request(method, format!("{}{}", cli.url, path))
        .headers(headers)
        .send()
        .await?;
    print_response(res).await
}

async fn tail(url: &str, token: Option<&str>) -> Result<(), Box<dyn std::error::Error>> {
    let mut request = url.into_client_request()?;
    if let Some(token) = token {
        request
            .headers_mut()
            .insert(AUTHORIZATION, format!("Bearer {token}").parse()?);
    }

    let (mut stream, _) = tokio_tungstenite::connect_async(request).await?;
    eprintln!("Connected to {url}");

    while let Some(message) = stream.next().await {
        match message? {
            Message::Text(text) => {
                for line in text.as_str().lines() {
                    println!("{line}");
                }
            }
            Message::Close(_) => break,
            _ => {}
        }
    }
    eprintln!("Stream closed");
    Ok(())
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    if !status.is_success() {
        eprintln!("Error: Admin API returned status {}", status);
        if let Ok(text) = res.text().await {
            eprintln!("Response: {}", text);
        }
        return Ok(());
    }

    let json: Value = res.json().await?;
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}

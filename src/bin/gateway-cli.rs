use clap::{Parser, Subcommand};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde_json::Value;

#[derive(Parser)]
#[command(name = "gateway-cli")]
#[command(about = "Management CLI for the weather gateway", long_about = None)]
struct Cli {
    /// Admin API base URL
    #[arg(short, long, default_value = "http://localhost:8081")]
    url: String,

    #[arg(short, long, env = "WEATHER_GATEWAY_ADMIN_KEY", default_value = "CHANGE_ME_IN_PRODUCTION")]
    key: String,

    /// Public API base URL, used by `weather`
    #[arg(long, default_value = "http://localhost:8080")]
    public_url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Overall status: breaker and current rate-limit window
    Status,
    /// Circuit breaker snapshot
    Breaker,
    /// Current hourly rate-limit window
    Limiter,
    /// Inspect the cached forecast of a city
    Cache { city: String },
    /// Query the public weather endpoint
    Weather { city: String },
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

    let request = match &cli.command {
        Commands::Status => client.get(format!("{}/admin/status", cli.url)).headers(headers),
        Commands::Breaker => client.get(format!("{}/admin/breaker", cli.url)).headers(headers),
        Commands::Limiter => client.get(format!("{}/admin/limiter", cli.url)).headers(headers),
        Commands::Cache { city } => client
            .get(format!("{}/admin/cache/{}", cli.url, city))
            .headers(headers),
        Commands::Weather { city } => client
            .get(format!("{}/weather", cli.public_url))
            .query(&[("city", city)]),
    };

    print_response(request.send().await?).await
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    let text = res.text().await?;

    match serde_json::from_str::<Value>(&text) {
        Ok(json) => {
            if !status.is_success() {
                eprintln!("Error: gateway returned status {}", status);
            }
            println!("{}", serde_json::to_string_pretty(&json)?);
        }
        Err(_) => {
            eprintln!("Error: gateway returned status {}", status);
            eprintln!("Response: {}", text);
        }
    }
    Ok(())
}

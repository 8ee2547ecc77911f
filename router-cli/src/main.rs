use std::{env, fs::File, io::Read, path::PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::debug;
use reqwest::{blocking::Client, header};
use serde::{Deserialize, Serialize};

/// Migration broker operator CLI.
#[derive(Parser)]
#[command(name = "gwrs")]
#[command(about = "CLI tool for the legacy/modern migration broker's admin API", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Use credentials from GWRS_USER/GWRS_PASS environment variables
    #[arg(long, global = true)]
    osenv: bool,

    #[arg(short, long, global = true)]
    user: Option<String>,

    #[arg(short, long, global = true)]
    pass: Option<String>,

    #[arg(long, global = true, default_value = "http://localhost:24042")]
    api_url: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage routing rules
    Rule {
        #[command(subcommand)]
        action: RuleAction,
    },
    /// Manage legacy/modern endpoints
    Endpoint {
        #[command(subcommand)]
        action: EndpointAction,
    },
    /// Inspect or change a rule's orchestration mode
    Orchestration {
        #[command(subcommand)]
        action: OrchestrationAction,
    },
    /// Show recent comparison statistics for a rule
    Stats {
        rule_id: String,
        /// Lookback window in seconds
        #[arg(long, default_value_t = 86400)]
        window_secs: i64,
    },
}

#[derive(Subcommand)]
enum RuleAction {
    List,
    Get { rule_id: String },
    /// Create or replace a rule from a YAML/JSON file
    Set {
        rule_id: String,
        #[arg(long, required = true)]
        file: PathBuf,
    },
    Delete { rule_id: String },
}

#[derive(Subcommand)]
enum EndpointAction {
    List,
    Get { endpoint_id: String },
    Set {
        endpoint_id: String,
        #[arg(long, required = true)]
        file: PathBuf,
    },
    Delete { endpoint_id: String },
}

#[derive(Subcommand)]
enum OrchestrationAction {
    Get { rule_id: String },
    /// mode is one of LegacyOnly, ModernOnly, Parallel
    SetMode { rule_id: String, mode: String },
}

#[derive(Serialize)]
struct LoginRequest<'a> {
    username: &'a str,
    password: &'a str,
}

#[derive(Deserialize)]
struct LoginResponse {
    token: String,
}

#[derive(Serialize)]
struct SetModeRequest<'a> {
    mode: &'a str,
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    let (username, password) = get_credentials(&cli)?;
    debug!("using api url: {}", cli.api_url);

    let client = Client::new();
    let token = authenticate(&client, &cli.api_url, &username, &password)?;

    match &cli.command {
        Commands::Rule { action } => run_rule(&client, &cli.api_url, &token, action)?,
        Commands::Endpoint { action } => run_endpoint(&client, &cli.api_url, &token, action)?,
        Commands::Orchestration { action } => run_orchestration(&client, &cli.api_url, &token, action)?,
        Commands::Stats { rule_id, window_secs } => run_stats(&client, &cli.api_url, &token, rule_id, *window_secs)?,
    }

    Ok(())
}

fn get_credentials(cli: &Cli) -> Result<(String, String)> {
    if cli.osenv {
        let username = env::var("GWRS_USER").context("GWRS_USER environment variable not set")?;
        let password = env::var("GWRS_PASS").context("GWRS_PASS environment variable not set")?;
        Ok((username, password))
    } else if let (Some(user), Some(pass)) = (&cli.user, &cli.pass) {
        Ok((user.clone(), pass.clone()))
    } else {
        anyhow::bail!("no credentials provided; use --osenv or --user/--pass");
    }
}

fn authenticate(client: &Client, base_url: &str, username: &str, password: &str) -> Result<String> {
    let url = format!("{base_url}/api/v1/auth/login");
    let response = client
        .post(&url)
        .json(&LoginRequest { username, password })
        .send()
        .context("failed to send login request")?;

    if !response.status().is_success() {
        anyhow::bail!("authentication failed: HTTP {}", response.status());
    }

    let login: LoginResponse = response.json().context("failed to parse login response")?;
    Ok(login.token)
}

fn bearer(token: &str) -> header::HeaderValue {
    header::HeaderValue::from_str(&format!("Bearer {token}")).expect("token is valid header value")
}

fn read_body(path: &PathBuf) -> Result<serde_json::Value> {
    let mut file = File::open(path).with_context(|| format!("failed to open {}", path.display()))?;
    let mut contents = String::new();
    file.read_to_string(&mut contents)?;
    serde_yaml::from_str(&contents).with_context(|| format!("failed to parse {} as YAML/JSON", path.display()))
}

fn print_response(response: reqwest::blocking::Response) -> Result<()> {
    let status = response.status();
    let body = response.text().unwrap_or_default();
    if !status.is_success() {
        anyhow::bail!("request failed: HTTP {status}: {body}");
    }
    if body.is_empty() {
        println!("ok");
    } else {
        match serde_json::from_str::<serde_json::Value>(&body) {
            Ok(value) => println!("{}", serde_json::to_string_pretty(&value)?),
            Err(_) => println!("{body}"),
        }
    }
    Ok(())
}

fn run_rule(client: &Client, base_url: &str, token: &str, action: &RuleAction) -> Result<()> {
    match action {
        RuleAction::List => {
            let response = client
                .get(format!("{base_url}/api/v1/rules"))
                .header(header::AUTHORIZATION, bearer(token))
                .send()?;
            print_response(response)
        }
        RuleAction::Get { rule_id } => {
            let response = client
                .get(format!("{base_url}/api/v1/rules/{rule_id}"))
                .header(header::AUTHORIZATION, bearer(token))
                .send()?;
            print_response(response)
        }
        RuleAction::Set { rule_id, file } => {
            let body = read_body(file)?;
            let response = client
                .put(format!("{base_url}/api/v1/rules/{rule_id}"))
                .header(header::AUTHORIZATION, bearer(token))
                .json(&body)
                .send()?;
            print_response(response)
        }
        RuleAction::Delete { rule_id } => {
            let response = client
                .delete(format!("{base_url}/api/v1/rules/{rule_id}"))
                .header(header::AUTHORIZATION, bearer(token))
                .send()?;
            print_response(response)
        }
    }
}

fn run_endpoint(client: &Client, base_url: &str, token: &str, action: &EndpointAction) -> Result<()> {
    match action {
        EndpointAction::List => {
            let response = client
                .get(format!("{base_url}/api/v1/endpoints"))
                .header(header::AUTHORIZATION, bearer(token))
                .send()?;
            print_response(response)
        }
        EndpointAction::Get { endpoint_id } => {
            let response = client
                .get(format!("{base_url}/api/v1/endpoints/{endpoint_id}"))
                .header(header::AUTHORIZATION, bearer(token))
                .send()?;
            print_response(response)
        }
        EndpointAction::Set { endpoint_id, file } => {
            let body = read_body(file)?;
            let response = client
                .put(format!("{base_url}/api/v1/endpoints/{endpoint_id}"))
                .header(header::AUTHORIZATION, bearer(token))
                .json(&body)
                .send()?;
            print_response(response)
        }
        EndpointAction::Delete { endpoint_id } => {
            let response = client
                .delete(format!("{base_url}/api/v1/endpoints/{endpoint_id}"))
                .header(header::AUTHORIZATION, bearer(token))
                .send()?;
            print_response(response)
        }
    }
}

fn run_orchestration(client: &Client, base_url: &str, token: &str, action: &OrchestrationAction) -> Result<()> {
    match action {
        OrchestrationAction::Get { rule_id } => {
            let response = client
                .get(format!("{base_url}/api/v1/orchestration/{rule_id}"))
                .header(header::AUTHORIZATION, bearer(token))
                .send()?;
            print_response(response)
        }
        OrchestrationAction::SetMode { rule_id, mode } => {
            let response = client
                .put(format!("{base_url}/api/v1/orchestration/{rule_id}/mode"))
                .header(header::AUTHORIZATION, bearer(token))
                .json(&SetModeRequest { mode })
                .send()?;
            print_response(response)
        }
    }
}

fn run_stats(client: &Client, base_url: &str, token: &str, rule_id: &str, window_secs: i64) -> Result<()> {
    let response = client
        .get(format!("{base_url}/api/v1/comparisons/{rule_id}/statistics"))
        .query(&[("window_secs", window_secs)])
        .header(header::AUTHORIZATION, bearer(token))
        .send()?;
    print_response(response)
}

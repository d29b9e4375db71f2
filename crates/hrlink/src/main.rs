// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::sync::Arc;

use clap::{Parser, Subcommand};
use serde_json::{json, Value};
use tracing::error;

use hrlink::config::ClientConfig;
use hrlink::credential::oauth::SignInCredentials;
use hrlink::credential::persist::FileStore;
use hrlink::credential::store::CredentialStore;
use hrlink::credential::{EMPLOYEE_ID_KEY, USER_ID_KEY};
use hrlink::transport::Request;
use hrlink::{AuthClient, ClientError};

#[derive(Debug, Parser)]
#[command(name = "hrlink", version, about = "Authenticated ERP client")]
struct Cli {
    #[command(flatten)]
    config: ClientConfig,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Exchange API credentials for a token pair.
    Login {
        #[arg(long, env = "HRLINK_API_KEY")]
        api_key: String,
        #[arg(long, env = "HRLINK_API_SECRET", hide_env_values = true)]
        api_secret: String,
        #[arg(long, env = "HRLINK_APP_KEY", hide_env_values = true)]
        app_key: String,
    },
    /// GET a path (relative to `<base>/api/`) or an absolute URL.
    Get { url: String },
    /// POST a JSON body, or form fields given as `key=value`.
    Post {
        url: String,
        #[arg(long, conflicts_with = "form")]
        json: Option<String>,
        #[arg(long, num_args = 1..)]
        form: Vec<String>,
    },
    /// Refresh the access token now.
    Refresh,
    /// Forget the stored tokens.
    Logout,
    /// Show what the credential store holds.
    Status,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = cli.config.validate() {
        eprintln!("error: {e}");
        std::process::exit(2);
    }

    init_tracing(&cli.config);
    let _ = rustls::crypto::ring::default_provider().install_default();

    match run(cli).await {
        Ok(output) => println!("{output:#}"),
        Err(e) => {
            error!("fatal: {e:#}");
            let code = match e.downcast_ref::<ClientError>() {
                Some(err) if err.is_terminal() => 3,
                _ => 1,
            };
            std::process::exit(code);
        }
    }
}

fn init_tracing(config: &ClientConfig) {
    use tracing_subscriber::fmt;
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_new(&config.log_level).unwrap_or_else(|_| EnvFilter::new("info"));

    // Logs go to stderr so stdout stays machine-readable.
    match config.log_format.as_str() {
        "json" => {
            fmt::fmt().with_env_filter(filter).with_writer(std::io::stderr).json().init();
        }
        _ => {
            fmt::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<Value> {
    let store: Arc<dyn CredentialStore> = Arc::new(FileStore::new(cli.config.store_path()));
    let client = AuthClient::from_config(&cli.config, Arc::clone(&store));

    if let Some(ref base_url) = cli.config.base_url {
        if !matches!(cli.command, Command::Login { .. }) {
            client.session().set_base_url(base_url).await?;
        }
    }

    let output = match cli.command {
        Command::Login { api_key, api_secret, app_key } => {
            let base_url = match cli.config.base_url {
                Some(url) => url,
                None => client
                    .session()
                    .base_url()
                    .await?
                    .ok_or_else(|| anyhow::anyhow!("--base-url is required for the first login"))?,
            };
            let data = client
                .sign_in(&base_url, &SignInCredentials { api_key, api_secret, app_key })
                .await?;
            json!({
                "signed_in": true,
                "employee_id": data.employee_id(),
                "user_id": data.user_id(),
            })
        }
        Command::Get { url } => client.send(Request::get(url)).await?.json()?,
        Command::Post { url, json, form } => {
            let request = match json {
                Some(body) => Request::post(url).json(&serde_json::from_str::<Value>(&body)?)?,
                None => {
                    let fields = parse_form(&form)?;
                    let pairs: Vec<(&str, &str)> =
                        fields.iter().map(|(k, v)| (k.as_str(), v.as_str())).collect();
                    Request::post(url).form(&pairs)
                }
            };
            client.send(request).await?.json()?
        }
        Command::Refresh => {
            client.refresh().await?;
            json!({ "refreshed": true })
        }
        Command::Logout => {
            client.sign_out().await?;
            json!({ "signed_out": true })
        }
        Command::Status => {
            let tokens = client.session().load_tokens().await?;
            json!({
                "base_url": client.session().base_url().await?,
                "has_access_token": tokens.access.is_some(),
                "has_refresh_token": tokens.refresh.is_some(),
                "employee_id": store.get(EMPLOYEE_ID_KEY).await?,
                "user_id": store.get(USER_ID_KEY).await?,
                "store": cli.config.store_path(),
            })
        }
    };
    Ok(output)
}

fn parse_form(fields: &[String]) -> anyhow::Result<Vec<(String, String)>> {
    fields
        .iter()
        .map(|field| {
            field
                .split_once('=')
                .map(|(k, v)| (k.to_owned(), v.to_owned()))
                .ok_or_else(|| anyhow::anyhow!("form field must be key=value: {field}"))
        })
        .collect()
}

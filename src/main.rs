use clap::{Parser, Subcommand};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

mod controller;
mod error;
mod models;
mod render;
mod request;
mod server;
mod session;
mod settings;

#[derive(Debug, Parser)]
#[command(name = "claude_chat")]
#[command(about = "Single-page chat with Claude", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    Start {
        #[arg(long, default_value = "127.0.0.1:8501")]
        listen: String,
        /// Initial API key; can be changed from the page sidebar.
        #[arg(long, env = "ANTHROPIC_API_KEY", default_value = "", hide_env_values = true)]
        api_key: String,
        #[arg(long, env = "ANTHROPIC_BASE_URL", default_value = models::DEFAULT_BASE_URL)]
        base_url: String,
    },
    /// Send one message from the terminal and print the reply.
    Ask {
        message: String,
        #[arg(long, env = "ANTHROPIC_API_KEY", hide_env_values = true)]
        api_key: String,
        #[arg(long, default_value_t = settings::ModelId::default().to_string())]
        model: String,
        #[arg(long, default_value_t = settings::DEFAULT_MAX_TOKENS)]
        max_tokens: u32,
        #[arg(long, env = "ANTHROPIC_BASE_URL", default_value = models::DEFAULT_BASE_URL)]
        base_url: String,
    },
}

struct StdoutView;

impl controller::ChatView for StdoutView {
    fn show_message(&mut self, message: &session::Message) {
        if message.role == session::Role::Assistant {
            println!("{}", message.content);
        }
    }

    fn show_error(&mut self, error: &error::RemoteCallFailure) {
        eprintln!("Error: {error}");
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Start { listen, api_key, base_url } => {
            let addr: SocketAddr = listen.parse()?;
            let config = settings::SessionConfig::with_api_key(api_key);
            info!(
                model = %config.model,
                api_key_configured = config.api_key_configured(),
                %base_url,
                "starting"
            );
            let model = Arc::new(models::AnthropicClient::new(base_url));
            let state = server::AppState::new(config, model);
            server::serve(addr, state).await?;
        }
        Commands::Ask { message, api_key, model, max_tokens, base_url } => {
            let model_id = model.parse::<settings::ModelId>().map_err(anyhow::Error::msg)?;
            let config = settings::SessionConfig::with_api_key(api_key);
            let mut store = session::SessionStore::new(config);
            store.set_config(settings::SessionConfigPatch {
                model: Some(model_id),
                max_tokens: Some(max_tokens),
                ..Default::default()
            });
            let client = models::AnthropicClient::new(base_url);
            let mut ctl = controller::ChatController::default();
            let outcome = ctl.submit(&mut store, &client, &message, &mut StdoutView).await?;
            // The view already printed the error.
            if matches!(outcome, controller::TurnOutcome::Failed(_)) {
                std::process::exit(1);
            }
        }
    }
    Ok(())
}

//! One-shot client: runs a single chat turn through the full pipeline and
//! prints the reply as JSON.
//!
//!     ask Will it rain in Mumbai this week?

use anyhow::{Context, Result};
use clap::Parser;

use weather_intel::config::Config;
use weather_intel::{build_assistant, init_tracing};

#[derive(Debug, Parser)]
#[command(name = "ask", version, about = "Ask the weather assistant one question")]
struct Args {
    /// The question, e.g. "What's the weather in Tokyo?". Words are joined
    /// with spaces, so quoting is optional.
    #[arg(required = true, num_args = 1.., trailing_var_arg = true)]
    message: Vec<String>,
}

impl Args {
    fn message(&self) -> String {
        self.message.join(" ")
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing();

    let config = Config::load();
    let assistant = build_assistant(&config).await?;

    let reply = assistant
        .handle(&args.message())
        .await
        .context("Chat request failed")?;

    println!("{}", serde_json::to_string_pretty(&reply)?);
    Ok(())
}

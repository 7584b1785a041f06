//! # hearth
//!
//! Terminal client for Hearth.  Reads commands from stdin; see `/help`.

mod command;
mod render;
mod shell;

use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::info;

use hearth_client::{AppContext, ClientConfig};

use crate::command::parse;
use crate::shell::Shell;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    hearth_client::init_tracing();

    info!("Starting Hearth v{}", env!("CARGO_PKG_VERSION"));

    let config = ClientConfig::from_env();
    info!(
        app_id = %config.app_id,
        database = ?config.database_path,
        gif_search = config.gif_api_key.is_some(),
        "Loaded configuration"
    );

    let ctx = AppContext::open(config)?;
    let mut shell = Shell::new(ctx);
    let notices = shell.spawn_notice_printer();

    println!("Welcome to Hearth. Type /help for commands.");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        match parse(&line) {
            Ok(Some(command)) => {
                if !shell.handle(command).await {
                    break;
                }
            }
            Ok(None) => {}
            Err(e) => println!("{e}"),
        }
    }

    notices.abort();
    info!("Bye");
    Ok(())
}

//! Interactive chat REPL over the configured store.
//!
//! Drives a [`ChatSession`](crate::session::ChatSession): the full
//! history is resent every turn, and transport failures are shown but
//! never entered into the outbound history.

use anyhow::Result;
use std::io::{BufRead, Write};

use crate::config::Config;
use crate::db;
use crate::gemini::{FileSearchProvider, GeminiClient};
use crate::session::ChatSession;
use crate::settings::SettingsStore;

pub async fn run_chat(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;
    let settings = SettingsStore::new(pool.clone());
    let client = GeminiClient::from_settings(config, &settings).await?;

    let mut session = ChatSession::new();

    println!("Ask a question (empty line or Ctrl-D to quit).");

    let stdin = std::io::stdin();
    let mut lines = stdin.lock().lines();

    loop {
        print!("> ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next() else { break };
        let line = line?;
        let question = line.trim();
        if question.is_empty() {
            break;
        }

        let outbound = session.submit(question);

        match client.generate(&outbound).await {
            Ok(answer) => {
                println!("{}", answer.answer);
                for source in &answer.sources {
                    println!("  - {} ({})", source.title, source.url);
                }
                session.record_reply(answer);
            }
            Err(e) => {
                // Shown, not added to the conversation
                session.record_failure(&e.to_string());
                eprintln!("error: {}", e);
            }
        }
    }

    pool.close().await;
    Ok(())
}

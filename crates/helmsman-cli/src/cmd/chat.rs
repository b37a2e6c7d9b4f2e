use crate::output::print_json;
use anyhow::Context;
use clap::Subcommand;
use helmsman_core::config::Config;
use helmsman_core::dialogue::{default_sender_id, DialogueClient};
use std::path::Path;

#[derive(Subcommand)]
pub enum ChatSubcommand {
    /// Send one message and print the bot's replies
    Say {
        message: String,
        /// Conversation id (default: a fresh helmsman-xxxxxxxx id)
        #[arg(long)]
        sender: Option<String>,
    },

    /// Clear the conversation tracker for a sender
    Reset {
        #[arg(long)]
        sender: String,
    },
}

pub fn run(root: &Path, subcmd: ChatSubcommand, json: bool) -> anyhow::Result<()> {
    let config = Config::load(root).context("failed to load config")?;
    let client = DialogueClient::new(config.dialogue_base_url());
    let rt = super::runtime()?;

    match subcmd {
        ChatSubcommand::Say { message, sender } => {
            let sender = sender.unwrap_or_else(default_sender_id);
            let replies = rt
                .block_on(client.send_message(&sender, &message))
                .with_context(|| format!("no reply from {}", client.webhook_url()))?;
            if json {
                print_json(&serde_json::json!({ "sender": sender, "replies": replies }))?;
            } else if replies.is_empty() {
                println!("(no reply)");
            } else {
                for r in &replies {
                    println!("{}", r.render());
                }
            }
        }
        ChatSubcommand::Reset { sender } => {
            let ok = rt
                .block_on(client.restart_conversation(&sender))
                .with_context(|| format!("could not reach {}", client.base_url()))?;
            if json {
                print_json(&serde_json::json!({ "sender": sender, "reset": ok }))?;
            } else if ok {
                println!("Conversation '{sender}' reset.");
            }
            if !ok {
                anyhow::bail!("dialogue service rejected the restart event for '{sender}'");
            }
        }
    }
    Ok(())
}

//! CLI module for Switchboard
//!
//! Provides commands:
//! - `serve`: Run the hook server and the Telegram update loop
//! - `edit-event`: Edit every recent message tagged with an event id
//! - `show`: Print a stored message

use clap::{Parser, Subcommand};

pub mod edit_event;
pub mod show;

/// Switchboard CLI
#[derive(Parser, Debug)]
#[command(name = "switchboard")]
#[command(about = "Interactive message state engine for Telegram bots")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the server (default)
    Serve,
    /// Edit the newest messages sent for an event
    EditEvent {
        /// Correlation id the messages were sent with
        #[arg(long)]
        event_id: String,
        /// New message text
        #[arg(long)]
        text: String,
        /// Only edit messages whose keyboard is in this state
        #[arg(long)]
        from_state: Option<String>,
    },
    /// Print a stored message as JSON
    Show {
        /// Store id of the message
        id: i64,
    },
}

/// Run the CLI command
pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = crate::server::load_config()?;

    match cli.command {
        Some(Commands::Serve) | None => crate::server::run(config).await,
        Some(Commands::EditEvent {
            event_id,
            text,
            from_state,
        }) => edit_event::run(&config, &event_id, text, from_state).await,
        Some(Commands::Show { id }) => show::run(&config, id).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_edit_event() {
        let cli = Cli::try_parse_from([
            "switchboard",
            "edit-event",
            "--event-id",
            "build-42",
            "--text",
            "Build passed",
        ])
        .unwrap();

        match cli.command {
            Some(Commands::EditEvent {
                event_id,
                text,
                from_state,
            }) => {
                assert_eq!(event_id, "build-42");
                assert_eq!(text, "Build passed");
                assert!(from_state.is_none());
            }
            other => panic!("Expected edit-event, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_show() {
        let cli = Cli::try_parse_from(["switchboard", "show", "17"]).unwrap();
        assert!(matches!(cli.command, Some(Commands::Show { id: 17 })));
    }

    #[test]
    fn test_show_requires_id() {
        assert!(Cli::try_parse_from(["switchboard", "show"]).is_err());
    }
}

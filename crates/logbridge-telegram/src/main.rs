//! Logbridge binary.
//!
//! Start the bridge with:
//! ```bash
//! TELEGRAM_BOT_TOKEN=xxx LOGSEQ_API_TOKEN=yyy cargo run -p logbridge-telegram
//! ```

use clap::{Parser, Subcommand};
use logbridge_commands::{slash_template, CommandKind, CommandRegistry};
use logbridge_core::{config, Settings};
use logbridge_notebook::{LogseqClient, Notebook};
use logbridge_telegram::LogbridgeBot;
use tracing_subscriber::EnvFilter;

/// Logbridge - a Telegram bot for your Logseq notebook
#[derive(Parser, Debug)]
#[command(name = "logbridge")]
#[command(about = "Telegram bot writing messages to Logseq and answering customized commands")]
struct Args {
    /// Verbose logging (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Cmd>,
}

#[derive(Subcommand, Debug)]
enum Cmd {
    /// Run the bridge (default)
    Run {
        /// Do not poll Telegram even if this is the main bot
        #[arg(long)]
        no_launch: bool,
    },
    /// Send a block and its children to every registered chat
    Send {
        /// Block uuid
        uuid: String,
    },
    /// Refresh the photo links of a block
    RefreshPhotos {
        /// Block uuid
        uuid: String,
    },
    /// Install the slash commands that insert command definitions
    Templates,
    /// Print the settings and the customized command catalog
    Check,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    // Load environment variables from config directory first
    config::load_env_files();

    // Initialize logging based on verbosity
    let filter = match args.verbose {
        0 => "logbridge_telegram=info,logbridge_commands=info,logbridge_notebook=warn,teloxide=warn",
        1 => "logbridge_telegram=debug,logbridge_commands=debug,logbridge_notebook=debug,teloxide=info",
        2 => "logbridge_telegram=trace,logbridge_commands=trace,logbridge_notebook=trace,teloxide=debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_new(filter).unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // Ensure all directories exist
    if let Err(e) = config::ensure_all_dirs() {
        tracing::warn!(error = %e, "Failed to create all directories");
    }

    let settings = Settings::from_env()?;

    match args.command.unwrap_or(Cmd::Run { no_launch: false }) {
        Cmd::Run { no_launch } => run(settings, no_launch).await,
        Cmd::Send { uuid } => {
            let bot = LogbridgeBot::new(settings);
            let delivered = bot.send_block(&uuid).await?;
            println!("Sent {uuid} to {delivered} chat(s)");
            Ok(())
        }
        Cmd::RefreshPhotos { uuid } => {
            let bot = LogbridgeBot::new(settings);
            let refreshed = bot.refresh_photos(&uuid).await?;
            println!("Refreshed {refreshed} photo(s) in {uuid}");
            Ok(())
        }
        Cmd::Templates => {
            let client = LogseqClient::from_settings(&settings);
            for kind in CommandKind::ALL {
                client
                    .register_slash_template(kind.slash_label(), &slash_template(kind))
                    .await?;
                println!("Installed \"{}\"", kind.slash_label());
            }
            Ok(())
        }
        Cmd::Check => check(&settings).await,
    }
}

async fn run(settings: Settings, no_launch: bool) -> Result<(), Box<dyn std::error::Error>> {
    let launch = settings.is_main_bot && !no_launch;
    let bot = LogbridgeBot::new(settings);

    if launch {
        match bot.get_me().await {
            Ok(username) => {
                tracing::info!(username = %username, "Bot initialized successfully");
                println!("\n[robot] Logbridge");
                println!("   Bot: @{}", username);
                println!("   Page: {}", bot.state().settings.page_name);
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to get bot info");
                return Err(e.into());
            }
        }
        println!("\n[phone] Send the bot a message to register your chat");
        println!("   Press Ctrl+C to stop\n");
    }

    bot.run(launch).await?;
    Ok(())
}

async fn check(settings: &Settings) -> Result<(), Box<dyn std::error::Error>> {
    println!("Logseq API:        {}", settings.logseq_api_url);
    println!("Main bot:          {}", settings.is_main_bot);
    println!(
        "Authorized users:  {}",
        if settings.authorized_users.is_empty() {
            "everyone".to_string()
        } else {
            settings.authorized_users.join(", ")
        }
    );
    println!("Page:              {}", settings.page_name);
    println!("Inbox:             {}", settings.inbox_name);
    println!("Chat ids file:     {}", config::chat_ids_file().display());

    let client = LogseqClient::from_settings(settings);
    let registry = CommandRegistry::new();
    let count = registry.rebuild(&client).await?;
    println!("\nCustomized commands ({count}):");
    for command in registry.snapshot().iter() {
        println!("  {}", command.help_line());
    }
    Ok(())
}

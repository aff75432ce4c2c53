//! Echo Bot Demo
//!
//! A small bot on top of tether, talking to the in-memory platform so it runs
//! without credentials. A simulated user sends a few commands, then the
//! connection drops with an abnormal close code to show the reconnect path.
//!
//! # Commands
//!
//! ```text
//! !echo <text>  - Echo text back
//! !ping         - Pong
//! !whoami       - Your display name in the guild
//! !team <name>  - The team's guild emoji
//! !panic        - Panic inside a handler (reported as an ERROR event)
//! ```
//!
//! # Usage
//!
//! ```bash
//! cargo run --package echo-bot -- --generate     # write config.json
//! cargo run --package echo-bot -- --run-for 15
//! ```

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::Args;
use tether::prelude::*;
use tether::runtime::logging;

/// Flags specific to the echo bot.
#[derive(Args, Debug)]
struct EchoArgs {
    /// Channel name the bot announces itself in
    #[arg(long, default_value = "general")]
    announce: String,

    /// Log out after this many seconds instead of waiting for Ctrl+C
    #[arg(long, value_name = "SECS")]
    run_for: Option<u64>,
}

// ============================================================================
// Handlers
// ============================================================================

fn register_handlers(bot: &Arc<Bot>, args: &EchoArgs) -> Result<()> {
    let announcer = Arc::clone(bot);
    let announce = args.announce.clone();
    bot.on(
        "READY",
        move |_, _| {
            let bot = Arc::clone(&announcer);
            let channel = announce.clone();
            tokio::spawn(async move {
                let text = format!("Echo bot {} online", bot.config().version);
                match bot.send(&channel, &text).await {
                    Ok(false) => warn!("Announce channel '{}' not found", channel),
                    Ok(true) => {}
                    Err(e) => error!("Failed to announce: {}", e),
                }
            });
            Ok(())
        },
        Vec::new(),
    )?;

    bot.on(
        "RECONNECTED",
        |_, _| {
            info!("Back online after a reconnect");
            Ok(())
        },
        Vec::new(),
    )?;

    bot.on(
        "ERROR",
        |event, _| {
            if let Some(report) = event.as_error() {
                warn!("Intercepted {:?} failure: {}", report.origin, report);
            }
            Ok(())
        },
        Vec::new(),
    )?;

    let commands = Arc::clone(bot);
    bot.on(
        "MESSAGE",
        move |event, _| {
            let Some(message) = event.as_message() else {
                return Ok(());
            };
            if message.trimmed_content() == "!panic" {
                panic!("!panic requested by {}", message.display_name());
            }

            let bot = Arc::clone(&commands);
            let message = message.clone();
            tokio::spawn(async move {
                if let Err(e) = handle_command(&bot, &message).await {
                    error!("Command failed: {:#}", e);
                }
            });
            Ok(())
        },
        Vec::new(),
    )?;

    Ok(())
}

async fn handle_command(bot: &Bot, message: &ChatMessage) -> Result<()> {
    let text = message.trimmed_content();
    info!("[{}] {}: {}", message.channel_id, message.display_name(), text);

    let response = if let Some(content) = text.strip_prefix("!echo ") {
        content.to_string()
    } else if text == "!ping" {
        "Pong!".to_string()
    } else if text == "!whoami" {
        match bot.username_of_user_id(&message.author.id).await? {
            Some(name) => format!("You are {name}"),
            None => "You are not a member of this guild".to_string(),
        }
    } else if let Some(name) = text.strip_prefix("!team ") {
        match name.parse::<Team>() {
            Ok(team) => match bot.team_icon(team, None).await? {
                Some(icon) => format!("{team}: <:{}:{}>", icon.name, icon.id),
                None => format!("{team} has no icon in this guild"),
            },
            Err(e) => e.to_string(),
        }
    } else {
        return Ok(());
    };

    bot.reply(message, &response, false).await?;
    Ok(())
}

// ============================================================================
// Simulated platform
// ============================================================================

fn demo_network(config: &BotConfig) -> MemoryNetwork {
    let player = Member::new(User::new("1001", "ash")).with_nickname("Ash K.");
    let guild = Guild::new(config.guild_id.clone(), "Demo Guild")
        .with_member(player)
        .with_emoji(Emoji::new("501", "valor"))
        .with_emoji(Emoji::new("502", "mystic"));

    let network = MemoryNetwork::new();
    // Visible only after a few lookups, like a cache still filling in.
    network.stage_guild(guild, 2);
    for (name, id) in &config.channel_ids {
        network.insert_channel(Channel::new(id.clone(), name.clone(), config.guild_id.clone()));
    }
    network.require_token(config.bot_token.clone());
    network
}

async fn simulate_traffic(network: MemoryNetwork, bot: Arc<Bot>, channel_id: String) {
    let author = User::new("1001", "ash");
    let say = |network: &MemoryNetwork, id: usize, text: &str| {
        let message = ChatMessage::new(format!("m{id}"), channel_id.clone(), author.clone(), text);
        if let Some(client) = network.latest() {
            client.emit(RawEvent::Message(message));
        }
    };

    let mut state = bot.supervisor().watch_state();
    if state.wait_for(|s| *s == ConnectionState::Connected).await.is_err() {
        return;
    }
    tokio::time::sleep(Duration::from_secs(2)).await;

    for (id, text) in ["!ping", "!echo hello tether", "!whoami", "!team valor", "!team rocket", "!panic"]
        .into_iter()
        .enumerate()
    {
        say(&network, id, text);
        tokio::time::sleep(Duration::from_millis(300)).await;
    }

    info!("Simulating an abnormal disconnect");
    if let Some(client) = network.latest() {
        client.emit(RawEvent::Disconnect {
            code: 4000,
            reason: "simulated".into(),
        });
    }

    let reconnected = network.client_count();
    while network.client_count() == reconnected || bot.state() != ConnectionState::Connected {
        tokio::time::sleep(Duration::from_millis(200)).await;
    }
    say(&network, 100, "!echo still here");
}

// ============================================================================
// Main Entry Point
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::<EchoArgs>::parse_with("Echo bot demo for tether", env!("CARGO_PKG_VERSION"));
    let Startup::Run { config, args } = bootstrap(cli)? else {
        return Ok(());
    };
    logging::init_from_config(&config.logging);

    let network = demo_network(&config);
    let channel_id = config.channel_id(&args.announce).map(str::to_string);
    let bot = Arc::new(Bot::new(config, Arc::new(network.clone())));
    register_handlers(&bot, &args)?;

    bot.connect().await?;
    info!("Add the bot to a guild with {}", bot.register_url());

    if let Some(channel_id) = channel_id {
        tokio::spawn(simulate_traffic(network, Arc::clone(&bot), channel_id));
    } else {
        warn!("No channel named '{}' configured; skipping simulated traffic", args.announce);
    }

    match args.run_for {
        Some(secs) => tokio::time::sleep(Duration::from_secs(secs)).await,
        None => tokio::signal::ctrl_c().await?,
    }

    bot.disconnect().await;
    info!("Logged out");
    Ok(())
}

use serenity::async_trait;
use serenity::http::Http;
use serenity::model::channel::Message;
use serenity::model::gateway::Ready;
use serenity::model::id::ChannelId;
use serenity::prelude::*;

use chrono::Utc;
use tokio::sync::mpsc;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::config::Config;
use crate::scheduler::{self, NotificationIntent};

use anyhow::{Context, Result};

pub mod commands;
pub mod render;

use commands::{Commands, OK_REACTION};

pub async fn run_bot(config: &Config) -> Result<()> {
    let token = config.discord_token()?;
    let handler = CodeTrackHandler {
        commands: Arc::new(Commands::open(config)?),
        announcements: config.announcements_channel,
        scheduler_started: AtomicBool::new(false),
    };

    let intents = GatewayIntents::GUILD_MESSAGES
        | GatewayIntents::DIRECT_MESSAGES
        | GatewayIntents::MESSAGE_CONTENT;

    let mut client = Client::builder(token, intents)
        .event_handler(handler)
        .await
        .context("Error creating client.")?;

    client.start().await?;

    Ok(())
}

/// Posts scheduler intents to the announcements channel, or logs them when none is configured.
async fn deliver_intents(http: Arc<Http>, channel: Option<u64>, mut rx: mpsc::Receiver<NotificationIntent>) {
    while let Some(intent) = rx.recv().await {
        let Some(channel_id) = channel else {
            log::info!("[deliver_intents] {}: {}", intent.title, intent.body);
            continue;
        };

        if let Err(err) = ChannelId::new(channel_id).say(&http, intent.to_string()).await {
            log::error!("Error sending scheduled message: {:?}", err);
        }
    }
}

struct CodeTrackHandler {
    commands: Arc<Commands>,
    announcements: Option<u64>,
    /// `ready` fires again on every reconnect; the scheduler must start only once.
    scheduler_started: AtomicBool,
}

#[async_trait]
impl EventHandler for CodeTrackHandler {
    async fn ready(&self, ctx: serenity::client::Context, ready: Ready) {
        log::info!("Bot is connected and ready as {}!", ready.user.name);

        if self.scheduler_started.swap(true, Ordering::SeqCst) {
            return;
        }

        let (tx, rx) = mpsc::channel(32);
        tokio::spawn(scheduler::run(self.commands.store(), tx));
        tokio::spawn(deliver_intents(ctx.http.clone(), self.announcements, rx));
    }

    async fn message(&self, ctx: serenity::client::Context, msg: Message) {
        if msg.author.bot {
            return;
        }

        let channel = msg.channel_id;
        let Some(input) = msg.content.strip_prefix(self.commands.call_token()) else {
            return;
        };
        if input.trim().is_empty() {
            return;
        }

        let response = match self.commands.run_command(input, Utc::now()).await {
            Ok(message) => message,
            Err(err) => format!("Error: {err}"),
        };

        if response == OK_REACTION {
            if let Err(why) = msg
                .react(&ctx.http, serenity::all::ReactionType::Unicode(String::from(OK_REACTION)))
                .await
            {
                log::error!("Error reacting to message: {why:?}");
            }
            return;
        }

        // Attempt to send the response. If that fails, try to tell the user
        // something went wrong; if *that* fails, it is only logged.
        for chunk in render::split_message(&response, render::MESSAGE_LIMIT) {
            if let Err(why) = channel.say(&ctx.http, chunk).await {
                let _ = channel.say(&ctx.http, "Oops, internal error.").await;
                log::error!("Error sending message: {why:?}");
                return;
            }
        }
    }
}

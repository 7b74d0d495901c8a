mod config;
mod dialogue;
mod error;
mod handlers;
mod quiz;
mod render;

use std::sync::Arc;

use dotenv::dotenv;
use log::{debug, warn};
use teloxide::{dispatching::dialogue::InMemStorage, prelude::*, utils::command::BotCommands};

use config::Config;
use dialogue::{Command, State};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let dotenv_result = dotenv();
    pretty_env_logger::init();
    if let Err(e) = dotenv_result {
        debug!("No .env file loaded: {}", e);
    }
    log::info!("Starting revision quiz bot...");

    let config = Arc::new(Config::from_env()?);
    if config.default_api_key.is_none() {
        log::info!("CHATGPT_API_KEY is not set, every chat has to send its own key with /key");
    }

    let bot = Bot::from_env();
    if let Err(e) = bot.set_my_commands(Command::bot_commands()).await {
        warn!("Could not register the command list: {}", e);
    }

    // Sessions are kept in memory only and are gone after a restart.
    let storage = InMemStorage::<State>::new();

    let handler = Update::filter_message()
        .enter_dialogue::<Message, InMemStorage<State>, State>()
        .branch(teloxide::filter_command::<Command, _>().endpoint(handlers::command))
        .branch(dptree::case![State::Start].endpoint(handlers::start))
        .branch(dptree::case![State::Idle { session }].endpoint(handlers::idle))
        .branch(dptree::case![State::ReceiveSubject { session }].endpoint(handlers::receive_subject))
        .branch(
            dptree::case![State::ReceiveTopic { session, subject }]
                .endpoint(handlers::receive_topic),
        )
        .branch(
            dptree::case![State::ReceiveDifficulty {
                session,
                subject,
                topic
            }]
            .endpoint(handlers::receive_difficulty),
        )
        .branch(
            dptree::case![State::ReceiveCount {
                session,
                subject,
                topic,
                difficulty
            }]
            .endpoint(handlers::receive_count),
        )
        .branch(
            dptree::case![State::Answering { session, current }].endpoint(handlers::answering),
        );

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![storage, config])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    Ok(())
}

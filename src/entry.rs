use std::{fs, sync::Arc};

use teloxide::{dptree::deps, prelude::*};

use crate::{
    database::Database,
    handlers::{self, generate_bot_commands},
    platform::TelegramPlatform,
    reconciler,
};

/// # Panics
///
/// Panics if there's no key file
pub async fn entry() {
    let key = fs::read_to_string(match cfg!(debug_assertions) {
        true => "key_debug",
        false => "key",
    })
    .expect("Could not load bot key file!");

    let bot = Bot::new(key);

    bot.set_my_commands(generate_bot_commands())
        .await
        .expect("Failed to set bot commands!");

    let database: Arc<Database> = Database::new().await.expect("Failed to create database!");
    let platform = Arc::new(TelegramPlatform::new(bot.clone()));

    tokio::spawn(reconciler::reconcile_spinloop(
        platform.clone(),
        Arc::downgrade(&database),
    ));

    log::info!("Creating the handler...");

    let handler = dptree::entry()
        .branch(Update::filter_message().branch(dptree::endpoint(handlers::handle_message)));

    log::info!("Dispatching the dispatcher!");

    Dispatcher::builder(bot, handler)
        .default_handler(|_| async {})
        .dependencies(deps![database, platform])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    log::info!("Dispatcher has stopped.");
}

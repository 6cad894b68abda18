//! The moderation decision engine, run once per inbound group message.

use html_escape::encode_text;
use teloxide::types::{ChatId, InlineKeyboardButton, InlineKeyboardMarkup};
use url::Url;

use crate::{
    ad_filter,
    database::{self, Database},
    membership,
    platform::ChatPlatform,
    types::{Classification, InboundMessage},
    PRIVATE_GUIDANCE_TEXT,
};

/// Handle one inbound group message end to end: admin bypass, the
/// advertisement filter, then the membership gate with join prompts.
///
/// Telegram API failures never escape this function; every platform call
/// here is best-effort and its failure only means the intended action
/// didn't happen. Database errors do propagate.
pub async fn moderate_message<P: ChatPlatform + ?Sized>(
    platform: &P,
    database: &Database,
    message: &InboundMessage<'_>,
) -> Result<(), database::Error> {
    database.ensure_group(message.chat_id).await?;
    let config = database.get_group(message.chat_id).await?.unwrap_or_default();

    // Admins are exempt from everything.
    if membership::is_admin_or_owner(platform, message.chat_id, message.sender).await {
        return Ok(());
    }

    if config.enforce_adblock {
        match ad_filter::classify(message.text, &config.keyword_list()) {
            Classification::ContainsUrl | Classification::ContainsPlatformLink => {
                delete_best_effort(platform, message).await;
                let warning = format!(
                    "Removed a message from {} containing an advertisement or a link.",
                    message.sender_mention
                );
                let _ = platform.send_message(message.chat_id, &warning, None).await;
                return Ok(());
            }
            Classification::ContainsBannedKeyword(term) => {
                delete_best_effort(platform, message).await;
                let warning = format!(
                    "Removed a message from {} containing a banned term: <b>{}</b>.",
                    message.sender_mention,
                    encode_text(&term)
                );
                let _ = platform.send_message(message.chat_id, &warning, None).await;
                return Ok(());
            }
            Classification::Clean => (),
        }
    }

    if !config.enforce_membership || config.required_channels.is_empty() {
        return Ok(());
    }

    let mut missing = Vec::new();
    for channel in &config.required_channels {
        if !membership::channel_membership(platform, message.sender, channel)
            .await
            .passes()
        {
            missing.push(channel.as_str());
        }
    }
    if missing.is_empty() {
        return Ok(());
    }

    // Not in every required channel. The message goes, a join prompt
    // arrives, and the reconciler takes it from there.
    delete_best_effort(platform, message).await;

    let prompt = format!("{},\n\n{}", message.sender_mention, config.prompt_text());
    let keyboard = join_keyboard(config.button_text(), &missing);
    if let Ok(sent) = platform
        .send_message(message.chat_id, &prompt, Some(keyboard))
        .await
    {
        database
            .record_pending_notice(message.sender, message.chat_id, message.chat_id, sent)
            .await?;
    }

    // The private leg. Fails whenever the user never started a private chat
    // with the bot; that's fine, the in-group prompt carries the buttons.
    let private_chat = ChatId(message.sender.0 as i64);
    if let Ok(sent) = platform
        .send_message(private_chat, PRIVATE_GUIDANCE_TEXT, None)
        .await
    {
        database
            .record_pending_notice(message.sender, message.chat_id, private_chat, sent)
            .await?;
    }

    Ok(())
}

async fn delete_best_effort<P: ChatPlatform + ?Sized>(platform: &P, message: &InboundMessage<'_>) {
    if let Err(error) = platform
        .delete_message(message.chat_id, message.message_id)
        .await
    {
        log::debug!(
            "Failed to delete message {} in chat {}: {error}",
            message.message_id.0,
            message.chat_id
        );
    }
}

/// One button row per channel still missing, all with the group's button
/// text. Channel identifiers that don't make a valid link get no button.
fn join_keyboard(button_text: &str, channels: &[&str]) -> InlineKeyboardMarkup {
    let rows = channels
        .iter()
        .filter_map(|channel| {
            let url =
                Url::parse(&format!("https://t.me/{}", channel.trim_start_matches('@'))).ok()?;
            Some(vec![InlineKeyboardButton::url(button_text.to_string(), url)])
        })
        .collect::<Vec<_>>();
    InlineKeyboardMarkup::new(rows)
}

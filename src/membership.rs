use teloxide::types::{ChatId, Recipient, UserId};

use crate::{platform::ChatPlatform, types::Membership};

/// Turn a stored channel identifier into a Telegram recipient.
/// Numeric identifiers are chat ids; anything else is a channel username,
/// with or without its `@`.
pub fn channel_recipient(ident: &str) -> Recipient {
    if let Ok(id) = ident.parse::<i64>() {
        return Recipient::Id(ChatId(id));
    }
    Recipient::ChannelUsername(format!("@{}", ident.trim_start_matches('@')))
}

/// Check whether the user currently counts as a member of the channel.
///
/// A failed query gives [`Membership::Unknown`], which callers must treat
/// exactly like [`Membership::NotMember`]: uncertainty never grants passage.
pub async fn channel_membership<P: ChatPlatform + ?Sized>(
    platform: &P,
    user: UserId,
    channel: &str,
) -> Membership {
    match platform
        .member_status(channel_recipient(channel), user)
        .await
    {
        Ok(status) if status.counts_as_member() => Membership::Member,
        Ok(_) => Membership::NotMember,
        Err(error) => {
            log::debug!("Membership check for user {user} in {channel} failed: {error}");
            Membership::Unknown
        }
    }
}

/// Check if the user is an administrator or the owner of the chat.
/// Fails closed: a failed query means "no".
pub async fn is_admin_or_owner<P: ChatPlatform + ?Sized>(
    platform: &P,
    chat: ChatId,
    user: UserId,
) -> bool {
    match platform.member_status(Recipient::Id(chat), user).await {
        Ok(status) => status.is_privileged(),
        Err(error) => {
            log::debug!("Admin check for user {user} in chat {chat} failed: {error}");
            false
        }
    }
}

use async_trait::async_trait;
use teloxide::{
    payloads::SendMessageSetters,
    prelude::Requester,
    types::{ChatId, ChatMemberKind, InlineKeyboardMarkup, MessageId, ParseMode, Recipient, UserId},
    Bot, RequestError,
};

use crate::types::MemberStatus;

/// A failed Telegram API call.
///
/// Every call this bot makes is best-effort, so receiving one of these is a
/// normal, expected outcome for the caller to swallow, not an exception path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlatformError(pub String);

impl std::fmt::Display for PlatformError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Telegram API call failed: {}", self.0)
    }
}

impl std::error::Error for PlatformError {}

impl From<RequestError> for PlatformError {
    fn from(error: RequestError) -> Self {
        PlatformError(error.to_string())
    }
}

/// The slice of the Telegram API this bot needs: membership queries,
/// message deletion, and message sending. The moderation engine and the
/// reconciler only ever talk to Telegram through this.
#[async_trait]
pub trait ChatPlatform: Send + Sync {
    /// Query a user's membership record in a chat or channel.
    async fn member_status(
        &self,
        chat: Recipient,
        user: UserId,
    ) -> Result<MemberStatus, PlatformError>;

    async fn delete_message(&self, chat: ChatId, message: MessageId)
        -> Result<(), PlatformError>;

    /// Send an HTML-formatted message, optionally with an inline keyboard.
    /// Returns the id of the sent message.
    async fn send_message(
        &self,
        chat: ChatId,
        text: &str,
        keyboard: Option<InlineKeyboardMarkup>,
    ) -> Result<MessageId, PlatformError>;
}

/// The real thing, wrapping a [`Bot`].
pub struct TelegramPlatform {
    bot: Bot,
}

impl TelegramPlatform {
    pub fn new(bot: Bot) -> Self {
        TelegramPlatform { bot }
    }
}

#[async_trait]
impl ChatPlatform for TelegramPlatform {
    async fn member_status(
        &self,
        chat: Recipient,
        user: UserId,
    ) -> Result<MemberStatus, PlatformError> {
        let member = self.bot.get_chat_member(chat, user).await?;
        Ok(member_status_of(&member.kind))
    }

    async fn delete_message(
        &self,
        chat: ChatId,
        message: MessageId,
    ) -> Result<(), PlatformError> {
        self.bot.delete_message(chat, message).await?;
        Ok(())
    }

    async fn send_message(
        &self,
        chat: ChatId,
        text: &str,
        keyboard: Option<InlineKeyboardMarkup>,
    ) -> Result<MessageId, PlatformError> {
        let mut request = self.bot.send_message(chat, text).parse_mode(ParseMode::Html);
        if let Some(keyboard) = keyboard {
            request = request.reply_markup(keyboard);
        }
        Ok(request.await?.id)
    }
}

fn member_status_of(kind: &ChatMemberKind) -> MemberStatus {
    if kind.is_owner() {
        MemberStatus::Owner
    } else if kind.is_administrator() {
        MemberStatus::Administrator
    } else if kind.is_restricted() {
        MemberStatus::Restricted
    } else if kind.is_member() {
        MemberStatus::Member
    } else if kind.is_banned() {
        MemberStatus::Banned
    } else {
        MemberStatus::Left
    }
}

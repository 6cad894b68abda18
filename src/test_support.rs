//! A recording stand-in for the Telegram API.

use std::{
    collections::{HashMap, HashSet},
    sync::{
        atomic::{AtomicBool, AtomicI32, Ordering},
        Mutex,
    },
};

use async_trait::async_trait;
use teloxide::types::{ChatId, InlineKeyboardMarkup, MessageId, Recipient, UserId};

use crate::{
    platform::{ChatPlatform, PlatformError},
    types::MemberStatus,
};

pub struct SentMessage {
    pub chat: ChatId,
    pub id: MessageId,
    pub text: String,
    pub keyboard: Option<InlineKeyboardMarkup>,
}

/// Records every call it receives. Membership answers come from a scripted
/// table; anything not scripted fails the query, like the real API does for
/// channels the bot can't see.
#[derive(Default)]
pub struct FakePlatform {
    statuses: Mutex<HashMap<(String, UserId), MemberStatus>>,
    unreachable_chats: Mutex<HashSet<ChatId>>,
    failing_deletes: AtomicBool,
    next_message_id: AtomicI32,
    pub sent: Mutex<Vec<SentMessage>>,
    pub deleted: Mutex<Vec<(ChatId, MessageId)>>,
}

fn recipient_key(chat: &Recipient) -> String {
    match chat {
        Recipient::Id(id) => id.0.to_string(),
        Recipient::ChannelUsername(username) => username.clone(),
    }
}

impl FakePlatform {
    pub fn new() -> Self {
        Self::default()
    }

    /// Script a user's status in a channel. The key is the `@username` form,
    /// matching what [`crate::membership::channel_recipient`] produces.
    pub fn set_channel_status(&self, channel: &str, user: UserId, status: MemberStatus) {
        self.statuses
            .lock()
            .unwrap()
            .insert((channel.to_string(), user), status);
    }

    pub fn set_chat_status(&self, chat: ChatId, user: UserId, status: MemberStatus) {
        self.statuses
            .lock()
            .unwrap()
            .insert((chat.0.to_string(), user), status);
    }

    /// Make sends to this chat fail, like a user who never opened a private
    /// chat with the bot.
    pub fn make_unreachable(&self, chat: ChatId) {
        self.unreachable_chats.lock().unwrap().insert(chat);
    }

    /// Make every deletion fail from now on. Deletions are still recorded.
    pub fn fail_all_deletes(&self) {
        self.failing_deletes.store(true, Ordering::SeqCst);
    }

    pub fn sent_count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }

    pub fn deleted_count(&self) -> usize {
        self.deleted.lock().unwrap().len()
    }
}

#[async_trait]
impl ChatPlatform for FakePlatform {
    async fn member_status(
        &self,
        chat: Recipient,
        user: UserId,
    ) -> Result<MemberStatus, PlatformError> {
        self.statuses
            .lock()
            .unwrap()
            .get(&(recipient_key(&chat), user))
            .copied()
            .ok_or_else(|| PlatformError("no membership record".to_string()))
    }

    async fn delete_message(
        &self,
        chat: ChatId,
        message: MessageId,
    ) -> Result<(), PlatformError> {
        self.deleted.lock().unwrap().push((chat, message));
        if self.failing_deletes.load(Ordering::SeqCst) {
            return Err(PlatformError("not permitted to delete".to_string()));
        }
        Ok(())
    }

    async fn send_message(
        &self,
        chat: ChatId,
        text: &str,
        keyboard: Option<InlineKeyboardMarkup>,
    ) -> Result<MessageId, PlatformError> {
        if self.unreachable_chats.lock().unwrap().contains(&chat) {
            return Err(PlatformError("chat not reachable".to_string()));
        }
        let id = MessageId(self.next_message_id.fetch_add(1, Ordering::SeqCst) + 1);
        self.sent.lock().unwrap().push(SentMessage {
            chat,
            id,
            text: text.to_string(),
            keyboard,
        });
        Ok(id)
    }
}

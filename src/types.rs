use teloxide::types::{ChatId, MessageId, UserId};

use crate::{DEFAULT_BANNED_KEYWORDS, DEFAULT_JOIN_BUTTON_TEXT, DEFAULT_JOIN_PROMPT};

/// What the advertisement filter made of a message's text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    Clean,
    ContainsUrl,
    /// A `t.me/` link. Overlaps with [`Classification::ContainsUrl`], but
    /// is kept as its own, stronger signal.
    ContainsPlatformLink,
    /// Carries the first configured keyword that matched.
    ContainsBannedKeyword(String),
}

/// A user's concrete status in a chat or channel, as Telegram reports it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemberStatus {
    Owner,
    Administrator,
    Member,
    Restricted,
    Left,
    Banned,
}

impl MemberStatus {
    /// True for every status that still counts as "in the channel".
    /// Restricted users are in; they just can't do everything.
    pub fn counts_as_member(self) -> bool {
        matches!(
            self,
            MemberStatus::Owner
                | MemberStatus::Administrator
                | MemberStatus::Member
                | MemberStatus::Restricted
        )
    }

    pub fn is_privileged(self) -> bool {
        matches!(self, MemberStatus::Owner | MemberStatus::Administrator)
    }
}

/// Outcome of a membership check against one required channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Membership {
    Member,
    NotMember,
    /// The query itself failed: network trouble, the bot can't see the
    /// channel, the channel doesn't exist. Never lets a message through.
    Unknown,
}

impl Membership {
    pub fn passes(self) -> bool {
        self == Membership::Member
    }
}

/// Per-group settings. One row in the `groups` table.
///
/// `None` fields mean "never configured" and fall back to the crate-wide
/// defaults on read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupConfig {
    pub required_channels: Vec<String>,
    pub banned_keywords: Option<Vec<String>>,
    pub enforce_membership: bool,
    pub enforce_adblock: bool,
    pub join_button_text: Option<String>,
    pub join_prompt: Option<String>,
}

impl Default for GroupConfig {
    fn default() -> Self {
        GroupConfig {
            required_channels: Vec::new(),
            banned_keywords: None,
            enforce_membership: true,
            enforce_adblock: true,
            join_button_text: None,
            join_prompt: None,
        }
    }
}

impl GroupConfig {
    /// The group's keyword list, or the crate default if unset.
    pub fn keyword_list(&self) -> Vec<&str> {
        match &self.banned_keywords {
            Some(own) => own.iter().map(String::as_str).collect(),
            None => DEFAULT_BANNED_KEYWORDS.to_vec(),
        }
    }

    pub fn button_text(&self) -> &str {
        self.join_button_text
            .as_deref()
            .unwrap_or(DEFAULT_JOIN_BUTTON_TEXT)
    }

    pub fn prompt_text(&self) -> &str {
        self.join_prompt.as_deref().unwrap_or(DEFAULT_JOIN_PROMPT)
    }
}

/// The parts of an incoming group message the decision engine cares about.
#[derive(Debug, Clone)]
pub struct InboundMessage<'a> {
    pub chat_id: ChatId,
    pub message_id: MessageId,
    pub sender: UserId,
    /// HTML-safe mention of the sender, see [`crate::misc::user_mention_html`].
    pub sender_mention: &'a str,
    /// The message's text, or its caption for media, or empty.
    pub text: &'a str,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn member_status_mapping() {
        assert!(MemberStatus::Owner.counts_as_member());
        assert!(MemberStatus::Administrator.counts_as_member());
        assert!(MemberStatus::Member.counts_as_member());
        assert!(MemberStatus::Restricted.counts_as_member());
        assert!(!MemberStatus::Left.counts_as_member());
        assert!(!MemberStatus::Banned.counts_as_member());

        assert!(MemberStatus::Owner.is_privileged());
        assert!(MemberStatus::Administrator.is_privileged());
        assert!(!MemberStatus::Restricted.is_privileged());
        assert!(!MemberStatus::Member.is_privileged());
    }

    #[test]
    fn config_defaults() {
        let config = GroupConfig::default();
        assert!(config.enforce_membership);
        assert!(config.enforce_adblock);
        assert_eq!(config.keyword_list(), crate::DEFAULT_BANNED_KEYWORDS);
        assert_eq!(config.button_text(), crate::DEFAULT_JOIN_BUTTON_TEXT);
    }
}

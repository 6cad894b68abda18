//! Source code for Channel Guard Bot, a Telegram group moderation bot.
//!
//! It enforces two policies: users must be members of the group's required
//! channels before they may post, and advertisement messages (links and
//! banned keywords) get removed automatically.

/// Various types used throughout.
mod types;

/// The settings and pending-notice database.
mod database;

/// Miscellaneous functions.
mod misc;

/// The slice of the Telegram API the bot talks to.
mod platform;

/// Channel membership and admin checks.
mod membership;

/// The advertisement filter.
mod ad_filter;

/// The per-message moderation decision engine.
mod moderation;

/// The background sweep that retracts join prompts once users have joined.
mod reconciler;

/// Functions that handle events from Telegram, including admin commands.
mod handlers;

/// Entry function that starts the bot.
mod entry;
pub use entry::*;

#[cfg(test)]
mod test_support;

use std::time::Duration;

/// Fallback keyword list for groups that never configured their own.
/// Consulted only when a group's stored list is unset; never mutated.
pub static DEFAULT_BANNED_KEYWORDS: &[&str] = &[
    "promo",
    "promotion",
    "discount",
    "bet",
    "casino",
    "followers",
    "free followers",
    "giveaway",
    "click here",
    "subscribe",
    "earn",
    "work from home",
];

/// Default text on the join buttons under a join prompt.
pub static DEFAULT_JOIN_BUTTON_TEXT: &str = "Join the channel";

/// Default body of the in-group join prompt, shown under the user's mention.
pub static DEFAULT_JOIN_PROMPT: &str = "Please join the channels below before \
sending messages to this group. This notice will be removed automatically \
once you have joined.";

/// Text of the private-message leg of a join prompt.
pub static PRIVATE_GUIDANCE_TEXT: &str = "You need to join this group's \
required channels before you can post there. Use the buttons under the \
notice in the group to join; your messages will go through once you have.";

/// How long the reconciler sleeps between sweeps over pending notices.
pub static RECONCILE_INTERVAL: Duration = Duration::from_secs(5);

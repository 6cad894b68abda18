//! The background sweep that re-checks membership for users with pending
//! join prompts and retracts the prompts once they've joined everything.

use std::sync::{Arc, Weak};

use teloxide::types::UserId;

use crate::{
    database::{self, Database},
    membership,
    platform::ChatPlatform,
    RECONCILE_INTERVAL,
};

/// Sweep the ledger forever, once per [`RECONCILE_INTERVAL`], starting one
/// interval after spawn. One persistent task with the sleep inside the
/// loop: ticks cannot overlap, however slow Telegram is feeling today.
///
/// Returns only once the database is gone, which means shutdown.
pub async fn reconcile_spinloop<P: ChatPlatform>(platform: Arc<P>, database: Weak<Database>) {
    loop {
        tokio::time::sleep(RECONCILE_INTERVAL).await;

        let Some(database) = database.upgrade() else {
            return;
        };

        if let Err(error) = reconcile_tick(platform.as_ref(), &database).await {
            log::error!("Reconciliation tick failed: {error}");
        }
    }
}

/// One pass over everyone with a pending notice. A failure while handling
/// one user is logged and doesn't touch the others.
pub async fn reconcile_tick<P: ChatPlatform + ?Sized>(
    platform: &P,
    database: &Database,
) -> Result<(), database::Error> {
    for user in database.pending_users().await? {
        if let Err(error) = reconcile_user(platform, database, user).await {
            log::error!("Failed reconciling pending notices of user {user}: {error}");
        }
    }
    Ok(())
}

async fn reconcile_user<P: ChatPlatform + ?Sized>(
    platform: &P,
    database: &Database,
    user: UserId,
) -> Result<(), database::Error> {
    for group in database.pending_groups(user).await? {
        let channels = database.required_channels(group).await?;
        if channels.is_empty() {
            // The group dropped its requirements (or vanished) after this
            // notice was recorded. The entry stays behind as-is.
            continue;
        }

        let mut fully_joined = true;
        for channel in &channels {
            if !membership::channel_membership(platform, user, channel)
                .await
                .passes()
            {
                fully_joined = false;
                break;
            }
        }
        if !fully_joined {
            continue;
        }

        // They're in everywhere. Take the prompts down and forget them.
        for (chat, message) in database.pending_notices(user, group).await? {
            if let Err(error) = platform.delete_message(chat, message).await {
                log::debug!(
                    "Failed to retract notice message {} in chat {chat}: {error}",
                    message.0
                );
            }
        }
        database.clear_pending_notices(user, group).await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use teloxide::types::{ChatId, MessageId};

    use crate::{
        moderation,
        test_support::FakePlatform,
        types::{InboundMessage, MemberStatus},
    };

    const GROUP: ChatId = ChatId(-1001234);
    const USER: UserId = UserId(42);
    const PRIVATE: ChatId = ChatId(42);

    async fn seeded_db() -> std::sync::Arc<Database> {
        let db = Database::new_in_memory().await.unwrap();
        db.set_required_channels(GROUP, &["@a".to_string(), "@b".to_string()])
            .await
            .unwrap();
        db.record_pending_notice(USER, GROUP, GROUP, MessageId(100))
            .await
            .unwrap();
        db.record_pending_notice(USER, GROUP, PRIVATE, MessageId(101))
            .await
            .unwrap();
        db
    }

    #[tokio::test]
    async fn converges_once_fully_joined() {
        let db = seeded_db().await;
        let platform = FakePlatform::new();
        platform.set_channel_status("@a", USER, MemberStatus::Member);
        platform.set_channel_status("@b", USER, MemberStatus::Member);

        reconcile_tick(&platform, &db).await.unwrap();

        let mut deleted = platform.deleted.lock().unwrap().clone();
        deleted.sort_by_key(|(chat, message)| (chat.0, message.0));
        assert_eq!(
            deleted,
            vec![(GROUP, MessageId(100)), (PRIVATE, MessageId(101))]
        );
        assert!(db.pending_notices(USER, GROUP).await.unwrap().is_empty());
        assert!(db.pending_users().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn partial_membership_leaves_the_entry() {
        let db = seeded_db().await;
        let platform = FakePlatform::new();
        platform.set_channel_status("@a", USER, MemberStatus::Member);
        platform.set_channel_status("@b", USER, MemberStatus::Left);

        reconcile_tick(&platform, &db).await.unwrap();

        assert_eq!(platform.deleted_count(), 0);
        assert_eq!(db.pending_notices(USER, GROUP).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn unknown_membership_leaves_the_entry() {
        let db = seeded_db().await;
        let platform = FakePlatform::new();
        platform.set_channel_status("@a", USER, MemberStatus::Member);
        // "@b" unscripted: the check fails, Unknown, not fully joined.

        reconcile_tick(&platform, &db).await.unwrap();

        assert_eq!(platform.deleted_count(), 0);
        assert_eq!(db.pending_notices(USER, GROUP).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn stale_entries_without_channels_are_skipped() {
        let db = seeded_db().await;
        db.set_required_channels(GROUP, &[]).await.unwrap();
        let platform = FakePlatform::new();

        reconcile_tick(&platform, &db).await.unwrap();

        // No checks, no deletions, and the orphaned records stay.
        assert_eq!(platform.deleted_count(), 0);
        assert_eq!(db.pending_notices(USER, GROUP).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn retraction_failure_still_clears_the_ledger() {
        let db = seeded_db().await;
        let platform = FakePlatform::new();
        platform.set_channel_status("@a", USER, MemberStatus::Member);
        platform.set_channel_status("@b", USER, MemberStatus::Member);
        platform.fail_all_deletes();

        reconcile_tick(&platform, &db).await.unwrap();

        // Deletion is attempted once per notice, never retried.
        assert_eq!(platform.deleted_count(), 2);
        assert!(db.pending_notices(USER, GROUP).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn one_users_trouble_does_not_block_others() {
        let db = Database::new_in_memory().await.unwrap();
        let other_user = UserId(43);
        db.set_required_channels(GROUP, &["@a".to_string()])
            .await
            .unwrap();
        db.record_pending_notice(USER, GROUP, GROUP, MessageId(100))
            .await
            .unwrap();
        db.record_pending_notice(other_user, GROUP, GROUP, MessageId(200))
            .await
            .unwrap();

        let platform = FakePlatform::new();
        // USER's membership check fails (unscripted); other_user is in.
        platform.set_channel_status("@a", other_user, MemberStatus::Member);

        reconcile_tick(&platform, &db).await.unwrap();

        assert_eq!(db.pending_notices(USER, GROUP).await.unwrap().len(), 1);
        assert!(db
            .pending_notices(other_user, GROUP)
            .await
            .unwrap()
            .is_empty());
    }

    /// The whole story: a non-member posts, gets prompted, joins, and the
    /// next tick cleans everything up.
    #[tokio::test]
    async fn end_to_end_prompt_then_converge() {
        let db = Database::new_in_memory().await.unwrap();
        db.set_required_channels(GROUP, &["@chan1".to_string()])
            .await
            .unwrap();

        let platform = FakePlatform::new();
        platform.set_chat_status(GROUP, USER, MemberStatus::Member);

        let inbound = InboundMessage {
            chat_id: GROUP,
            message_id: MessageId(7),
            sender: USER,
            sender_mention: "@someone",
            text: "hello",
        };
        moderation::moderate_message(&platform, &db, &inbound)
            .await
            .unwrap();

        // Message deleted, prompt sent into the group with a @chan1 button.
        assert_eq!(
            *platform.deleted.lock().unwrap(),
            vec![(GROUP, MessageId(7))]
        );
        let (prompt_id, private_id) = {
            let sent = platform.sent.lock().unwrap();
            assert_eq!(sent.len(), 2);
            let keyboard = sent[0].keyboard.as_ref().unwrap();
            let button = &keyboard.inline_keyboard[0][0];
            assert_eq!(button.text, crate::DEFAULT_JOIN_BUTTON_TEXT);
            (sent[0].id, sent[1].id)
        };
        assert_eq!(db.pending_notices(USER, GROUP).await.unwrap().len(), 2);

        // A tick while still not joined changes nothing.
        reconcile_tick(&platform, &db).await.unwrap();
        assert_eq!(db.pending_notices(USER, GROUP).await.unwrap().len(), 2);

        // They join; the next tick retracts both legs and clears the pair.
        platform.set_channel_status("@chan1", USER, MemberStatus::Member);
        reconcile_tick(&platform, &db).await.unwrap();

        let deleted = platform.deleted.lock().unwrap();
        assert!(deleted.contains(&(GROUP, prompt_id)));
        assert!(deleted.contains(&(PRIVATE, private_id)));
        drop(deleted);
        assert!(db.pending_notices(USER, GROUP).await.unwrap().is_empty());
    }
}

use std::{
    str::FromStr,
    sync::{atomic::AtomicBool, Arc},
};

pub use sqlx::Error;
use sqlx::{
    migrate::MigrateDatabase,
    sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow},
    Executor, Row, Sqlite,
};
use teloxide::types::{ChatId, MessageId, UserId};

use crate::types::GroupConfig;

type Pool = sqlx::Pool<Sqlite>;
const DB_PATH: &str = "sqlite:guard_settings.sqlite";
static WAS_CONSTRUCTED: AtomicBool = AtomicBool::new(false);

/// Storage for group settings and the pending-notice ledger.
///
/// Every public method is a single statement, so each call is one SQLite
/// transaction; there is no cross-call locking anywhere in the bot.
pub struct Database {
    pool: Pool,
}

impl Database {
    pub async fn new() -> Result<Arc<Database>, Error> {
        assert!(
            !WAS_CONSTRUCTED.swap(true, std::sync::atomic::Ordering::SeqCst),
            "Second database was constructed. This is not allowed."
        );

        if !Sqlite::database_exists(DB_PATH).await.unwrap_or(false) {
            Sqlite::create_database(DB_PATH).await?;
        }
        let pool = SqlitePoolOptions::new()
            .max_connections(32)
            .connect_with(
                SqliteConnectOptions::from_str(DB_PATH)
                    .unwrap()
                    .pragma("cache_size", "-32768")
                    .busy_timeout(std::time::Duration::from_secs(600)),
            )
            .await?;

        Self::create_tables(&pool).await?;

        Ok(Arc::new(Database { pool }))
    }

    /// In-memory database for tests. A single connection, since every new
    /// `sqlite::memory:` connection would otherwise get its own fresh
    /// empty database.
    #[cfg(test)]
    pub async fn new_in_memory() -> Result<Arc<Database>, Error> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;
        Self::create_tables(&pool).await?;
        Ok(Arc::new(Database { pool }))
    }

    async fn create_tables(pool: &Pool) -> Result<(), Error> {
        // GROUPS: one row per group the bot has seen.
        // NULL banned_keywords/join_button_text/join_prompt mean "unset,
        // use the crate defaults". Channel and keyword lists are stored
        // comma-separated.
        pool.execute(sqlx::query(
            "
                CREATE TABLE IF NOT EXISTS groups (
                    group_id INTEGER PRIMARY KEY NOT NULL,
                    required_channels TEXT NOT NULL DEFAULT '',
                    banned_keywords TEXT NULL,
                    enforce_membership INTEGER NOT NULL DEFAULT 1,
                    enforce_adblock INTEGER NOT NULL DEFAULT 1,
                    join_button_text TEXT NULL,
                    join_prompt TEXT NULL
                ) STRICT;",
        ))
        .await?;

        // PENDING NOTICES: join prompts awaiting retraction.
        // Deliberately no uniqueness constraint: one (user, group) pair
        // gets one row per sent message, e.g. the in-group prompt and the
        // private-message leg.
        pool.execute(sqlx::query(
            "
                CREATE TABLE IF NOT EXISTS pending_notices (
                    user_id INTEGER NOT NULL,
                    group_id INTEGER NOT NULL,
                    chat_id INTEGER NOT NULL,
                    message_id INTEGER NOT NULL
                ) STRICT;",
        ))
        .await?;

        Ok(())
    }

    // --- Group settings ---

    /// Create the group's settings row with defaults if it's not there yet.
    /// Called on every message; a duplicate ensure is a no-op, so racing
    /// ensures are harmless.
    pub async fn ensure_group(&self, group: ChatId) -> Result<(), Error> {
        sqlx::query("INSERT INTO groups(group_id) VALUES (?) ON CONFLICT DO NOTHING;")
            .bind(group.0)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Get a group's settings. Returns [`None`] for a group the bot has
    /// never seen; after [`Self::ensure_group`] this is always `Some`.
    pub async fn get_group(&self, group: ChatId) -> Result<Option<GroupConfig>, Error> {
        sqlx::query(
            "SELECT required_channels, banned_keywords, enforce_membership,
                    enforce_adblock, join_button_text, join_prompt
            FROM groups WHERE group_id=?;",
        )
        .bind(group.0)
        .map(|row: SqliteRow| GroupConfig {
            required_channels: split_list(&row.get::<String, _>("required_channels")),
            banned_keywords: row
                .get::<Option<String>, _>("banned_keywords")
                .map(|stored| split_list(&stored)),
            enforce_membership: row.get("enforce_membership"),
            enforce_adblock: row.get("enforce_adblock"),
            join_button_text: row.get("join_button_text"),
            join_prompt: row.get("join_prompt"),
        })
        .fetch_optional(&self.pool)
        .await
    }

    /// Convenience read for the reconciler, which only needs the channels.
    pub async fn required_channels(&self, group: ChatId) -> Result<Vec<String>, Error> {
        Ok(self
            .get_group(group)
            .await?
            .map(|config| config.required_channels)
            .unwrap_or_default())
    }

    pub async fn set_required_channels(
        &self,
        group: ChatId,
        channels: &[String],
    ) -> Result<(), Error> {
        let joined = channels.join(",");
        sqlx::query(
            "INSERT INTO groups(group_id, required_channels) VALUES (?, ?)
            ON CONFLICT DO UPDATE SET required_channels=?;",
        )
        .bind(group.0)
        .bind(&joined)
        .bind(&joined)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn set_banned_keywords(
        &self,
        group: ChatId,
        keywords: &[String],
    ) -> Result<(), Error> {
        let joined = keywords.join(",");
        sqlx::query(
            "INSERT INTO groups(group_id, banned_keywords) VALUES (?, ?)
            ON CONFLICT DO UPDATE SET banned_keywords=?;",
        )
        .bind(group.0)
        .bind(&joined)
        .bind(&joined)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn set_enforce_membership(&self, group: ChatId, value: bool) -> Result<(), Error> {
        sqlx::query(
            "INSERT INTO groups(group_id, enforce_membership) VALUES (?, ?)
            ON CONFLICT DO UPDATE SET enforce_membership=?;",
        )
        .bind(group.0)
        .bind(value)
        .bind(value)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn set_enforce_adblock(&self, group: ChatId, value: bool) -> Result<(), Error> {
        sqlx::query(
            "INSERT INTO groups(group_id, enforce_adblock) VALUES (?, ?)
            ON CONFLICT DO UPDATE SET enforce_adblock=?;",
        )
        .bind(group.0)
        .bind(value)
        .bind(value)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn set_join_button_text(&self, group: ChatId, text: &str) -> Result<(), Error> {
        sqlx::query(
            "INSERT INTO groups(group_id, join_button_text) VALUES (?, ?)
            ON CONFLICT DO UPDATE SET join_button_text=?;",
        )
        .bind(group.0)
        .bind(text)
        .bind(text)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn set_join_prompt(&self, group: ChatId, text: &str) -> Result<(), Error> {
        sqlx::query(
            "INSERT INTO groups(group_id, join_prompt) VALUES (?, ?)
            ON CONFLICT DO UPDATE SET join_prompt=?;",
        )
        .bind(group.0)
        .bind(text)
        .bind(text)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    // --- Pending-notice ledger ---

    /// Record one sent join prompt: who it's about, which group's
    /// requirements it concerns, and where the message physically is.
    pub async fn record_pending_notice(
        &self,
        user: UserId,
        group: ChatId,
        location: ChatId,
        message: MessageId,
    ) -> Result<(), Error> {
        sqlx::query(
            "INSERT INTO pending_notices(user_id, group_id, chat_id, message_id)
            VALUES (?, ?, ?, ?);",
        )
        .bind(user.0 as i64)
        .bind(group.0)
        .bind(location.0)
        .bind(message.0)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Every user with at least one pending notice, for sweep enumeration.
    pub async fn pending_users(&self) -> Result<Vec<UserId>, Error> {
        sqlx::query("SELECT DISTINCT user_id FROM pending_notices;")
            .map(|row: SqliteRow| UserId(row.get::<i64, _>("user_id") as u64))
            .fetch_all(&self.pool)
            .await
    }

    pub async fn pending_groups(&self, user: UserId) -> Result<Vec<ChatId>, Error> {
        sqlx::query("SELECT DISTINCT group_id FROM pending_notices WHERE user_id=?;")
            .bind(user.0 as i64)
            .map(|row: SqliteRow| ChatId(row.get("group_id")))
            .fetch_all(&self.pool)
            .await
    }

    /// Where every notice for this (user, group) pair was sent.
    pub async fn pending_notices(
        &self,
        user: UserId,
        group: ChatId,
    ) -> Result<Vec<(ChatId, MessageId)>, Error> {
        sqlx::query(
            "SELECT chat_id, message_id FROM pending_notices
            WHERE user_id=? AND group_id=?;",
        )
        .bind(user.0 as i64)
        .bind(group.0)
        .map(|row: SqliteRow| (ChatId(row.get("chat_id")), MessageId(row.get("message_id"))))
        .fetch_all(&self.pool)
        .await
    }

    /// Remove every notice record for this (user, group) pair.
    pub async fn clear_pending_notices(&self, user: UserId, group: ChatId) -> Result<(), Error> {
        sqlx::query("DELETE FROM pending_notices WHERE user_id=? AND group_id=?;")
            .bind(user.0 as i64)
            .bind(group.0)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

fn split_list(stored: &str) -> Vec<String> {
    stored
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}

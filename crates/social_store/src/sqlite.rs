//! SQLite social store implementation.
//!
//! Pair uniqueness is enforced by a `UNIQUE (pair_low, pair_high)` index and
//! acceptance runs in a single transaction that takes the write lock with
//! its first statement.

use std::{collections::HashMap, str::FromStr};

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use entities::{FriendRequest, FriendRequestStatus, Message, User, UserPair};
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    FromRow, Pool, QueryBuilder, Sqlite, SqliteConnection,
};
use uuid::Uuid;

use crate::{FriendRequestFilter, SocialStore, StoreError, StoreResult, UserFilter};

const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS users (
    id TEXT PRIMARY KEY,
    email TEXT NOT NULL UNIQUE,
    full_name TEXT NOT NULL,
    profile_pic TEXT NOT NULL DEFAULT '',
    native_language TEXT NOT NULL DEFAULT '',
    learning_language TEXT NOT NULL DEFAULT '',
    bio TEXT NOT NULL DEFAULT '',
    location TEXT NOT NULL DEFAULT '',
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS friendships (
    user_id TEXT NOT NULL REFERENCES users (id),
    friend_id TEXT NOT NULL REFERENCES users (id),
    PRIMARY KEY (user_id, friend_id)
);

CREATE TABLE IF NOT EXISTS friend_requests (
    id TEXT PRIMARY KEY,
    sender_id TEXT NOT NULL REFERENCES users (id),
    recipient_id TEXT NOT NULL REFERENCES users (id),
    pair_low TEXT NOT NULL,
    pair_high TEXT NOT NULL,
    status TEXT NOT NULL CHECK (status IN ('pending', 'accepted')),
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    CHECK (sender_id <> recipient_id),
    UNIQUE (pair_low, pair_high)
);

CREATE INDEX IF NOT EXISTS idx_friend_requests_sender ON friend_requests (sender_id);
CREATE INDEX IF NOT EXISTS idx_friend_requests_recipient ON friend_requests (recipient_id);

CREATE TABLE IF NOT EXISTS messages (
    id TEXT PRIMARY KEY,
    sender_id TEXT NOT NULL,
    receiver_id TEXT NOT NULL,
    channel_id TEXT NOT NULL,
    text TEXT NOT NULL,
    seen INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_messages_receiver_seen ON messages (receiver_id, seen);
"#;

const USER_COLUMNS: &str = "id, email, full_name, profile_pic, native_language, \
                            learning_language, bio, location, created_at, updated_at";

const REQUEST_COLUMNS: &str = "id, sender_id, recipient_id, status, created_at, updated_at";

const MESSAGE_COLUMNS: &str = "id, sender_id, receiver_id, channel_id, text, seen, created_at";

/// Formats timestamps with a fixed width so that text ordering matches time
/// ordering.
fn format_time(time: &DateTime<Utc>) -> String {
    time.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

fn parse_time(table: &'static str, value: &str) -> StoreResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StoreError::corrupt(table, format!("bad timestamp {value:?}: {e}")))
}

fn parse_uuid(table: &'static str, value: &str) -> StoreResult<Uuid> {
    value
        .parse()
        .map_err(|e| StoreError::corrupt(table, format!("bad id {value:?}: {e}")))
}

fn is_unique_violation(error: &sqlx::Error) -> bool {
    matches!(error, sqlx::Error::Database(db) if db.is_unique_violation())
}

/// Database row for User (without the friends set).
#[derive(Debug, FromRow)]
struct UserRow {
    id: String,
    email: String,
    full_name: String,
    profile_pic: String,
    native_language: String,
    learning_language: String,
    bio: String,
    location: String,
    created_at: String,
    updated_at: String,
}

impl UserRow {
    fn into_user(self, friends: impl IntoIterator<Item = Uuid>) -> StoreResult<User> {
        Ok(User {
            id: parse_uuid("users", &self.id)?,
            email: self.email,
            full_name: self.full_name,
            profile_pic: self.profile_pic,
            native_language: self.native_language,
            learning_language: self.learning_language,
            bio: self.bio,
            location: self.location,
            friends: friends.into_iter().collect(),
            created_at: parse_time("users", &self.created_at)?,
            updated_at: parse_time("users", &self.updated_at)?,
        })
    }
}

/// Database row for FriendRequest.
#[derive(Debug, FromRow)]
struct FriendRequestRow {
    id: String,
    sender_id: String,
    recipient_id: String,
    status: String,
    created_at: String,
    updated_at: String,
}

impl TryFrom<FriendRequestRow> for FriendRequest {
    type Error = StoreError;

    fn try_from(row: FriendRequestRow) -> StoreResult<Self> {
        let status = FriendRequestStatus::parse(&row.status).ok_or_else(|| {
            StoreError::corrupt("friend_requests", format!("bad status {:?}", row.status))
        })?;
        Ok(FriendRequest {
            id: parse_uuid("friend_requests", &row.id)?,
            sender_id: parse_uuid("friend_requests", &row.sender_id)?,
            recipient_id: parse_uuid("friend_requests", &row.recipient_id)?,
            status,
            created_at: parse_time("friend_requests", &row.created_at)?,
            updated_at: parse_time("friend_requests", &row.updated_at)?,
        })
    }
}

/// Database row for Message.
#[derive(Debug, FromRow)]
struct MessageRow {
    id: String,
    sender_id: String,
    receiver_id: String,
    channel_id: String,
    text: String,
    seen: bool,
    created_at: String,
}

impl TryFrom<MessageRow> for Message {
    type Error = StoreError;

    fn try_from(row: MessageRow) -> StoreResult<Self> {
        Ok(Message {
            id: row.id,
            sender_id: parse_uuid("messages", &row.sender_id)?,
            receiver_id: parse_uuid("messages", &row.receiver_id)?,
            channel_id: row.channel_id,
            text: row.text,
            seen: row.seen,
            created_at: parse_time("messages", &row.created_at)?,
        })
    }
}

/// SQLite-backed store.
#[derive(Debug, Clone)]
pub struct SqliteStore {
    pool: Pool<Sqlite>,
}

impl SqliteStore {
    /// Connects to `database_url`, creating the file if needed, and runs the
    /// schema migration.
    pub async fn connect(database_url: &str) -> StoreResult<Self> {
        let options = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        Self::from_pool(pool).await
    }

    /// Opens a private in-memory database.
    ///
    /// The pool holds a single connection because every SQLite in-memory
    /// connection is its own database.
    pub async fn in_memory() -> StoreResult<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;

        Self::from_pool(pool).await
    }

    /// Wraps an existing pool and runs the schema migration.
    pub async fn from_pool(pool: Pool<Sqlite>) -> StoreResult<Self> {
        sqlx::raw_sql(SCHEMA_SQL).execute(&pool).await?;
        tracing::debug!("SQLite schema ready");
        Ok(Self { pool })
    }

    /// Returns a reference to the connection pool.
    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }

    async fn friend_ids(&self, user_id: &str) -> StoreResult<Vec<Uuid>> {
        let rows: Vec<(String,)> =
            sqlx::query_as("SELECT friend_id FROM friendships WHERE user_id = ?")
                .bind(user_id)
                .fetch_all(&self.pool)
                .await?;

        rows.iter()
            .map(|(id,)| parse_uuid("friendships", id))
            .collect()
    }

    async fn hydrate(&self, row: UserRow) -> StoreResult<User> {
        let friends = self.friend_ids(&row.id).await?;
        row.into_user(friends)
    }

    async fn fetch_request(
        conn: &mut SqliteConnection,
        id: Uuid,
    ) -> StoreResult<Option<FriendRequest>> {
        let row: Option<FriendRequestRow> = sqlx::query_as(&format!(
            "SELECT {REQUEST_COLUMNS} FROM friend_requests WHERE id = ?"
        ))
        .bind(id.to_string())
        .fetch_optional(conn)
        .await?;

        row.map(FriendRequest::try_from).transpose()
    }
}

#[async_trait]
impl SocialStore for SqliteStore {
    // =========================================================================
    // User operations
    // =========================================================================

    async fn create_user(&self, user: User) -> StoreResult<User> {
        let mut tx = self.pool.begin().await?;

        let inserted = sqlx::query(&format!(
            "INSERT INTO users ({USER_COLUMNS}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"
        ))
        .bind(user.id.to_string())
        .bind(&user.email)
        .bind(&user.full_name)
        .bind(&user.profile_pic)
        .bind(&user.native_language)
        .bind(&user.learning_language)
        .bind(&user.bio)
        .bind(&user.location)
        .bind(format_time(&user.created_at))
        .bind(format_time(&user.updated_at))
        .execute(&mut *tx)
        .await;

        match inserted {
            Ok(_) => {}
            Err(e) if is_unique_violation(&e) => {
                return Err(StoreError::already_exists("User", user.email.clone()));
            }
            Err(e) => return Err(e.into()),
        }

        for friend_id in &user.friends {
            sqlx::query("INSERT OR IGNORE INTO friendships (user_id, friend_id) VALUES (?, ?)")
                .bind(user.id.to_string())
                .bind(friend_id.to_string())
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(user)
    }

    async fn get_user(&self, id: Uuid) -> StoreResult<Option<User>> {
        let row: Option<UserRow> =
            sqlx::query_as(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?"))
                .bind(id.to_string())
                .fetch_optional(&self.pool)
                .await?;

        match row {
            Some(row) => Ok(Some(self.hydrate(row).await?)),
            None => Ok(None),
        }
    }

    async fn get_users(&self, ids: &[Uuid]) -> StoreResult<Vec<User>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut builder: QueryBuilder<Sqlite> =
            QueryBuilder::new(format!("SELECT {USER_COLUMNS} FROM users WHERE id IN ("));
        let mut separated = builder.separated(", ");
        for id in ids {
            separated.push_bind(id.to_string());
        }
        separated.push_unseparated(")");

        let rows: Vec<UserRow> = builder.build_query_as().fetch_all(&self.pool).await?;

        let mut by_id = HashMap::with_capacity(rows.len());
        for row in rows {
            let user = self.hydrate(row).await?;
            by_id.insert(user.id, user);
        }

        // Keep the caller's order.
        Ok(ids.iter().filter_map(|id| by_id.remove(id)).collect())
    }

    async fn list_users(&self, filter: UserFilter) -> StoreResult<Vec<User>> {
        let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new(format!(
            "SELECT {USER_COLUMNS} FROM users ORDER BY created_at DESC, id ASC"
        ));
        push_pagination(&mut builder, filter.limit, filter.offset);

        let rows: Vec<UserRow> = builder.build_query_as().fetch_all(&self.pool).await?;

        let mut users = Vec::with_capacity(rows.len());
        for row in rows {
            users.push(self.hydrate(row).await?);
        }
        Ok(users)
    }

    // =========================================================================
    // Friend request operations
    // =========================================================================

    async fn create_friend_request(&self, request: FriendRequest) -> StoreResult<FriendRequest> {
        let pair = request.pair();

        let inserted = sqlx::query(
            "INSERT INTO friend_requests (id, sender_id, recipient_id, pair_low, pair_high, \
             status, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(request.id.to_string())
        .bind(request.sender_id.to_string())
        .bind(request.recipient_id.to_string())
        .bind(pair.low().to_string())
        .bind(pair.high().to_string())
        .bind(request.status.as_str())
        .bind(format_time(&request.created_at))
        .bind(format_time(&request.updated_at))
        .execute(&self.pool)
        .await;

        match inserted {
            Ok(_) => Ok(request),
            Err(e) if is_unique_violation(&e) => {
                Err(StoreError::already_exists("FriendRequest", pair.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn get_friend_request(&self, id: Uuid) -> StoreResult<Option<FriendRequest>> {
        let mut conn = self.pool.acquire().await?;
        Self::fetch_request(&mut conn, id).await
    }

    async fn find_friend_request_between(
        &self,
        a: Uuid,
        b: Uuid,
    ) -> StoreResult<Option<FriendRequest>> {
        let pair = UserPair::new(a, b);
        let row: Option<FriendRequestRow> = sqlx::query_as(&format!(
            "SELECT {REQUEST_COLUMNS} FROM friend_requests WHERE pair_low = ? AND pair_high = ?"
        ))
        .bind(pair.low().to_string())
        .bind(pair.high().to_string())
        .fetch_optional(&self.pool)
        .await?;

        row.map(FriendRequest::try_from).transpose()
    }

    async fn list_friend_requests(
        &self,
        filter: FriendRequestFilter,
    ) -> StoreResult<Vec<FriendRequest>> {
        let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new(format!(
            "SELECT {REQUEST_COLUMNS} FROM friend_requests WHERE 1 = 1"
        ));
        if let Some(sender_id) = filter.sender_id {
            builder
                .push(" AND sender_id = ")
                .push_bind(sender_id.to_string());
        }
        if let Some(recipient_id) = filter.recipient_id {
            builder
                .push(" AND recipient_id = ")
                .push_bind(recipient_id.to_string());
        }
        if let Some(user_id) = filter.involving {
            builder
                .push(" AND (sender_id = ")
                .push_bind(user_id.to_string())
                .push(" OR recipient_id = ")
                .push_bind(user_id.to_string())
                .push(")");
        }
        if let Some(status) = filter.status {
            builder.push(" AND status = ").push_bind(status.as_str());
        }
        builder.push(" ORDER BY created_at DESC, id ASC");
        push_pagination(&mut builder, filter.limit, filter.offset);

        let rows: Vec<FriendRequestRow> = builder.build_query_as().fetch_all(&self.pool).await?;
        rows.into_iter().map(FriendRequest::try_from).collect()
    }

    async fn accept_friend_request(&self, id: Uuid) -> StoreResult<FriendRequest> {
        let mut tx = self.pool.begin().await?;
        let now = format_time(&Utc::now());

        // Write first: the conditional update takes the database write lock,
        // so a concurrent accept blocks here and then sees zero rows.
        let flipped = sqlx::query(
            "UPDATE friend_requests SET status = ?, updated_at = ? WHERE id = ? AND status = ?",
        )
        .bind(FriendRequestStatus::Accepted.as_str())
        .bind(&now)
        .bind(id.to_string())
        .bind(FriendRequestStatus::Pending.as_str())
        .execute(&mut *tx)
        .await?
        .rows_affected();

        let request = Self::fetch_request(&mut tx, id)
            .await?
            .ok_or_else(|| StoreError::not_found("FriendRequest", id.to_string()))?;

        if flipped == 0 {
            return Err(StoreError::invalid_transition(
                request.status,
                FriendRequestStatus::Accepted,
            ));
        }

        let sender = request.sender_id.to_string();
        let recipient = request.recipient_id.to_string();
        for (user_id, friend_id) in [(&sender, &recipient), (&recipient, &sender)] {
            sqlx::query("INSERT OR IGNORE INTO friendships (user_id, friend_id) VALUES (?, ?)")
                .bind(user_id)
                .bind(friend_id)
                .execute(&mut *tx)
                .await?;
        }

        sqlx::query("UPDATE users SET updated_at = ? WHERE id IN (?, ?)")
            .bind(&now)
            .bind(&sender)
            .bind(&recipient)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(request)
    }

    // =========================================================================
    // Message operations
    // =========================================================================

    async fn create_message(&self, message: Message) -> StoreResult<Message> {
        let inserted = sqlx::query(&format!(
            "INSERT INTO messages ({MESSAGE_COLUMNS}) VALUES (?, ?, ?, ?, ?, ?, ?)"
        ))
        .bind(&message.id)
        .bind(message.sender_id.to_string())
        .bind(message.receiver_id.to_string())
        .bind(&message.channel_id)
        .bind(&message.text)
        .bind(message.seen)
        .bind(format_time(&message.created_at))
        .execute(&self.pool)
        .await;

        match inserted {
            Ok(_) => Ok(message),
            Err(e) if is_unique_violation(&e) => {
                Err(StoreError::already_exists("Message", message.id.clone()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn list_unseen_messages(&self, receiver_id: Uuid) -> StoreResult<Vec<Message>> {
        let rows: Vec<MessageRow> = sqlx::query_as(&format!(
            "SELECT {MESSAGE_COLUMNS} FROM messages WHERE receiver_id = ? AND seen = 0 \
             ORDER BY created_at DESC, id ASC"
        ))
        .bind(receiver_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Message::try_from).collect()
    }

    async fn mark_messages_seen(&self, receiver_id: Uuid, channel_id: &str) -> StoreResult<u64> {
        let result = sqlx::query(
            "UPDATE messages SET seen = 1 WHERE receiver_id = ? AND channel_id = ? AND seen = 0",
        )
        .bind(receiver_id.to_string())
        .bind(channel_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }
}

fn push_pagination(builder: &mut QueryBuilder<Sqlite>, limit: Option<u32>, offset: Option<u32>) {
    // SQLite only accepts OFFSET after a LIMIT; -1 means unbounded.
    if limit.is_some() || offset.is_some() {
        builder
            .push(" LIMIT ")
            .push_bind(limit.map_or(-1, i64::from))
            .push(" OFFSET ")
            .push_bind(i64::from(offset.unwrap_or(0)));
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    async fn store_with_pair() -> (SqliteStore, User, User) {
        let store = SqliteStore::in_memory().await.unwrap();
        let ana = store
            .create_user(User::new("ana@example.com", "Ana").with_languages("spanish", "english"))
            .await
            .unwrap();
        let ben = store
            .create_user(User::new("ben@example.com", "Ben"))
            .await
            .unwrap();
        (store, ana, ben)
    }

    #[tokio::test]
    async fn test_user_round_trip() {
        let (store, ana, _) = store_with_pair().await;

        let fetched = store.get_user(ana.id).await.unwrap().unwrap();
        assert_eq!(fetched, ana);

        let duplicate = store.create_user(User::new("ana@example.com", "Again")).await;
        assert!(matches!(duplicate, Err(StoreError::AlreadyExists { .. })));

        assert!(store.get_user(Uuid::new_v4()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_get_users_keeps_order() {
        let (store, ana, ben) = store_with_pair().await;

        let users = store.get_users(&[ben.id, ana.id]).await.unwrap();
        let names: Vec<_> = users.iter().map(|u| u.full_name.as_str()).collect();
        assert_eq!(names, vec!["Ben", "Ana"]);
    }

    #[tokio::test]
    async fn test_pair_unique_index() {
        let (store, ana, ben) = store_with_pair().await;

        store
            .create_friend_request(FriendRequest::new(ana.id, ben.id))
            .await
            .unwrap();
        let reverse = store
            .create_friend_request(FriendRequest::new(ben.id, ana.id))
            .await;
        assert!(matches!(reverse, Err(StoreError::AlreadyExists { .. })));
    }

    #[tokio::test]
    async fn test_accept_is_atomic_and_single_shot() {
        let (store, ana, ben) = store_with_pair().await;
        let request = store
            .create_friend_request(FriendRequest::new(ana.id, ben.id))
            .await
            .unwrap();

        let accepted = store.accept_friend_request(request.id).await.unwrap();
        assert_eq!(accepted.status, FriendRequestStatus::Accepted);

        let ana = store.get_user(ana.id).await.unwrap().unwrap();
        let ben = store.get_user(ben.id).await.unwrap().unwrap();
        assert!(ana.is_friend_of(ben.id));
        assert!(ben.is_friend_of(ana.id));

        let again = store.accept_friend_request(request.id).await;
        assert!(matches!(
            again,
            Err(StoreError::InvalidStateTransition { .. })
        ));

        let missing = store.accept_friend_request(Uuid::new_v4()).await;
        assert!(matches!(missing, Err(StoreError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_list_filters_and_pagination() {
        let (store, ana, ben) = store_with_pair().await;
        let cleo = store
            .create_user(User::new("cleo@example.com", "Cleo"))
            .await
            .unwrap();

        store
            .create_friend_request(FriendRequest::new(ana.id, ben.id))
            .await
            .unwrap();
        store
            .create_friend_request(FriendRequest::new(ana.id, cleo.id))
            .await
            .unwrap();

        let sent = store
            .list_friend_requests(FriendRequestFilter::sent_by(ana.id))
            .await
            .unwrap();
        assert_eq!(sent.len(), 2);
        assert!(sent[0].created_at >= sent[1].created_at);

        let first_page = store
            .list_friend_requests(FriendRequestFilter {
                involving: Some(ana.id),
                limit: Some(1),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(first_page.len(), 1);

        let for_cleo = store
            .list_friend_requests(
                FriendRequestFilter::received_by(cleo.id)
                    .with_status(FriendRequestStatus::Pending),
            )
            .await
            .unwrap();
        assert_eq!(for_cleo.len(), 1);
        assert_eq!(for_cleo[0].sender_id, ana.id);
    }

    #[tokio::test]
    async fn test_messages() {
        let (store, ana, ben) = store_with_pair().await;

        store
            .create_message(Message::new("m-1", ana.id, ben.id, "chan", "hola"))
            .await
            .unwrap();
        let duplicate = store
            .create_message(Message::new("m-1", ana.id, ben.id, "chan", "hola"))
            .await;
        assert!(matches!(duplicate, Err(StoreError::AlreadyExists { .. })));

        let unseen = store.list_unseen_messages(ben.id).await.unwrap();
        assert_eq!(unseen.len(), 1);
        assert_eq!(unseen[0].text, "hola");

        assert_eq!(store.mark_messages_seen(ben.id, "chan").await.unwrap(), 1);
        assert!(store.list_unseen_messages(ben.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_concurrent_sends_persist_one_row() {
        let (store, ana, ben) = store_with_pair().await;
        let store = Arc::new(store);

        let mut handles = Vec::new();
        for i in 0..100 {
            let store = Arc::clone(&store);
            let (from, to) = if i % 2 == 0 {
                (ana.id, ben.id)
            } else {
                (ben.id, ana.id)
            };
            handles.push(tokio::spawn(async move {
                store.create_friend_request(FriendRequest::new(from, to)).await
            }));
        }

        let mut created = 0;
        for handle in handles {
            if handle.await.unwrap().is_ok() {
                created += 1;
            }
        }
        assert_eq!(created, 1);

        let rows = store
            .list_friend_requests(FriendRequestFilter::involving(ana.id))
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
    }
}

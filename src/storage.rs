//! SQLite storage layer for parley.
//!
//! Owns the three persisted entity types (users, conversations, messages),
//! schema creation, and all CRUD operations. Conversations are keyed by the
//! sorted participant pair with a UNIQUE index, so find-or-create cannot
//! produce duplicates under concurrent first-messages. Unread counters are
//! updated with single-statement increments/resets rather than
//! read-modify-write.

use std::path::{Path, PathBuf};

use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub enum StorageError {
    Sqlite(rusqlite::Error),
    Io(std::io::Error),
    NotFound(String),
}

impl std::fmt::Display for StorageError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StorageError::Sqlite(e) => write!(f, "sqlite error: {e}"),
            StorageError::Io(e) => write!(f, "io error: {e}"),
            StorageError::NotFound(msg) => write!(f, "not found: {msg}"),
        }
    }
}

impl std::error::Error for StorageError {}

impl From<rusqlite::Error> for StorageError {
    fn from(e: rusqlite::Error) -> Self {
        StorageError::Sqlite(e)
    }
}

impl From<std::io::Error> for StorageError {
    fn from(e: std::io::Error) -> Self {
        StorageError::Io(e)
    }
}

// ---------------------------------------------------------------------------
// Enumerated column values
// ---------------------------------------------------------------------------

/// Classification of a message body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentKind {
    Text,
    Image,
    Video,
}

impl ContentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentKind::Text => "text",
            ContentKind::Image => "image",
            ContentKind::Video => "video",
        }
    }

    /// Classify an uploaded file by its MIME type. Returns `None` for
    /// unsupported types.
    pub fn from_mime(mime: &str) -> Option<Self> {
        if mime.starts_with("image/") {
            Some(ContentKind::Image)
        } else if mime.starts_with("video/") {
            Some(ContentKind::Video)
        } else {
            None
        }
    }
}

/// Delivery status of a message. Transitions move forward only:
/// `sent -> delivered -> read`. `delivered` is a reserved state with no
/// transition into it yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageStatus {
    Sent,
    Delivered,
    Read,
}

impl MessageStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageStatus::Sent => "sent",
            MessageStatus::Delivered => "delivered",
            MessageStatus::Read => "read",
        }
    }
}

// ---------------------------------------------------------------------------
// Row types
// ---------------------------------------------------------------------------

/// User row stored in the database. Addressable by phone number or email;
/// at least one is always present (enforced by a table CHECK).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserRow {
    pub user_id: String,
    pub phone_number: Option<String>,
    pub phone_suffix: Option<String>,
    pub username: Option<String>,
    pub email: Option<String>,
    pub otp_code: Option<String>,
    pub otp_expires_at: Option<u64>,
    pub profile_picture: Option<String>,
    pub about: Option<String>,
    pub last_seen: Option<u64>,
    pub is_online: bool,
    pub is_verified: bool,
    pub agreed: bool,
    pub created_at: u64,
    pub updated_at: u64,
}

/// Conversation row: exactly two participants, stored sorted so the pair is
/// a stable key. Carries the last-message snapshot and the unread counter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationRow {
    pub conversation_id: String,
    pub participant_a: String,
    pub participant_b: String,
    pub last_message: Option<String>,
    pub latest_message_id: Option<String>,
    pub unread_count: u32,
    pub created_at: u64,
    pub updated_at: u64,
}

impl ConversationRow {
    pub fn participants(&self) -> [&str; 2] {
        [&self.participant_a, &self.participant_b]
    }

    pub fn has_participant(&self, user_id: &str) -> bool {
        self.participant_a == user_id || self.participant_b == user_id
    }
}

/// Message row stored in the database. Exactly one of `content` / `media_url`
/// populates the body, mirrored by `content_kind`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageRow {
    pub message_id: String,
    pub conversation_id: String,
    pub sender_id: String,
    pub receiver_id: String,
    pub content: Option<String>,
    pub media_url: Option<String>,
    pub content_kind: String,
    pub status: String,
    pub created_at: u64,
    pub updated_at: u64,
}

/// Normalize a participant pair: sorted ascending so (a, b) and (b, a) map
/// to the same conversation key.
pub fn normalize_pair<'a>(x: &'a str, y: &'a str) -> (&'a str, &'a str) {
    if x <= y {
        (x, y)
    } else {
        (y, x)
    }
}

/// Path of the database file inside a data directory.
pub fn db_path(data_dir: &Path) -> PathBuf {
    data_dir.join("parley.db")
}

// ---------------------------------------------------------------------------
// Storage handle
// ---------------------------------------------------------------------------

/// Main storage handle wrapping a SQLite connection.
pub struct Storage {
    conn: Connection,
}

const USER_COLUMNS: &str = "user_id, phone_number, phone_suffix, username, email,
        otp_code, otp_expires_at, profile_picture, about, last_seen,
        is_online, is_verified, agreed, created_at, updated_at";

const MESSAGE_COLUMNS: &str = "message_id, conversation_id, sender_id, receiver_id,
        content, media_url, content_kind, status, created_at, updated_at";

const CONVERSATION_COLUMNS: &str = "conversation_id, participant_a, participant_b,
        last_message, latest_message_id, unread_count, created_at, updated_at";

fn map_user(row: &rusqlite::Row<'_>) -> rusqlite::Result<UserRow> {
    Ok(UserRow {
        user_id: row.get(0)?,
        phone_number: row.get(1)?,
        phone_suffix: row.get(2)?,
        username: row.get(3)?,
        email: row.get(4)?,
        otp_code: row.get(5)?,
        otp_expires_at: row.get::<_, Option<i64>>(6)?.map(|v| v as u64),
        profile_picture: row.get(7)?,
        about: row.get(8)?,
        last_seen: row.get::<_, Option<i64>>(9)?.map(|v| v as u64),
        is_online: row.get::<_, i32>(10)? != 0,
        is_verified: row.get::<_, i32>(11)? != 0,
        agreed: row.get::<_, i32>(12)? != 0,
        created_at: row.get::<_, i64>(13)? as u64,
        updated_at: row.get::<_, i64>(14)? as u64,
    })
}

fn map_message(row: &rusqlite::Row<'_>) -> rusqlite::Result<MessageRow> {
    Ok(MessageRow {
        message_id: row.get(0)?,
        conversation_id: row.get(1)?,
        sender_id: row.get(2)?,
        receiver_id: row.get(3)?,
        content: row.get(4)?,
        media_url: row.get(5)?,
        content_kind: row.get(6)?,
        status: row.get(7)?,
        created_at: row.get::<_, i64>(8)? as u64,
        updated_at: row.get::<_, i64>(9)? as u64,
    })
}

fn map_conversation(row: &rusqlite::Row<'_>) -> rusqlite::Result<ConversationRow> {
    Ok(ConversationRow {
        conversation_id: row.get(0)?,
        participant_a: row.get(1)?,
        participant_b: row.get(2)?,
        last_message: row.get(3)?,
        latest_message_id: row.get(4)?,
        unread_count: row.get::<_, i64>(5)? as u32,
        created_at: row.get::<_, i64>(6)? as u64,
        updated_at: row.get::<_, i64>(7)? as u64,
    })
}

impl Storage {
    /// Open or create a database at the given path. Creates schema if needed.
    pub fn open(path: &Path) -> Result<Self, StorageError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
        let storage = Self { conn };
        storage.create_schema()?;
        Ok(storage)
    }

    /// Create an in-memory database, used by tests and ephemeral servers.
    pub fn open_in_memory() -> Result<Self, StorageError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        let storage = Self { conn };
        storage.create_schema()?;
        Ok(storage)
    }

    fn create_schema(&self) -> Result<(), StorageError> {
        self.conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS users (
                user_id         TEXT PRIMARY KEY,
                phone_number    TEXT UNIQUE,
                phone_suffix    TEXT,
                username        TEXT,
                email           TEXT UNIQUE COLLATE NOCASE,
                otp_code        TEXT,
                otp_expires_at  INTEGER,
                profile_picture TEXT,
                about           TEXT,
                last_seen       INTEGER,
                is_online       INTEGER NOT NULL DEFAULT 0,
                is_verified     INTEGER NOT NULL DEFAULT 0,
                agreed          INTEGER NOT NULL DEFAULT 0,
                created_at      INTEGER NOT NULL,
                updated_at      INTEGER NOT NULL,
                CHECK (phone_number IS NOT NULL OR email IS NOT NULL)
            );

            CREATE TABLE IF NOT EXISTS conversations (
                conversation_id   TEXT PRIMARY KEY,
                participant_a     TEXT NOT NULL REFERENCES users(user_id),
                participant_b     TEXT NOT NULL REFERENCES users(user_id),
                last_message      TEXT,
                latest_message_id TEXT,
                unread_count      INTEGER NOT NULL DEFAULT 0,
                created_at        INTEGER NOT NULL,
                updated_at        INTEGER NOT NULL,
                UNIQUE (participant_a, participant_b)
            );

            CREATE TABLE IF NOT EXISTS messages (
                message_id      TEXT PRIMARY KEY,
                conversation_id TEXT NOT NULL REFERENCES conversations(conversation_id),
                sender_id       TEXT NOT NULL,
                receiver_id     TEXT NOT NULL,
                content         TEXT,
                media_url       TEXT,
                content_kind    TEXT NOT NULL,
                status          TEXT NOT NULL DEFAULT 'sent',
                created_at      INTEGER NOT NULL,
                updated_at      INTEGER NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_messages_conversation
                ON messages(conversation_id, created_at);
            CREATE INDEX IF NOT EXISTS idx_messages_receiver
                ON messages(receiver_id, status);
            CREATE INDEX IF NOT EXISTS idx_conversations_participants
                ON conversations(participant_a, participant_b);
            ",
        )?;
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Users
    // -----------------------------------------------------------------------

    pub fn insert_user(&self, row: &UserRow) -> Result<(), StorageError> {
        self.conn.execute(
            "INSERT INTO users (user_id, phone_number, phone_suffix, username, email,
                otp_code, otp_expires_at, profile_picture, about, last_seen,
                is_online, is_verified, agreed, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)",
            params![
                row.user_id,
                row.phone_number,
                row.phone_suffix,
                row.username,
                row.email,
                row.otp_code,
                row.otp_expires_at.map(|v| v as i64),
                row.profile_picture,
                row.about,
                row.last_seen.map(|v| v as i64),
                row.is_online as i32,
                row.is_verified as i32,
                row.agreed as i32,
                row.created_at as i64,
                row.updated_at as i64,
            ],
        )?;
        Ok(())
    }

    pub fn get_user(&self, user_id: &str) -> Result<Option<UserRow>, StorageError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE user_id = ?1");
        let row = self
            .conn
            .query_row(&sql, params![user_id], map_user)
            .optional()?;
        Ok(row)
    }

    pub fn find_user_by_phone(&self, phone_number: &str) -> Result<Option<UserRow>, StorageError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE phone_number = ?1");
        let row = self
            .conn
            .query_row(&sql, params![phone_number], map_user)
            .optional()?;
        Ok(row)
    }

    /// Case-insensitive email lookup; the column collates NOCASE and callers
    /// store emails lowercased.
    pub fn find_user_by_email(&self, email: &str) -> Result<Option<UserRow>, StorageError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE email = ?1");
        let row = self
            .conn
            .query_row(&sql, params![email], map_user)
            .optional()?;
        Ok(row)
    }

    /// Store a pending OTP code and its expiry on a user row.
    pub fn set_otp(
        &self,
        user_id: &str,
        code: &str,
        expires_at: u64,
        now: u64,
    ) -> Result<(), StorageError> {
        let affected = self.conn.execute(
            "UPDATE users SET otp_code = ?2, otp_expires_at = ?3, updated_at = ?4
             WHERE user_id = ?1",
            params![user_id, code, expires_at as i64, now as i64],
        )?;
        if affected == 0 {
            return Err(StorageError::NotFound(format!("user {user_id}")));
        }
        Ok(())
    }

    /// Successful verification: set the verified flag, clear OTP state, and
    /// stamp presence. The verified flag never transitions back.
    pub fn mark_verified(&self, user_id: &str, now: u64) -> Result<(), StorageError> {
        let affected = self.conn.execute(
            "UPDATE users SET is_verified = 1, otp_code = NULL, otp_expires_at = NULL,
                is_online = 1, last_seen = ?2, updated_at = ?2
             WHERE user_id = ?1",
            params![user_id, now as i64],
        )?;
        if affected == 0 {
            return Err(StorageError::NotFound(format!("user {user_id}")));
        }
        Ok(())
    }

    /// Partial profile update: only supplied fields are written.
    pub fn update_profile(
        &self,
        user_id: &str,
        username: Option<&str>,
        about: Option<&str>,
        agreed: Option<bool>,
        profile_picture: Option<&str>,
        now: u64,
    ) -> Result<(), StorageError> {
        let mut sets: Vec<String> = Vec::new();
        let mut bind_values: Vec<Box<dyn rusqlite::types::ToSql>> = Vec::new();

        if let Some(v) = username {
            bind_values.push(Box::new(v.to_string()));
            sets.push(format!("username = ?{}", bind_values.len()));
        }
        if let Some(v) = about {
            bind_values.push(Box::new(v.to_string()));
            sets.push(format!("about = ?{}", bind_values.len()));
        }
        if let Some(v) = agreed {
            bind_values.push(Box::new(v as i32));
            sets.push(format!("agreed = ?{}", bind_values.len()));
        }
        if let Some(v) = profile_picture {
            bind_values.push(Box::new(v.to_string()));
            sets.push(format!("profile_picture = ?{}", bind_values.len()));
        }

        bind_values.push(Box::new(now as i64));
        sets.push(format!("updated_at = ?{}", bind_values.len()));

        bind_values.push(Box::new(user_id.to_string()));
        let sql = format!(
            "UPDATE users SET {} WHERE user_id = ?{}",
            sets.join(", "),
            bind_values.len()
        );

        let bind_refs: Vec<&dyn rusqlite::types::ToSql> =
            bind_values.iter().map(|b| b.as_ref()).collect();
        let affected = self.conn.execute(&sql, bind_refs.as_slice())?;
        if affected == 0 {
            return Err(StorageError::NotFound(format!("user {user_id}")));
        }
        Ok(())
    }

    pub fn set_online(&self, user_id: &str, online: bool, now: u64) -> Result<(), StorageError> {
        self.conn.execute(
            "UPDATE users SET is_online = ?2, last_seen = ?3, updated_at = ?3
             WHERE user_id = ?1",
            params![user_id, online as i32, now as i64],
        )?;
        Ok(())
    }

    /// Every user except the given one, newest first.
    pub fn list_users_except(&self, user_id: &str) -> Result<Vec<UserRow>, StorageError> {
        let sql = format!(
            "SELECT {USER_COLUMNS} FROM users WHERE user_id != ?1 ORDER BY created_at DESC"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params![user_id], map_user)?;

        let mut result = Vec::new();
        for row in rows {
            result.push(row?);
        }
        Ok(result)
    }

    pub fn count_users(&self) -> Result<u64, StorageError> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    // -----------------------------------------------------------------------
    // Conversations
    // -----------------------------------------------------------------------

    /// Find the conversation for a participant pair, creating it if absent.
    ///
    /// The pair is normalized (sorted) before lookup and the table carries a
    /// UNIQUE constraint on it, so two racing first-messages converge on one
    /// row: the losing INSERT is ignored and the follow-up SELECT returns the
    /// winner's conversation.
    pub fn find_or_create_conversation(
        &self,
        user_x: &str,
        user_y: &str,
        new_id: &str,
        now: u64,
    ) -> Result<ConversationRow, StorageError> {
        let (a, b) = normalize_pair(user_x, user_y);
        self.conn.execute(
            "INSERT INTO conversations
                (conversation_id, participant_a, participant_b, unread_count, created_at, updated_at)
             VALUES (?1, ?2, ?3, 0, ?4, ?4)
             ON CONFLICT (participant_a, participant_b) DO NOTHING",
            params![new_id, a, b, now as i64],
        )?;
        self.conversation_between(a, b)?
            .ok_or_else(|| StorageError::NotFound(format!("conversation for {a}/{b}")))
    }

    pub fn get_conversation(
        &self,
        conversation_id: &str,
    ) -> Result<Option<ConversationRow>, StorageError> {
        let sql = format!(
            "SELECT {CONVERSATION_COLUMNS} FROM conversations WHERE conversation_id = ?1"
        );
        let row = self
            .conn
            .query_row(&sql, params![conversation_id], map_conversation)
            .optional()?;
        Ok(row)
    }

    pub fn conversation_between(
        &self,
        user_x: &str,
        user_y: &str,
    ) -> Result<Option<ConversationRow>, StorageError> {
        let (a, b) = normalize_pair(user_x, user_y);
        let sql = format!(
            "SELECT {CONVERSATION_COLUMNS} FROM conversations
             WHERE participant_a = ?1 AND participant_b = ?2"
        );
        let row = self
            .conn
            .query_row(&sql, params![a, b], map_conversation)
            .optional()?;
        Ok(row)
    }

    /// All conversations the user participates in, most recently active first.
    pub fn list_conversations_for(&self, user_id: &str) -> Result<Vec<ConversationRow>, StorageError> {
        let sql = format!(
            "SELECT {CONVERSATION_COLUMNS} FROM conversations
             WHERE participant_a = ?1 OR participant_b = ?1
             ORDER BY updated_at DESC"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params![user_id], map_conversation)?;

        let mut result = Vec::new();
        for row in rows {
            result.push(row?);
        }
        Ok(result)
    }

    /// Record a freshly sent message on its conversation: bump the unread
    /// counter atomically, point at the latest message, and refresh the text
    /// snapshot when the message carried text.
    pub fn record_message_sent(
        &self,
        conversation_id: &str,
        snapshot: Option<&str>,
        latest_message_id: &str,
        now: u64,
    ) -> Result<(), StorageError> {
        let affected = self.conn.execute(
            "UPDATE conversations
             SET unread_count = unread_count + 1,
                 last_message = COALESCE(?2, last_message),
                 latest_message_id = ?3,
                 updated_at = ?4
             WHERE conversation_id = ?1",
            params![conversation_id, snapshot, latest_message_id, now as i64],
        )?;
        if affected == 0 {
            return Err(StorageError::NotFound(format!(
                "conversation {conversation_id}"
            )));
        }
        Ok(())
    }

    /// Reset the unread counter, typically after a read-receipt sweep.
    pub fn reset_unread(&self, conversation_id: &str, now: u64) -> Result<(), StorageError> {
        self.conn.execute(
            "UPDATE conversations SET unread_count = 0, updated_at = ?2
             WHERE conversation_id = ?1",
            params![conversation_id, now as i64],
        )?;
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Messages
    // -----------------------------------------------------------------------

    pub fn insert_message(&self, row: &MessageRow) -> Result<(), StorageError> {
        self.conn.execute(
            "INSERT INTO messages (message_id, conversation_id, sender_id, receiver_id,
                content, media_url, content_kind, status, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                row.message_id,
                row.conversation_id,
                row.sender_id,
                row.receiver_id,
                row.content,
                row.media_url,
                row.content_kind,
                row.status,
                row.created_at as i64,
                row.updated_at as i64,
            ],
        )?;
        Ok(())
    }

    pub fn get_message(&self, message_id: &str) -> Result<Option<MessageRow>, StorageError> {
        let sql = format!("SELECT {MESSAGE_COLUMNS} FROM messages WHERE message_id = ?1");
        let row = self
            .conn
            .query_row(&sql, params![message_id], map_message)
            .optional()?;
        Ok(row)
    }

    /// Messages of a conversation in creation order (ascending), paginated.
    pub fn list_messages(
        &self,
        conversation_id: &str,
        offset: u32,
        limit: u32,
    ) -> Result<Vec<MessageRow>, StorageError> {
        let sql = format!(
            "SELECT {MESSAGE_COLUMNS} FROM messages
             WHERE conversation_id = ?1
             ORDER BY created_at ASC, rowid ASC
             LIMIT ?2 OFFSET ?3"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(
            params![conversation_id, limit as i64, offset as i64],
            map_message,
        )?;

        let mut result = Vec::new();
        for row in rows {
            result.push(row?);
        }
        Ok(result)
    }

    /// Read-receipt sweep for a whole conversation: every sent/delivered
    /// message addressed to `receiver_id` becomes read. Returns how many
    /// rows changed.
    pub fn mark_conversation_read(
        &self,
        conversation_id: &str,
        receiver_id: &str,
        now: u64,
    ) -> Result<usize, StorageError> {
        let affected = self.conn.execute(
            "UPDATE messages SET status = 'read', updated_at = ?3
             WHERE conversation_id = ?1 AND receiver_id = ?2
               AND status IN ('sent', 'delivered')",
            params![conversation_id, receiver_id, now as i64],
        )?;
        Ok(affected)
    }

    /// Bulk read-receipt for an explicit id set. Only messages addressed to
    /// `receiver_id` are touched. Returns how many rows changed.
    pub fn mark_messages_read(
        &self,
        message_ids: &[String],
        receiver_id: &str,
        now: u64,
    ) -> Result<usize, StorageError> {
        if message_ids.is_empty() {
            return Ok(0);
        }

        let mut bind_values: Vec<Box<dyn rusqlite::types::ToSql>> = vec![
            Box::new(receiver_id.to_string()),
            Box::new(now as i64),
        ];
        let mut placeholders = Vec::with_capacity(message_ids.len());
        for id in message_ids {
            bind_values.push(Box::new(id.clone()));
            placeholders.push(format!("?{}", bind_values.len()));
        }

        let sql = format!(
            "UPDATE messages SET status = 'read', updated_at = ?2
             WHERE receiver_id = ?1 AND status IN ('sent', 'delivered')
               AND message_id IN ({})",
            placeholders.join(", ")
        );

        let bind_refs: Vec<&dyn rusqlite::types::ToSql> =
            bind_values.iter().map(|b| b.as_ref()).collect();
        let affected = self.conn.execute(&sql, bind_refs.as_slice())?;
        Ok(affected)
    }

    /// Delete a message by id. Returns whether a row was removed.
    pub fn delete_message(&self, message_id: &str) -> Result<bool, StorageError> {
        let affected = self.conn.execute(
            "DELETE FROM messages WHERE message_id = ?1",
            params![message_id],
        )?;
        Ok(affected > 0)
    }

    pub fn count_messages(&self) -> Result<u64, StorageError> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM messages", [], |row| row.get(0))?;
        Ok(count as u64)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

//! Post and user repository implementation

use std::collections::BTreeSet;

use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use crate::error::Result;
use crate::models::{Post, User};

/// Watermark reported by [`Store::latest_post_id`] for an owner with no stored posts.
///
/// Legacy quirk: a real post with id `1` is indistinguishable from "nothing stored".
/// New code should use [`Store::watermark`] instead.
pub const NO_POSTS_WATERMARK: i64 = 1;

/// Result of an insert-or-ignore write
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    /// The row was new and has been written
    Inserted,
    /// A row with the same key already existed; nothing changed
    Duplicate,
}

impl InsertOutcome {
    pub const fn is_inserted(self) -> bool {
        matches!(self, Self::Inserted)
    }
}

/// Trait for post and user storage operations
pub trait Store {
    /// Insert a post unless its id is already stored
    fn put_post(&self, post: &Post) -> Result<InsertOutcome>;

    /// Insert a user unless its id is already stored
    fn put_user(&self, user: &User) -> Result<InsertOutcome>;

    /// Get a post by id
    fn get_post(&self, id: i64) -> Result<Option<Post>>;

    /// Get a user by id
    fn get_user(&self, id: i64) -> Result<Option<User>>;

    /// Highest stored post id for the owner, if any
    fn watermark(&self, owner_id: i64) -> Result<Option<i64>>;

    /// Highest stored post id for the owner, or [`NO_POSTS_WATERMARK`]
    fn latest_post_id(&self, owner_id: i64) -> Result<i64> {
        Ok(self.watermark(owner_id)?.unwrap_or(NO_POSTS_WATERMARK))
    }

    /// The owner's post with the most recent `first_seen_at`
    fn latest_inserted_post(&self, owner_id: i64) -> Result<Option<Post>>;

    /// The owner's posts created at or after `since`, newest id first
    fn posts_by(&self, owner_id: i64, since: DateTime<Utc>) -> Result<Vec<Post>>;

    /// Candidates that are not in the users table
    fn unknown_ids(&self, candidates: &BTreeSet<i64>) -> Result<BTreeSet<i64>>;

    /// All known users ordered by display name
    fn users(&self) -> Result<Vec<User>>;

    /// Number of the owner's posts created on the given UTC calendar date
    fn post_count_for_date(&self, owner_id: i64, date: NaiveDate) -> Result<u32>;

    /// One `(display_name, count)` row per known user for the given UTC date,
    /// ordered by display name. Users without posts that day report zero.
    fn post_counts_for_all(&self, date: NaiveDate) -> Result<Vec<(String, u32)>>;
}

/// `SQLite` implementation of `Store`
pub struct SqliteStore<'a> {
    conn: &'a Connection,
}

impl<'a> SqliteStore<'a> {
    /// Create a new repository with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Parse a post from a database row
    fn parse_post(row: &rusqlite::Row<'_>) -> rusqlite::Result<Post> {
        Ok(Post {
            id: row.get(0)?,
            owner_id: row.get(1)?,
            created_at: millis_column(row, 2)?,
            first_seen_at: millis_column(row, 3)?,
            payload: row.get(4)?,
        })
    }

    fn parse_user(row: &rusqlite::Row<'_>) -> rusqlite::Result<User> {
        Ok(User {
            id: row.get(0)?,
            display_name: row.get(1)?,
        })
    }
}

const POST_COLUMNS: &str = "id, owner_id, created_at, first_seen_at, payload";

impl Store for SqliteStore<'_> {
    fn put_post(&self, post: &Post) -> Result<InsertOutcome> {
        let rows = self.conn.execute(
            "INSERT OR IGNORE INTO posts (id, owner_id, created_at, first_seen_at, payload)
             VALUES (?, ?, ?, ?, ?)",
            params![
                post.id,
                post.owner_id,
                post.created_at.timestamp_millis(),
                post.first_seen_at.timestamp_millis(),
                post.payload
            ],
        )?;

        Ok(outcome(rows))
    }

    fn put_user(&self, user: &User) -> Result<InsertOutcome> {
        let rows = self.conn.execute(
            "INSERT OR IGNORE INTO users (id, display_name) VALUES (?, ?)",
            params![user.id, user.display_name],
        )?;

        Ok(outcome(rows))
    }

    fn get_post(&self, id: i64) -> Result<Option<Post>> {
        let post = self
            .conn
            .query_row(
                &format!("SELECT {POST_COLUMNS} FROM posts WHERE id = ?"),
                params![id],
                Self::parse_post,
            )
            .optional()?;
        Ok(post)
    }

    fn get_user(&self, id: i64) -> Result<Option<User>> {
        let user = self
            .conn
            .query_row(
                "SELECT id, display_name FROM users WHERE id = ?",
                params![id],
                Self::parse_user,
            )
            .optional()?;
        Ok(user)
    }

    fn watermark(&self, owner_id: i64) -> Result<Option<i64>> {
        let max_id = self.conn.query_row(
            "SELECT MAX(id) FROM posts WHERE owner_id = ?",
            params![owner_id],
            |row| row.get::<_, Option<i64>>(0),
        )?;
        Ok(max_id)
    }

    fn latest_inserted_post(&self, owner_id: i64) -> Result<Option<Post>> {
        let post = self
            .conn
            .query_row(
                &format!(
                    "SELECT {POST_COLUMNS} FROM posts
                     WHERE owner_id = ?
                     ORDER BY first_seen_at DESC, id DESC
                     LIMIT 1"
                ),
                params![owner_id],
                Self::parse_post,
            )
            .optional()?;
        Ok(post)
    }

    fn posts_by(&self, owner_id: i64, since: DateTime<Utc>) -> Result<Vec<Post>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {POST_COLUMNS} FROM posts
             WHERE owner_id = ? AND created_at >= ?
             ORDER BY id DESC"
        ))?;

        let posts = stmt
            .query_map(
                params![owner_id, since.timestamp_millis()],
                Self::parse_post,
            )?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(posts)
    }

    fn unknown_ids(&self, candidates: &BTreeSet<i64>) -> Result<BTreeSet<i64>> {
        let mut stmt = self
            .conn
            .prepare_cached("SELECT EXISTS(SELECT 1 FROM users WHERE id = ?)")?;

        let mut unknown = BTreeSet::new();
        for &id in candidates {
            let known: bool = stmt.query_row(params![id], |row| row.get(0))?;
            if !known {
                unknown.insert(id);
            }
        }

        Ok(unknown)
    }

    fn users(&self) -> Result<Vec<User>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, display_name FROM users ORDER BY display_name ASC, id ASC")?;

        let users = stmt
            .query_map([], Self::parse_user)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(users)
    }

    fn post_count_for_date(&self, owner_id: i64, date: NaiveDate) -> Result<u32> {
        let (start, end) = day_bounds_millis(date);
        let count = self.conn.query_row(
            "SELECT COUNT(*) FROM posts
             WHERE owner_id = ? AND created_at >= ? AND created_at < ?",
            params![owner_id, start, end],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    fn post_counts_for_all(&self, date: NaiveDate) -> Result<Vec<(String, u32)>> {
        let (start, end) = day_bounds_millis(date);
        let mut stmt = self.conn.prepare(
            "SELECT u.display_name, COUNT(p.id)
             FROM users u
             LEFT JOIN posts p
                ON p.owner_id = u.id AND p.created_at >= ? AND p.created_at < ?
             GROUP BY u.id
             ORDER BY u.display_name ASC, u.id ASC",
        )?;

        let counts = stmt
            .query_map(params![start, end], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, u32>(1)?))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(counts)
    }
}

const fn outcome(rows_changed: usize) -> InsertOutcome {
    if rows_changed == 0 {
        InsertOutcome::Duplicate
    } else {
        InsertOutcome::Inserted
    }
}

/// Read a Unix-millisecond column, rejecting values chrono cannot represent
fn millis_column(row: &rusqlite::Row<'_>, index: usize) -> rusqlite::Result<DateTime<Utc>> {
    let ms: i64 = row.get(index)?;
    DateTime::from_timestamp_millis(ms).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            index,
            rusqlite::types::Type::Integer,
            format!("timestamp {ms} ms is out of range").into(),
        )
    })
}

/// Half-open `[start, end)` range of a UTC calendar day in Unix milliseconds
fn day_bounds_millis(date: NaiveDate) -> (i64, i64) {
    let start = date.and_time(chrono::NaiveTime::MIN).and_utc();
    let end = start + chrono::Duration::days(1);
    (start.timestamp_millis(), end.timestamp_millis())
}

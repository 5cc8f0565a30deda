use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

/// Tables in child-before-parent order, so deleting in this order never
/// trips a foreign key.
pub const DATA_TABLES: &[&str] = &[
    "saved_comments",
    "saved_posts",
    "comment_votes",
    "votes",
    "comments",
    "messages",
    "posts",
    "notes",
    "users",
];

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);")?;

    let version: i64 =
        conn.query_row("SELECT COALESCE(MAX(version), 0) FROM schema_version", [], |r| r.get(0))?;

    if version < 1 {
        info!("Running migration v1 (initial schema)");
        conn.execute_batch(
            "
            CREATE TABLE users (
                id          TEXT PRIMARY KEY,
                username    TEXT NOT NULL UNIQUE,
                password    TEXT NOT NULL,
                created_at  TEXT NOT NULL,
                updated_at  TEXT
            );

            -- user_id carries no foreign key: notes outlive their owner.
            CREATE TABLE notes (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                title       TEXT NOT NULL,
                content     TEXT NOT NULL,
                created_at  TEXT NOT NULL,
                updated_at  TEXT,
                user_id     TEXT NOT NULL
            );

            CREATE TABLE posts (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                title       TEXT NOT NULL,
                content     TEXT NOT NULL,
                votes       INTEGER NOT NULL DEFAULT 0,
                subreddit   TEXT NOT NULL DEFAULT 'general',
                author_id   TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE
            );

            CREATE TABLE votes (
                id          TEXT PRIMARY KEY,
                user_id     TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                post_id     INTEGER NOT NULL REFERENCES posts(id) ON DELETE CASCADE,
                value       INTEGER NOT NULL CHECK (value IN (-1, 1)),
                UNIQUE(user_id, post_id)
            );

            -- author_id carries no foreign key: comments outlive their author.
            CREATE TABLE comments (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                content     TEXT NOT NULL,
                created_at  TEXT NOT NULL,
                post_id     INTEGER NOT NULL REFERENCES posts(id) ON DELETE CASCADE,
                author_id   TEXT NOT NULL,
                parent_id   INTEGER REFERENCES comments(id) ON DELETE CASCADE
            );

            CREATE INDEX idx_comments_post ON comments(post_id, id);

            CREATE TABLE comment_votes (
                id          TEXT PRIMARY KEY,
                user_id     TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                comment_id  INTEGER NOT NULL REFERENCES comments(id) ON DELETE CASCADE,
                value       INTEGER NOT NULL CHECK (value IN (-1, 1)),
                UNIQUE(user_id, comment_id)
            );

            CREATE INDEX idx_comment_votes_comment ON comment_votes(comment_id);

            CREATE TABLE messages (
                id          TEXT PRIMARY KEY,
                sender_id   TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                receiver_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                content     TEXT NOT NULL,
                timestamp   TEXT NOT NULL
            );

            CREATE INDEX idx_messages_pair ON messages(sender_id, receiver_id, timestamp);

            CREATE TABLE saved_posts (
                user_id     TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                post_id     INTEGER NOT NULL REFERENCES posts(id) ON DELETE CASCADE,
                created_at  TEXT NOT NULL,
                PRIMARY KEY (user_id, post_id)
            );

            CREATE TABLE saved_comments (
                user_id     TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                comment_id  INTEGER NOT NULL REFERENCES comments(id) ON DELETE CASCADE,
                created_at  TEXT NOT NULL,
                PRIMARY KEY (user_id, comment_id)
            );

            CREATE TABLE logs (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                timestamp   TEXT NOT NULL,
                session_id  TEXT NOT NULL,
                action_type TEXT NOT NULL,
                payload     TEXT NOT NULL
            );

            CREATE INDEX idx_logs_session ON logs(session_id, id);

            INSERT INTO schema_version (version) VALUES (1);
            ",
        )?;
    }

    info!("Database migrations complete");
    Ok(())
}

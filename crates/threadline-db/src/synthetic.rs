//! Deterministic fake data for the synthetic environment. The same seed
//! always produces the same users, posts, threads and votes.

use anyhow::Result;
use chrono::{DateTime, TimeDelta, Utc};
use rand::rngs::StdRng;
use rand::seq::IndexedRandom;
use rand::{Rng, SeedableRng};
use rusqlite::Connection;
use tracing::info;
use uuid::Uuid;

use crate::Database;
use crate::migrations::DATA_TABLES;
use crate::models::{MessageRow, UserRow};
use crate::queries::{insert_comment, insert_message_row, insert_note, insert_post, insert_user};

pub const DEFAULT_SEED: &str = "0000000000000000";

const USER_COUNT: usize = 5;
const NOTES_PER_USER: usize = 3;
const POSTS_PER_USER: usize = 5;
const MAX_REPLY_DEPTH: usize = 2;
const SUBREDDITS: &[&str] = &["general", "memes", "news", "tech"];

/// 2025-01-01T00:00:00Z; seeded timestamps fall within the following year.
const EPOCH_SECS: i64 = 1_735_689_600;
const YEAR_SECS: i64 = 365 * 24 * 3600;

const ADJECTIVES: &[&str] = &[
    "quiet", "brave", "lucky", "rapid", "sleepy", "clever", "gentle", "wild", "cosmic", "rusty",
    "silver", "happy", "fuzzy", "bold", "calm", "witty",
];

const NOUNS: &[&str] = &[
    "otter", "falcon", "badger", "comet", "willow", "pixel", "harbor", "maple", "lantern", "tiger",
    "panda", "river", "cactus", "raven", "summit", "ember",
];

const WORDS: &[&str] = &[
    "the", "system", "market", "people", "quickly", "build", "simple", "network", "after", "every",
    "morning", "coffee", "river", "decide", "small", "future", "debate", "strong", "history", "city",
    "window", "garden", "answer", "before", "project", "music", "travel", "during", "modern", "light",
    "result", "follow", "energy", "share", "question", "nothing", "around", "change", "report", "team",
];

const BUZZ_A: &[&str] = &["Adaptive", "Balanced", "Distributed", "Focused", "Integrated", "Open-source", "Secure"];
const BUZZ_B: &[&str] = &["asynchronous", "client-driven", "dynamic", "incremental", "modular", "zero-defect"];
const BUZZ_C: &[&str] = &["architecture", "framework", "hierarchy", "middleware", "paradigm", "workflow"];

/// Counts of what one seeding pass wrote.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SeedSummary {
    pub users: usize,
    pub notes: usize,
    pub posts: usize,
    pub comments: usize,
    pub votes: usize,
    pub comment_votes: usize,
    pub messages: usize,
}

/// Numeric seeds are used as-is; anything else is folded with FNV-1a.
pub fn seed_value(seed: &str) -> u64 {
    if let Ok(n) = seed.parse::<u64>() {
        return n;
    }
    seed.bytes().fold(0xcbf2_9ce4_8422_2325, |hash, b| {
        (hash ^ u64::from(b)).wrapping_mul(0x0100_0000_01b3)
    })
}

impl Database {
    /// Wipe every domain table (the audit log is untouched) and repopulate
    /// from `seed`, all in one transaction.
    pub fn reset(&self, seed: &str) -> Result<SeedSummary> {
        let summary = self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            wipe(&tx)?;
            let summary = populate(&tx, seed)?;
            tx.commit()?;
            Ok(summary)
        })?;

        info!(
            "Seeded database with seed {:?}: {} users, {} posts, {} comments, {} votes",
            seed, summary.users, summary.posts, summary.comments, summary.votes
        );
        Ok(summary)
    }
}

fn wipe(conn: &Connection) -> Result<()> {
    for table in DATA_TABLES {
        conn.execute(&format!("DELETE FROM {table}"), [])?;
    }
    // Restart AUTOINCREMENT ids so a reseed reproduces the same ids.
    conn.execute("DELETE FROM sqlite_sequence WHERE name != 'logs'", [])?;
    Ok(())
}

fn populate(conn: &Connection, seed: &str) -> Result<SeedSummary> {
    let mut fake = Faker::new(seed_value(seed));
    let mut summary = SeedSummary::default();

    // -- Users --
    let mut users = Vec::with_capacity(USER_COUNT);
    for i in 0..USER_COUNT {
        let user = UserRow {
            id: fake.uuid().to_string(),
            username: fake.username(i),
            password: fake.password(),
            created_at: fake.timestamp(),
            updated_at: None,
        };
        insert_user(conn, &user)?;
        users.push(user);
    }
    summary.users = users.len();

    // -- Notes --
    for user in &users {
        for _ in 0..NOTES_PER_USER {
            insert_note(conn, &user.id, &fake.catch_phrase(), &fake.paragraph(3), fake.timestamp())?;
            summary.notes += 1;
        }
    }

    // -- Posts, with vote rows whose sum becomes the counter --
    let mut post_ids = Vec::new();
    for author in &users {
        for _ in 0..POSTS_PER_USER {
            let title = fake.sentence(6);
            let content = fake.paragraph(3);
            let subreddit = fake.pick(SUBREDDITS);

            let ballots: Vec<(&str, i64)> = users
                .iter()
                .filter_map(|voter| fake.ballot().map(|value| (voter.id.as_str(), value)))
                .collect();
            let total: i64 = ballots.iter().map(|(_, v)| v).sum();

            let post_id = insert_post(conn, &author.id, &title, &content, subreddit, total)?;
            for (voter_id, value) in ballots {
                insert_vote(conn, "votes", "post_id", &fake.uuid(), voter_id, post_id, value)?;
                summary.votes += 1;
            }
            post_ids.push(post_id);
        }
    }
    summary.posts = post_ids.len();

    // -- Comment threads --
    for &post_id in &post_ids {
        let roots = fake.rng.random_range(2..=5);
        for _ in 0..roots {
            seed_thread(conn, &mut fake, &users, post_id, None, 0, &mut summary)?;
        }
    }

    // -- Messages --
    for (i, a) in users.iter().enumerate() {
        for b in &users[i + 1..] {
            for _ in 0..fake.rng.random_range(0..=3) {
                let (sender, receiver) = if fake.rng.random_bool(0.5) { (a, b) } else { (b, a) };
                let row = MessageRow {
                    id: fake.uuid().to_string(),
                    sender_id: sender.id.clone(),
                    receiver_id: receiver.id.clone(),
                    content: fake.sentence(8),
                    timestamp: fake.timestamp(),
                };
                insert_message_row(conn, &row)?;
                summary.messages += 1;
            }
        }
    }

    Ok(summary)
}

/// Insert one comment, its votes, and up to two replies per level until
/// `MAX_REPLY_DEPTH`.
fn seed_thread(
    conn: &Connection,
    fake: &mut Faker,
    users: &[UserRow],
    post_id: i64,
    parent_id: Option<i64>,
    depth: usize,
    summary: &mut SeedSummary,
) -> Result<()> {
    let author = fake.pick(users);
    let comment_id = insert_comment(conn, post_id, &author.id, parent_id, &fake.paragraph(2), fake.timestamp())?;
    summary.comments += 1;

    for voter in users {
        if fake.rng.random_bool(0.3) {
            let value = if fake.rng.random_bool(0.75) { 1 } else { -1 };
            insert_vote(conn, "comment_votes", "comment_id", &fake.uuid(), &voter.id, comment_id, value)?;
            summary.comment_votes += 1;
        }
    }

    if depth < MAX_REPLY_DEPTH {
        for _ in 0..fake.rng.random_range(0..=2) {
            seed_thread(conn, fake, users, post_id, Some(comment_id), depth + 1, summary)?;
        }
    }
    Ok(())
}

fn insert_vote(
    conn: &Connection,
    table: &str,
    target_column: &str,
    id: &Uuid,
    user_id: &str,
    target_id: i64,
    value: i64,
) -> Result<()> {
    conn.execute(
        &format!("INSERT INTO {table} (id, user_id, {target_column}, value) VALUES (?1, ?2, ?3, ?4)"),
        rusqlite::params![id.to_string(), user_id, target_id, value],
    )?;
    Ok(())
}

struct Faker {
    rng: StdRng,
}

impl Faker {
    fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    fn pick<'a, T>(&mut self, items: &'a [T]) -> &'a T {
        // Callers only pass non-empty constant tables.
        items.choose(&mut self.rng).unwrap_or(&items[0])
    }

    fn uuid(&mut self) -> Uuid {
        uuid::Builder::from_random_bytes(self.rng.random()).into_uuid()
    }

    /// Unique per index so seeding never trips the username constraint.
    fn username(&mut self, index: usize) -> String {
        let adjective = self.pick(ADJECTIVES);
        let noun = self.pick(NOUNS);
        format!("{adjective}_{noun}{}{index}", self.rng.random_range(10..100))
    }

    fn password(&mut self) -> String {
        const CHARSET: &[u8] = b"abcdefghijkmnopqrstuvwxyzABCDEFGHJKLMNPQRSTUVWXYZ23456789!@#$%";
        (0..12)
            .map(|_| char::from(*self.pick(CHARSET)))
            .collect()
    }

    fn sentence(&mut self, words: usize) -> String {
        let mut text: String = (0..words)
            .map(|_| *self.pick(WORDS))
            .collect::<Vec<_>>()
            .join(" ");
        if let Some(first) = text.get_mut(0..1) {
            first.make_ascii_uppercase();
        }
        text.push('.');
        text
    }

    fn paragraph(&mut self, sentences: usize) -> String {
        (0..sentences)
            .map(|_| {
                let len = self.rng.random_range(4..=10);
                self.sentence(len)
            })
            .collect::<Vec<_>>()
            .join(" ")
    }

    fn catch_phrase(&mut self) -> String {
        format!("{} {} {}", self.pick(BUZZ_A), self.pick(BUZZ_B), self.pick(BUZZ_C))
    }

    fn timestamp(&mut self) -> DateTime<Utc> {
        let offset = self.rng.random_range(0..YEAR_SECS);
        DateTime::<Utc>::UNIX_EPOCH + TimeDelta::seconds(EPOCH_SECS + offset)
    }

    /// A seeded user's vote on a post: mostly up, sometimes down, often none.
    fn ballot(&mut self) -> Option<i64> {
        match self.rng.random_range(0..10) {
            0..=4 => Some(1),
            5..=6 => Some(-1),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use threadline_types::api::PostSort;

    #[test]
    fn test_seed_value() {
        assert_eq!(seed_value("42"), 42);
        assert_eq!(seed_value(DEFAULT_SEED), 0);
        assert_eq!(seed_value("abc"), seed_value("abc"));
        assert_ne!(seed_value("abc"), seed_value("abd"));
    }

    #[test]
    fn test_same_seed_same_data() {
        let a = Database::open_in_memory().unwrap();
        let b = Database::open_in_memory().unwrap();
        let summary_a = a.reset("demo").unwrap();
        let summary_b = b.reset("demo").unwrap();
        assert_eq!(summary_a, summary_b);

        let names = |db: &Database| db.list_users().unwrap().into_iter().map(|u| (u.id, u.username)).collect::<Vec<_>>();
        assert_eq!(names(&a), names(&b));

        let titles = |db: &Database| db.list_posts(PostSort::New, None).unwrap().into_iter().map(|p| (p.id, p.title, p.votes)).collect::<Vec<_>>();
        assert_eq!(titles(&a), titles(&b));
    }

    #[test]
    fn test_reset_replaces_data_and_keeps_invariants() {
        let db = Database::open_in_memory().unwrap();
        db.reset("first").unwrap();
        db.create_user("intruder", "pw").unwrap();
        db.insert_log("s", "click", "{}").unwrap();

        let summary = db.reset("first").unwrap();
        assert_eq!(summary.users, USER_COUNT);
        assert_eq!(summary.posts, USER_COUNT * POSTS_PER_USER);
        assert!(db.get_user_by_username("intruder").unwrap().is_none());
        assert_eq!(db.count_logs().unwrap(), 1);

        let posts = db.list_posts(PostSort::New, None).unwrap();
        assert_eq!(posts.iter().map(|p| p.id).min(), Some(1));
        for post in &posts {
            assert_eq!(post.votes, db.post_vote_sum(post.id).unwrap());
            let comments = db.comments_for_post(post.id).unwrap();
            assert!(comments.iter().filter(|c| c.parent_id.is_none()).count() >= 2);
        }
    }
}

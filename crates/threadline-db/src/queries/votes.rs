use std::collections::HashMap;

use anyhow::{Result, bail};
use rusqlite::{Connection, OptionalExtension, TransactionBehavior};
use uuid::Uuid;

use crate::Database;
use crate::models::{VoteChange, VoteOutcome};

/// Decide what a vote request does given the user's current row value.
/// `requested` is +1, -1, or 0 for "clear my vote".
pub fn plan_vote(previous: Option<i64>, requested: i64) -> VoteChange {
    match (previous, requested) {
        (None, 0) => VoteChange::Unchanged,
        (Some(_), 0) => VoteChange::Removed,
        (None, _) => VoteChange::Inserted,
        (Some(old), new) if old == new => VoteChange::Unchanged,
        (Some(_), _) => VoteChange::Updated,
    }
}

/// Table layout for one kind of vote target.
struct VoteTable {
    votes: &'static str,
    target_column: &'static str,
}

const POST_VOTES: VoteTable = VoteTable {
    votes: "votes",
    target_column: "post_id",
};

const COMMENT_VOTES: VoteTable = VoteTable {
    votes: "comment_votes",
    target_column: "comment_id",
};

impl Database {
    // -- Votes --

    /// Apply one vote to a post. The `posts.votes` counter moves by the same
    /// delta as the vote rows, inside the same transaction. Returns `None`
    /// when the post does not exist.
    pub fn record_post_vote(&self, post_id: i64, user_id: &str, value: i64) -> Result<Option<VoteOutcome>> {
        ensure_vote_value(value)?;

        self.with_conn_mut(|conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

            let counter: Option<i64> = tx
                .query_row("SELECT votes FROM posts WHERE id = ?1", [post_id], |row| row.get(0))
                .optional()?;
            let Some(counter) = counter else {
                return Ok(None);
            };

            let (change, previous, delta) = apply_vote(&tx, &POST_VOTES, post_id, user_id, value)?;
            if change == VoteChange::Unchanged {
                return Ok(Some(VoteOutcome { change, previous, current: previous, total: counter }));
            }

            tx.execute(
                "UPDATE posts SET votes = votes + ?1 WHERE id = ?2",
                rusqlite::params![delta, post_id],
            )?;
            tx.commit()?;

            Ok(Some(VoteOutcome {
                change,
                previous,
                current: (value != 0).then_some(value),
                total: counter + delta,
            }))
        })
    }

    /// Apply one vote to a comment. Comments keep no counter; the total is
    /// summed from the rows after the write. Returns `None` when the comment
    /// does not exist.
    pub fn record_comment_vote(&self, comment_id: i64, user_id: &str, value: i64) -> Result<Option<VoteOutcome>> {
        ensure_vote_value(value)?;

        self.with_conn_mut(|conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

            let exists: bool = tx.query_row(
                "SELECT EXISTS(SELECT 1 FROM comments WHERE id = ?1)",
                [comment_id],
                |row| row.get(0),
            )?;
            if !exists {
                return Ok(None);
            }

            let (change, previous, _) = apply_vote(&tx, &COMMENT_VOTES, comment_id, user_id, value)?;
            let total = query_comment_total(&tx, comment_id)?;
            if change == VoteChange::Unchanged {
                return Ok(Some(VoteOutcome { change, previous, current: previous, total }));
            }
            tx.commit()?;

            Ok(Some(VoteOutcome {
                change,
                previous,
                current: (value != 0).then_some(value),
                total,
            }))
        })
    }

    /// The user's current vote on a post, if any.
    pub fn post_vote_of(&self, post_id: i64, user_id: &str) -> Result<Option<i64>> {
        self.with_conn(|conn| existing_vote(conn, &POST_VOTES, post_id, user_id).map(|v| v.map(|(_, value)| value)))
    }

    /// Number of vote rows a user holds on a post.
    pub fn post_vote_rows(&self, post_id: i64, user_id: &str) -> Result<i64> {
        self.with_conn(|conn| {
            Ok(conn.query_row(
                "SELECT COUNT(*) FROM votes WHERE post_id = ?1 AND user_id = ?2",
                rusqlite::params![post_id, user_id],
                |row| row.get(0),
            )?)
        })
    }

    /// Sum of a post's vote rows, independent of the denormalized counter.
    pub fn post_vote_sum(&self, post_id: i64) -> Result<i64> {
        self.with_conn(|conn| {
            Ok(conn.query_row(
                "SELECT COALESCE(SUM(value), 0) FROM votes WHERE post_id = ?1",
                [post_id],
                |row| row.get(0),
            )?)
        })
    }

    pub fn comment_vote_total(&self, comment_id: i64) -> Result<i64> {
        self.with_conn(|conn| query_comment_total(conn, comment_id))
    }

    /// Live totals for every voted comment on a post. Comments without votes
    /// are absent from the map.
    pub fn comment_vote_totals_for_post(&self, post_id: i64) -> Result<HashMap<i64, i64>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT cv.comment_id, SUM(cv.value)
                 FROM comment_votes cv
                 JOIN comments c ON c.id = cv.comment_id
                 WHERE c.post_id = ?1
                 GROUP BY cv.comment_id",
            )?;
            let totals = stmt
                .query_map([post_id], |row| Ok((row.get(0)?, row.get(1)?)))?
                .collect::<std::result::Result<HashMap<i64, i64>, _>>()?;
            Ok(totals)
        })
    }

    /// Batch-fetch live totals for a set of comment ids.
    pub fn comment_vote_totals(&self, comment_ids: &[i64]) -> Result<HashMap<i64, i64>> {
        if comment_ids.is_empty() {
            return Ok(HashMap::new());
        }

        self.with_conn(|conn| {
            let placeholders: Vec<String> = (1..=comment_ids.len()).map(|i| format!("?{}", i)).collect();
            let sql = format!(
                "SELECT comment_id, SUM(value) FROM comment_votes WHERE comment_id IN ({}) GROUP BY comment_id",
                placeholders.join(", ")
            );
            let mut stmt = conn.prepare(&sql)?;
            let totals = stmt
                .query_map(rusqlite::params_from_iter(comment_ids), |row| Ok((row.get(0)?, row.get(1)?)))?
                .collect::<std::result::Result<HashMap<i64, i64>, _>>()?;
            Ok(totals)
        })
    }
}

fn ensure_vote_value(value: i64) -> Result<()> {
    if !matches!(value, -1..=1) {
        bail!("Vote value must be -1, 0 or 1, got {}", value);
    }
    Ok(())
}

fn existing_vote(conn: &Connection, table: &VoteTable, target_id: i64, user_id: &str) -> Result<Option<(String, i64)>> {
    let sql = format!(
        "SELECT id, value FROM {} WHERE {} = ?1 AND user_id = ?2",
        table.votes, table.target_column
    );
    let row = conn
        .query_row(&sql, rusqlite::params![target_id, user_id], |row| Ok((row.get(0)?, row.get(1)?)))
        .optional()?;
    Ok(row)
}

/// Write the vote row change. Returns the change, the previous value and the
/// delta to the target's net score.
fn apply_vote(
    conn: &Connection,
    table: &VoteTable,
    target_id: i64,
    user_id: &str,
    value: i64,
) -> Result<(VoteChange, Option<i64>, i64)> {
    let existing = existing_vote(conn, table, target_id, user_id)?;
    let previous = existing.as_ref().map(|(_, v)| *v);
    let change = plan_vote(previous, value);

    let delta = match (change, existing) {
        (VoteChange::Inserted, _) => {
            conn.execute(
                &format!(
                    "INSERT INTO {} (id, user_id, {}, value) VALUES (?1, ?2, ?3, ?4)",
                    table.votes, table.target_column
                ),
                rusqlite::params![Uuid::new_v4().to_string(), user_id, target_id, value],
            )?;
            value
        }
        (VoteChange::Updated, Some((id, old))) => {
            conn.execute(
                &format!("UPDATE {} SET value = ?1 WHERE id = ?2", table.votes),
                rusqlite::params![value, id],
            )?;
            value - old
        }
        (VoteChange::Removed, Some((id, old))) => {
            conn.execute(&format!("DELETE FROM {} WHERE id = ?1", table.votes), [id])?;
            -old
        }
        _ => 0,
    };

    Ok((change, previous, delta))
}

fn query_comment_total(conn: &Connection, comment_id: i64) -> Result<i64> {
    Ok(conn.query_row(
        "SELECT COALESCE(SUM(value), 0) FROM comment_votes WHERE comment_id = ?1",
        [comment_id],
        |row| row.get(0),
    )?)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::thread;

    use super::plan_vote;
    use crate::models::VoteChange;
    use crate::queries::test_support::{db, post, user};

    #[test]
    fn test_plan_vote_table() {
        assert_eq!(plan_vote(None, 1), VoteChange::Inserted);
        assert_eq!(plan_vote(None, -1), VoteChange::Inserted);
        assert_eq!(plan_vote(None, 0), VoteChange::Unchanged);
        assert_eq!(plan_vote(Some(1), 1), VoteChange::Unchanged);
        assert_eq!(plan_vote(Some(1), -1), VoteChange::Updated);
        assert_eq!(plan_vote(Some(-1), 0), VoteChange::Removed);
    }

    #[test]
    fn test_up_down_neutral_scenario() {
        let db = db();
        let alice = user(&db, "alice");
        let post = post(&db, &alice);
        assert_eq!(post.votes, 0);

        let up = db.record_post_vote(post.id, &alice.id, 1).unwrap().unwrap();
        assert_eq!((up.change, up.previous, up.current, up.total), (VoteChange::Inserted, None, Some(1), 1));

        let down = db.record_post_vote(post.id, &alice.id, -1).unwrap().unwrap();
        assert_eq!((down.change, down.previous, down.current, down.total), (VoteChange::Updated, Some(1), Some(-1), -1));

        let cleared = db.record_post_vote(post.id, &alice.id, 0).unwrap().unwrap();
        assert_eq!((cleared.change, cleared.previous, cleared.current, cleared.total), (VoteChange::Removed, Some(-1), None, 0));

        assert_eq!(db.post_vote_rows(post.id, &alice.id).unwrap(), 0);
        assert_eq!(db.get_post(post.id).unwrap().unwrap().votes, 0);
    }

    #[test]
    fn test_repeat_vote_is_unchanged() {
        let db = db();
        let alice = user(&db, "alice");
        let post = post(&db, &alice);

        db.record_post_vote(post.id, &alice.id, 1).unwrap();
        let again = db.record_post_vote(post.id, &alice.id, 1).unwrap().unwrap();
        assert!(again.is_unchanged());
        assert_eq!(again.total, 1);
        assert_eq!(db.post_vote_rows(post.id, &alice.id).unwrap(), 1);
        assert_eq!(db.get_post(post.id).unwrap().unwrap().votes, 1);
    }

    #[test]
    fn test_counter_tracks_row_sum_across_users() {
        let db = db();
        let users: Vec<_> = ["a", "b", "c", "d"].iter().map(|n| user(&db, n)).collect();
        let post = post(&db, &users[0]);

        let script: &[(usize, i64)] = &[(0, 1), (1, 1), (2, -1), (1, -1), (3, 1), (0, 0), (2, -1), (3, 0), (1, 1)];
        for &(who, value) in script {
            db.record_post_vote(post.id, &users[who].id, value).unwrap();
            let counter = db.get_post(post.id).unwrap().unwrap().votes;
            assert_eq!(counter, db.post_vote_sum(post.id).unwrap());
            for u in &users {
                assert!(db.post_vote_rows(post.id, &u.id).unwrap() <= 1);
            }
        }
        // b: +1, c: -1
        assert_eq!(db.post_vote_sum(post.id).unwrap(), 0);
        assert_eq!(db.post_vote_of(post.id, &users[1].id).unwrap(), Some(1));
    }

    #[test]
    fn test_concurrent_votes_insert_one_row() {
        let db = Arc::new(db());
        let alice = user(&db, "alice");
        let post = post(&db, &alice);

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let db = db.clone();
                let user_id = alice.id.clone();
                thread::spawn(move || db.record_post_vote(post.id, &user_id, 1).unwrap().unwrap())
            })
            .collect();

        let outcomes: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        let inserted = outcomes.iter().filter(|o| o.change == VoteChange::Inserted).count();
        assert_eq!(inserted, 1);
        assert_eq!(db.post_vote_rows(post.id, &alice.id).unwrap(), 1);
        assert_eq!(db.get_post(post.id).unwrap().unwrap().votes, 1);
    }

    #[test]
    fn test_comment_total_is_live_sum() {
        let db = db();
        let alice = user(&db, "alice");
        let bob = user(&db, "bob");
        let post = post(&db, &alice);
        let comment = db.create_comment(post.id, &alice.id, None, "hi").unwrap();

        assert_eq!(db.comment_vote_total(comment.id).unwrap(), 0);
        assert_eq!(db.record_comment_vote(comment.id, &alice.id, 1).unwrap().unwrap().total, 1);
        assert_eq!(db.record_comment_vote(comment.id, &bob.id, 1).unwrap().unwrap().total, 2);
        assert_eq!(db.record_comment_vote(comment.id, &bob.id, -1).unwrap().unwrap().total, 0);
        assert_eq!(db.comment_vote_total(comment.id).unwrap(), 0);
        assert_eq!(db.record_comment_vote(comment.id, &alice.id, 0).unwrap().unwrap().total, -1);

        let totals = db.comment_vote_totals_for_post(post.id).unwrap();
        assert_eq!(totals.get(&comment.id), Some(&-1));
        assert_eq!(db.comment_vote_totals(&[comment.id]).unwrap(), totals);
    }

    #[test]
    fn test_missing_targets_and_bad_values() {
        let db = db();
        let alice = user(&db, "alice");
        assert!(db.record_post_vote(404, &alice.id, 1).unwrap().is_none());
        assert!(db.record_comment_vote(404, &alice.id, 1).unwrap().is_none());

        let post = post(&db, &alice);
        assert!(db.record_post_vote(post.id, &alice.id, 2).is_err());
        assert_eq!(db.post_vote_sum(post.id).unwrap(), 0);
    }
}

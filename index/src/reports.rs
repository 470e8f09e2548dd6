//! Usage analytics over the audit log.
//!
//! Each report is a read-only query (or an in-memory aggregation) against
//! the `audit` table, plus joins into `document` where citations are
//! involved. Time windows compare the stored `event_time` text against
//! SQLite's `datetime('now', ...)`, which works because both use the same
//! `YYYY-MM-DD HH:MM:SS` UTC format.

use std::collections::HashMap;

use anyhow::{Context, Result};
use rusqlite::params;

use sage_types::DocumentId;

use crate::store::Store;

/// A per-day count (queries or active users).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DailyCount {
    pub date: String,
    pub count: i64,
}

/// One user's engagement summary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserActivity {
    pub user_label: String,
    pub query_count: i64,
    pub first_query: String,
    pub last_query: String,
    pub active_days: i64,
}

/// Citation count for one document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentUsage {
    pub document_id: DocumentId,
    pub title: String,
    pub authors: String,
    pub reference_count: u64,
}

/// Frequency of one keyword across all queries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeywordCount {
    pub keyword: String,
    pub count: u64,
}

/// Frequency of one repeated multi-word query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhraseCount {
    pub phrase: String,
    pub count: i64,
}

/// Aggregate system-level metrics.
#[derive(Debug, Clone, PartialEq)]
pub struct SystemStats {
    pub total_users: i64,
    pub total_queries: i64,
    pub total_documents: i64,
    pub total_chunks: i64,
    pub queries_last_24h: i64,
    pub active_users_last_24h: i64,
    pub avg_queries_per_day: f64,
}

/// Function words never worth surfacing as keywords.
const STOPWORDS: &[&str] = &[
    "a", "an", "the", "and", "or", "but", "if", "then", "else", "when", "while", "for", "to",
    "of", "in", "on", "at", "by", "with", "from", "into", "over", "under", "between", "through",
    "is", "are", "was", "were", "be", "been", "being", "am", "do", "did", "doing", "have", "has",
    "had", "having", "will", "can", "may", "might", "must", "shall", "not", "no", "nor", "so",
    "than", "too", "very", "just", "only", "also", "that", "this", "these", "those", "it", "its",
    "i", "me", "my", "we", "our", "you", "your", "he", "him", "his", "she", "her", "they",
    "them", "their", "what", "which", "who", "whom", "whose", "where", "why", "how", "there",
    "here", "all", "any", "both", "each", "few", "more", "most", "other", "some", "such", "own",
    "same", "as", "up", "down", "out", "off", "again", "further", "once", "because", "until",
    "against", "during", "before", "after", "above", "below",
    // Question-phrasing verbs that dominate otherwise.
    "give", "tell", "show", "find", "does", "about", "should", "could", "would", "please",
    "help", "need", "want", "get", "know", "explain", "describe", "provide", "make", "create",
];

impl Store {
    /// Count of distinct users who have submitted queries.
    pub fn user_count(&self) -> Result<i64> {
        self.connection()
            .query_row("SELECT COUNT(DISTINCT user_label) FROM audit", [], |row| {
                row.get(0)
            })
            .context("Failed to count users")
    }

    /// Number of queries in the last `days` days.
    pub fn query_count(&self, days: u32) -> Result<i64> {
        self.connection()
            .query_row(
                "SELECT COUNT(*) FROM audit
                 WHERE event_time > datetime('now', '-' || ?1 || ' days')",
                params![days],
                |row| row.get(0),
            )
            .context("Failed to count recent queries")
    }

    /// Daily query counts over the last `days` days, oldest first.
    pub fn query_activity(&self, days: u32) -> Result<Vec<DailyCount>> {
        self.daily_counts(
            "SELECT DATE(event_time) AS day, COUNT(*)
             FROM audit
             WHERE event_time > datetime('now', '-' || ?1 || ' days')
             GROUP BY day
             ORDER BY day",
            days,
        )
    }

    /// Distinct users per day over the last `days` days, oldest first.
    pub fn daily_active_users(&self, days: u32) -> Result<Vec<DailyCount>> {
        self.daily_counts(
            "SELECT DATE(event_time) AS day, COUNT(DISTINCT user_label)
             FROM audit
             WHERE event_time > datetime('now', '-' || ?1 || ' days')
             GROUP BY day
             ORDER BY day",
            days,
        )
    }

    fn daily_counts(&self, sql: &str, days: u32) -> Result<Vec<DailyCount>> {
        let mut stmt = self
            .connection()
            .prepare(sql)
            .context("Failed to prepare daily counts query")?;

        let rows = stmt
            .query_map(params![days], |row| {
                Ok(DailyCount {
                    date: row.get(0)?,
                    count: row.get(1)?,
                })
            })
            .context("Failed to query daily counts")?;

        rows.collect::<rusqlite::Result<Vec<_>>>()
            .context("Failed to read daily counts")
    }

    /// Most active users by query count.
    pub fn user_activity(&self, limit: u32) -> Result<Vec<UserActivity>> {
        let mut stmt = self
            .connection()
            .prepare(
                "SELECT
                     user_label,
                     COUNT(*) AS query_count,
                     MIN(event_time) AS first_query,
                     MAX(event_time) AS last_query,
                     COUNT(DISTINCT DATE(event_time)) AS active_days
                 FROM audit
                 GROUP BY user_label
                 ORDER BY query_count DESC
                 LIMIT ?1",
            )
            .context("Failed to prepare user activity query")?;

        let rows = stmt
            .query_map(params![limit], |row| {
                Ok(UserActivity {
                    user_label: row.get(0)?,
                    query_count: row.get(1)?,
                    first_query: row.get(2)?,
                    last_query: row.get(3)?,
                    active_days: row.get(4)?,
                })
            })
            .context("Failed to query user activity")?;

        rows.collect::<rusqlite::Result<Vec<_>>>()
            .context("Failed to read user activity")
    }

    /// Most frequently cited documents across all answers.
    ///
    /// Citation lists are stored as JSON arrays of document ids; they are
    /// expanded here rather than in SQL.
    pub fn top_documents(&self, limit: usize) -> Result<Vec<DocumentUsage>> {
        let mut stmt = self
            .connection()
            .prepare("SELECT document_ids FROM audit")
            .context("Failed to prepare citations query")?;

        let rows = stmt
            .query_map([], |row| row.get::<_, String>(0))
            .context("Failed to query citations")?;

        let mut counts: HashMap<DocumentId, u64> = HashMap::new();
        for row in rows {
            let json = row.context("Failed to read citation row")?;
            let ids: Vec<DocumentId> = serde_json::from_str(&json)
                .context("Failed to parse cited document ids")?;
            for id in ids {
                *counts.entry(id).or_insert(0) += 1;
            }
        }

        let ids: Vec<DocumentId> = counts.keys().copied().collect();
        let meta = self.document_meta(&ids)?;

        let mut usage: Vec<DocumentUsage> = counts
            .into_iter()
            .filter_map(|(id, count)| {
                meta.get(&id).map(|m| DocumentUsage {
                    document_id: id,
                    title: m.title.clone(),
                    authors: m.authors.clone(),
                    reference_count: count,
                })
            })
            .collect();

        usage.sort_by(|a, b| {
            b.reference_count
                .cmp(&a.reference_count)
                .then_with(|| a.document_id.cmp(&b.document_id))
        });
        usage.truncate(limit);
        Ok(usage)
    }

    /// Most common keywords across all queries, stopwords excluded.
    ///
    /// Keywords are lowercased, stripped of punctuation, and must be fully
    /// alphabetic and at least `min_length` characters.
    pub fn top_keywords(&self, limit: usize, min_length: usize) -> Result<Vec<KeywordCount>> {
        let mut stmt = self
            .connection()
            .prepare("SELECT query FROM audit WHERE length(query) > 0")
            .context("Failed to prepare keyword query")?;

        let rows = stmt
            .query_map([], |row| row.get::<_, String>(0))
            .context("Failed to query for keywords")?;

        let mut counts: HashMap<String, u64> = HashMap::new();
        for row in rows {
            let query = row.context("Failed to read query row")?.to_lowercase();
            let cleaned: String = query
                .chars()
                .map(|c| {
                    if c.is_alphanumeric() || c.is_whitespace() {
                        c
                    } else {
                        ' '
                    }
                })
                .collect();

            for word in cleaned.split_whitespace() {
                if word.len() >= min_length
                    && word.chars().all(char::is_alphabetic)
                    && !STOPWORDS.contains(&word)
                {
                    *counts.entry(word.to_string()).or_insert(0) += 1;
                }
            }
        }

        let mut keywords: Vec<KeywordCount> = counts
            .into_iter()
            .map(|(keyword, count)| KeywordCount { keyword, count })
            .collect();
        keywords.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.keyword.cmp(&b.keyword)));
        keywords.truncate(limit);
        Ok(keywords)
    }

    /// Most repeated complete queries with at least `min_words` words.
    pub fn top_phrases(&self, limit: usize, min_words: usize) -> Result<Vec<PhraseCount>> {
        let mut stmt = self
            .connection()
            .prepare(
                "SELECT lower(trim(query)) AS phrase, COUNT(*) AS count
                 FROM audit
                 WHERE length(query) > 0
                 GROUP BY phrase
                 ORDER BY count DESC, phrase",
            )
            .context("Failed to prepare phrase query")?;

        let rows = stmt
            .query_map([], |row| {
                Ok(PhraseCount {
                    phrase: row.get(0)?,
                    count: row.get(1)?,
                })
            })
            .context("Failed to query phrases")?;

        let mut phrases = Vec::new();
        for row in rows {
            let phrase = row.context("Failed to read phrase row")?;
            if phrase.phrase.split_whitespace().count() >= min_words {
                phrases.push(phrase);
                if phrases.len() == limit {
                    break;
                }
            }
        }
        Ok(phrases)
    }

    /// Aggregate system metrics.
    pub fn system_stats(&self) -> Result<SystemStats> {
        let queries_last_24h: i64 = self
            .connection()
            .query_row(
                "SELECT COUNT(*) FROM audit WHERE event_time > datetime('now', '-1 day')",
                [],
                |row| row.get(0),
            )
            .context("Failed to count recent queries")?;

        let active_users_last_24h: i64 = self
            .connection()
            .query_row(
                "SELECT COUNT(DISTINCT user_label) FROM audit
                 WHERE event_time > datetime('now', '-1 day')",
                [],
                |row| row.get(0),
            )
            .context("Failed to count recent users")?;

        let avg_queries_per_day: f64 = self
            .connection()
            .query_row(
                "SELECT COALESCE(AVG(query_count), 0.0) FROM (
                     SELECT DATE(event_time) AS day, COUNT(*) AS query_count
                     FROM audit
                     WHERE event_time > datetime('now', '-30 days')
                     GROUP BY day
                 )",
                [],
                |row| row.get(0),
            )
            .context("Failed to average daily queries")?;

        Ok(SystemStats {
            total_users: self.user_count()?,
            total_queries: self
                .connection()
                .query_row("SELECT COUNT(*) FROM audit", [], |row| row.get(0))
                .context("Failed to count queries")?,
            total_documents: self.document_count()?,
            total_chunks: self.chunk_count()?,
            queries_last_24h,
            active_users_last_24h,
            avg_queries_per_day,
        })
    }
}

//! `sage report` - print usage analytics from the audit log.

use anyhow::Result;
use clap::Subcommand;

use sage_index::Store;

#[derive(Debug, Clone, Subcommand)]
pub enum ReportCommand {
    /// Count of distinct users who have asked questions.
    Users,
    /// Number of queries in a recent window.
    Queries {
        #[arg(long, default_value_t = 30)]
        days: u32,
    },
    /// Daily query counts.
    Activity {
        #[arg(long, default_value_t = 30)]
        days: u32,
    },
    /// Distinct users per day.
    DailyUsers {
        #[arg(long, default_value_t = 30)]
        days: u32,
    },
    /// Most active users.
    UserActivity {
        #[arg(long, default_value_t = 10)]
        limit: u32,
    },
    /// Most cited documents.
    TopDocuments {
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },
    /// Most common query keywords.
    TopKeywords {
        #[arg(long, default_value_t = 20)]
        limit: usize,
        #[arg(long, default_value_t = 3)]
        min_length: usize,
    },
    /// Most repeated multi-word queries.
    TopPhrases {
        #[arg(long, default_value_t = 10)]
        limit: usize,
        #[arg(long, default_value_t = 2)]
        min_words: usize,
    },
    /// Most recent queries and their responses.
    Recent {
        #[arg(long, default_value_t = 10)]
        limit: u32,
    },
    /// Aggregate system metrics.
    Stats,
}

pub fn run(store: &Store, command: &ReportCommand) -> Result<()> {
    match command {
        ReportCommand::Users => {
            println!("users: {}", store.user_count()?);
        }
        ReportCommand::Queries { days } => {
            println!("queries in last {days} days: {}", store.query_count(*days)?);
        }
        ReportCommand::Activity { days } => {
            for day in store.query_activity(*days)? {
                println!("{}  {:>6}", day.date, day.count);
            }
        }
        ReportCommand::DailyUsers { days } => {
            for day in store.daily_active_users(*days)? {
                println!("{}  {:>6}", day.date, day.count);
            }
        }
        ReportCommand::UserActivity { limit } => {
            println!(
                "{:<20} {:>8} {:>8}  {:<20} {:<20}",
                "user", "queries", "days", "first", "last"
            );
            for user in store.user_activity(*limit)? {
                println!(
                    "{:<20} {:>8} {:>8}  {:<20} {:<20}",
                    user.user_label,
                    user.query_count,
                    user.active_days,
                    user.first_query,
                    user.last_query
                );
            }
        }
        ReportCommand::TopDocuments { limit } => {
            for doc in store.top_documents(*limit)? {
                println!(
                    "{:>6}  [{}] {} by {}",
                    doc.reference_count,
                    doc.document_id,
                    doc.title,
                    if doc.authors.is_empty() {
                        "N/A"
                    } else {
                        doc.authors.as_str()
                    }
                );
            }
        }
        ReportCommand::TopKeywords { limit, min_length } => {
            for keyword in store.top_keywords(*limit, *min_length)? {
                println!("{:>6}  {}", keyword.count, keyword.keyword);
            }
        }
        ReportCommand::TopPhrases { limit, min_words } => {
            for phrase in store.top_phrases(*limit, *min_words)? {
                println!("{:>6}  {}", phrase.count, phrase.phrase);
            }
        }
        ReportCommand::Recent { limit } => {
            for entry in store.recent_audits(*limit)? {
                println!(
                    "{}  {} [{}] ({} chunks)",
                    entry.event_time, entry.user_label, entry.detected_language, entry.context_count
                );
                println!("  Q: {}", entry.query);
                println!("  A: {}", entry.response);
            }
        }
        ReportCommand::Stats => {
            let stats = store.system_stats()?;
            println!("total users:           {}", stats.total_users);
            println!("total queries:         {}", stats.total_queries);
            println!("total documents:       {}", stats.total_documents);
            println!("total chunks:          {}", stats.total_chunks);
            println!("queries (24h):         {}", stats.queries_last_24h);
            println!("active users (24h):    {}", stats.active_users_last_24h);
            println!("avg queries/day (30d): {:.1}", stats.avg_queries_per_day);
        }
    }
    Ok(())
}

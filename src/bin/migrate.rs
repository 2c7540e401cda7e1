//! Schema maintenance for the referral bot database.
//!
//! ```text
//! migrate [up|status|reset [--yes]|help]
//! ```

use anyhow::{bail, Context, Result};
use referral_bot::config::DEFAULT_DATABASE_URL;
use referral_bot::database::connection::{sqlite_file_path, DatabaseManager};
use std::env;
use std::io::{self, BufRead};

/// Tables whose row counts `status` prints.
const COUNTED_TABLES: [&str; 5] = ["reminders", "chats", "referrers", "referrals", "admins"];

#[derive(Debug, PartialEq, Eq)]
enum Task {
    Up,
    Status,
    Reset { confirmed: bool },
    Help,
}

impl Task {
    fn parse(args: &[String]) -> Option<Self> {
        let rest: Vec<&str> = args.iter().map(String::as_str).collect();
        match rest.as_slice() {
            [] | ["up"] | ["migrate"] => Some(Task::Up),
            ["status"] | ["check"] => Some(Task::Status),
            ["reset"] => Some(Task::Reset { confirmed: false }),
            ["reset", "--yes"] => Some(Task::Reset { confirmed: true }),
            ["help"] | ["--help"] | ["-h"] => Some(Task::Help),
            _ => None,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();
    dotenvy::dotenv().ok();

    let args: Vec<String> = env::args().skip(1).collect();
    let Some(task) = Task::parse(&args) else {
        eprintln!("Unrecognised arguments: {}", args.join(" "));
        print_usage();
        std::process::exit(2);
    };

    let url = env::var("DATABASE_URL")
        .ok()
        .filter(|url| !url.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string());

    match task {
        Task::Up => migrate(&url).await,
        Task::Status => status(&url).await,
        Task::Reset { confirmed } => reset(&url, confirmed).await,
        Task::Help => {
            print_usage();
            Ok(())
        }
    }
}

async fn open(url: &str) -> Result<DatabaseManager> {
    println!("Database: {}", display_url(url));
    DatabaseManager::new(url)
        .await
        .with_context(|| format!("could not open {}", display_url(url)))
}

async fn migrate(url: &str) -> Result<()> {
    let db = open(url).await?;
    db.run_migrations().await.context("migration failed")?;
    println!("✅ Schema is up to date");
    Ok(())
}

async fn status(url: &str) -> Result<()> {
    let db = open(url).await?;

    let applied: Vec<(i64, String)> =
        match sqlx::query_as::<_, (i64, String)>("SELECT version, description FROM _sqlx_migrations WHERE success = 1 ORDER BY version")
            .fetch_all(&db.pool)
            .await
        {
            Ok(rows) => rows,
            Err(_) => {
                println!("⚠️  No migrations applied yet. Run `migrate up`.");
                return Ok(());
            }
        };

    println!("Applied migrations:");
    for (version, description) in applied {
        println!("  {version} {description}");
    }

    println!("Rows:");
    for table in COUNTED_TABLES {
        let count = sqlx::query_scalar::<_, i64>(&format!("SELECT COUNT(*) FROM {table}"))
            .fetch_one(&db.pool)
            .await;
        match count {
            Ok(count) => println!("  {table:<10} {count}"),
            Err(e) => println!("  {table:<10} unavailable ({e})"),
        }
    }
    Ok(())
}

/// Deletes the SQLite file and rebuilds the schema.
async fn reset(url: &str, confirmed: bool) -> Result<()> {
    let Some(path) = sqlite_file_path(url) else {
        bail!("reset only works on file-backed SQLite databases, got {}", display_url(url));
    };

    if !confirmed {
        println!("This deletes every reminder, referrer and tracked chat in {}.", path.display());
        println!("Type `reset` to continue:");
        let mut answer = String::new();
        io::stdin().lock().read_line(&mut answer)?;
        if answer.trim() != "reset" {
            println!("Nothing changed.");
            return Ok(());
        }
    }

    if path.exists() {
        std::fs::remove_file(path).with_context(|| format!("could not delete {}", path.display()))?;
        println!("🗑️  Removed {}", path.display());
    }
    migrate(url).await
}

/// Shows only the file name of a SQLite URL.
fn display_url(url: &str) -> String {
    sqlite_file_path(url)
        .and_then(|path| path.file_name())
        .map(|name| format!("sqlite:.../{}", name.to_string_lossy()))
        .unwrap_or_else(|| url.to_string())
}

fn print_usage() {
    println!(
        "migrate [TASK]\n\n\
         TASKS:\n  \
           up               apply pending migrations (default)\n  \
           status           list applied migrations and row counts\n  \
           reset [--yes]    delete the SQLite file and rebuild the schema\n  \
           help             show this message\n\n\
         DATABASE_URL selects the database (default {DEFAULT_DATABASE_URL})."
    );
}

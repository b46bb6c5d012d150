use clap::{Args, Parser, Subcommand, ValueEnum};
use spacey_core::EngineConfig;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, ValueEnum)]
pub enum StoreKind {
    Memory,
    Sqlite,
}

#[derive(Debug, Parser, Clone)]
#[command(name = "spacey", version, about = "Spacey learning service (spaced repetition)")]
pub struct Cli {
    /// Storage backend
    #[arg(long, value_enum, default_value_t = StoreKind::Sqlite)]
    pub store: StoreKind,

    /// SQLite DB path when --store sqlite (defaults to app data dir)
    #[arg(long, env = "SPACEY_DB_PATH")]
    pub db_path: Option<PathBuf>,

    /// Log filter (overridden by RUST_LOG)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    #[command(flatten)]
    pub engine: EngineOpts,

    #[command(subcommand)]
    pub cmd: Command,
}

#[derive(Debug, Args, Clone)]
pub struct EngineOpts {
    /// Recall probability at or below which a card is due
    #[arg(long, default_value_t = spacey_core::DUE_THRESHOLD)]
    pub due_threshold: f64,

    /// Deadline for each store call in milliseconds (0 disables it)
    #[arg(long, default_value_t = 10_000)]
    pub store_timeout_ms: u64,

    /// Do not serialize concurrent reviews of the same card or session opens
    #[arg(long)]
    pub no_serialize_writes: bool,

    /// Open a new session on every request instead of reusing today's
    #[arg(long)]
    pub no_session_dedupe: bool,
}

impl EngineOpts {
    pub fn to_config(&self) -> EngineConfig {
        EngineConfig {
            due_threshold: self.due_threshold,
            store_timeout: (self.store_timeout_ms > 0)
                .then(|| Duration::from_millis(self.store_timeout_ms)),
            serialize_writes: !self.no_serialize_writes,
            dedupe_sessions_by_day: !self.no_session_dedupe,
        }
    }
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Launch the HTTP API
    Serve(ServeCmd),
    /// List due cards for a user
    Due(DueCmd),
    /// Record one review
    Review(ReviewCmd),
    /// Open or finish a learning session
    #[command(subcommand)]
    Session(SessionCmd),
    /// Show every recorded event of a card
    History(HistoryCmd),
}

#[derive(Debug, Args, Clone)]
pub struct ServeCmd {
    /// Bind host
    #[arg(long, default_value = "0.0.0.0")]
    pub host: String,
    /// Bind port
    #[arg(long, env = "PORT", default_value_t = 8080)]
    pub port: u16,
}

#[derive(Debug, Args, Clone)]
pub struct DueCmd {
    #[arg(long)]
    pub user: String,
    /// Candidate card ids
    #[arg(required = true)]
    pub cards: Vec<String>,
}

#[derive(Debug, Args, Clone)]
pub struct ReviewCmd {
    #[arg(long)]
    pub user: String,
    #[arg(long)]
    pub deck: String,
    #[arg(long)]
    pub card: String,
    /// Session id; today's session for the deck is opened when omitted
    #[arg(long)]
    pub session: Option<uuid::Uuid>,
    /// Mark the answer as wrong
    #[arg(long)]
    pub incorrect: bool,
}

#[derive(Debug, Subcommand, Clone)]
pub enum SessionCmd {
    Open {
        #[arg(long)]
        user: String,
        #[arg(long)]
        deck: String,
    },
    Finish {
        #[arg(long)]
        user: String,
        id: uuid::Uuid,
    },
}

#[derive(Debug, Args, Clone)]
pub struct HistoryCmd {
    #[arg(long)]
    pub user: String,
    pub card: String,
}

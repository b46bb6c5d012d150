use crate::api::{routes::AppState, server as api_server};
use crate::cli::opts::*;
use crate::cli::paths::default_db_file;

use anyhow::Result;
use chrono::Utc;
use spacey_core::store::memory::MemoryStore;
use spacey_core::{
    CardEventReq, CardEventStore, EngineConfig, EventUsecase, LearningSessionCreateReq,
    LearningSessionStore, LearningSessionUpdateReq, SessionUsecase,
};
use spacey_sqlite::SqliteRepo;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

pub struct Stores {
    pub events: Arc<dyn CardEventStore>,
    pub sessions: Arc<dyn LearningSessionStore>,
}

pub async fn run_cli(args: Cli) -> Result<()> {
    let stores = open_stores(&args.store, args.db_path.clone()).await?;
    let state = build_state(stores, args.engine.to_config());

    match args.cmd {
        Command::Serve(cmd) => {
            let addr: std::net::SocketAddr = format!("{}:{}", cmd.host, cmd.port).parse()?;
            api_server::run(state, addr).await
        }
        Command::Due(cmd) => due_cmd(&state, cmd).await,
        Command::Review(cmd) => review_cmd(&state, cmd).await,
        Command::Session(cmd) => session_cmd(&state, cmd).await,
        Command::History(cmd) => history_cmd(&state, cmd).await,
    }
}

pub async fn open_stores(store: &StoreKind, db_path: Option<PathBuf>) -> Result<Stores> {
    match store {
        StoreKind::Memory => {
            let s = Arc::new(MemoryStore::new());
            Ok(Stores {
                events: s.clone(),
                sessions: s,
            })
        }
        StoreKind::Sqlite => {
            let p = db_path.unwrap_or_else(default_db_file);
            if let Some(parent) = p.parent() {
                std::fs::create_dir_all(parent).ok();
            }
            info!(path = %p.display(), "opening sqlite store");
            let s = Arc::new(SqliteRepo::open_file(&p).await?);
            Ok(Stores {
                events: s.clone(),
                sessions: s,
            })
        }
    }
}

pub fn build_state(stores: Stores, config: EngineConfig) -> AppState {
    AppState {
        events: Arc::new(EventUsecase::new(stores.events, config.clone())),
        sessions: Arc::new(SessionUsecase::new(stores.sessions, config)),
    }
}

async fn due_cmd(state: &AppState, cmd: DueCmd) -> Result<()> {
    let due = state.events.get_learning_cards(&cmd.user, &cmd.cards).await?;
    if due.is_empty() {
        println!("no cards due");
        return Ok(());
    }
    for c in due {
        println!("{}\t{:.3}", c.card_id, c.recall_probability);
    }
    Ok(())
}

async fn review_cmd(state: &AppState, cmd: ReviewCmd) -> Result<()> {
    let now = Utc::now();
    let session = match cmd.session {
        Some(id) => id,
        None => {
            let open = LearningSessionCreateReq {
                deck_id: cmd.deck.clone(),
                started_at: now,
            };
            state.sessions.create_learning_session(&cmd.user, &open).await?
        }
    };

    let req = CardEventReq {
        deck_id: cmd.deck,
        card_id: cmd.card,
        learning_session_id: session,
        started_at: now,
        finished_at: now,
        correct: !cmd.incorrect,
    };
    req.validate()?;
    let id = state.events.create_card_event(&cmd.user, &req).await?;

    let history = state.events.card_history(&cmd.user, &req.card_id).await?;
    if let Some(latest) = history.last() {
        println!(
            "{}\thalf-life={}d\tpracticed={}\tsession={}",
            id, latest.memory_half_life, latest.number_practiced, session
        );
    }
    Ok(())
}

async fn session_cmd(state: &AppState, cmd: SessionCmd) -> Result<()> {
    match cmd {
        SessionCmd::Open { user, deck } => {
            let req = LearningSessionCreateReq {
                deck_id: deck,
                started_at: Utc::now(),
            };
            let id = state.sessions.create_learning_session(&user, &req).await?;
            println!("{id}");
        }
        SessionCmd::Finish { user, id } => {
            let req = LearningSessionUpdateReq {
                id,
                finished_at: Utc::now(),
            };
            state.sessions.finish_learning_session(&user, &req).await?;
            println!("ok");
        }
    }
    Ok(())
}

async fn history_cmd(state: &AppState, cmd: HistoryCmd) -> Result<()> {
    let events = state.events.card_history(&cmd.user, &cmd.card).await?;
    if events.is_empty() {
        println!("no reviews");
        return Ok(());
    }
    for e in events {
        println!(
            "{}\t{}\thalf-life={}d\tcorrect={}/{}\tsession={}",
            e.created_at.to_rfc3339(),
            e.id,
            e.memory_half_life,
            e.number_correct,
            e.number_practiced,
            e.learning_session_id
        );
    }
    Ok(())
}

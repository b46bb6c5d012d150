mod common;

use chrono::Utc;
use common::{review, GatedStore, DECK, USER};
use spacey_core::{
    CardEventStore, EngineConfig, EventUsecase, LearningSessionCreateReq, SessionUsecase,
};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

#[tokio::test]
async fn unserialized_reviews_lose_an_update() {
    let store = Arc::new(GatedStore::gated(2));
    let uc = EventUsecase::new(store.clone(), EngineConfig::unserialized());
    let session = Uuid::new_v4();
    let r1 = review("c", session, true);
    let r2 = review("c", session, true);

    let (a, b) = tokio::join!(
        uc.create_card_event(USER, &r1),
        uc.create_card_event(USER, &r2)
    );
    a.unwrap();
    b.unwrap();

    let history = store.card_history(USER, "c").await.unwrap();
    assert_eq!(history.len(), 2);
    // Both writes were derived from "no previous event".
    assert!(history.iter().all(|e| e.number_practiced == 1));
    let latest = store.inner.latest_event(USER, "c").await.unwrap();
    assert_eq!(latest.memory_half_life, 1.0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn serialized_reviews_keep_every_update() {
    let store = Arc::new(GatedStore::yielding());
    let uc = Arc::new(EventUsecase::new(store.clone(), EngineConfig::default()));
    let session = Uuid::new_v4();

    let mut handles = Vec::new();
    for _ in 0..16 {
        let uc = uc.clone();
        handles.push(tokio::spawn(async move {
            uc.create_card_event(USER, &review("c", session, true)).await
        }));
    }
    for h in handles {
        h.await.unwrap().unwrap();
    }

    let latest = store.inner.latest_event(USER, "c").await.unwrap();
    assert_eq!(latest.number_practiced, 16);
    assert_eq!(latest.number_correct, 16);
    assert_eq!(latest.number_practiced_last_session, 16);

    let practiced: HashSet<u32> = store
        .card_history(USER, "c")
        .await
        .unwrap()
        .iter()
        .map(|e| e.number_practiced)
        .collect();
    assert_eq!(practiced.len(), 16);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn serialized_reviews_of_different_cards_do_not_block() {
    let store = Arc::new(GatedStore::yielding());
    let uc = Arc::new(EventUsecase::new(store.clone(), EngineConfig::default()));

    let mut handles = Vec::new();
    for i in 0..8 {
        let uc = uc.clone();
        handles.push(tokio::spawn(async move {
            let card = format!("card-{i}");
            uc.create_card_event(USER, &review(&card, Uuid::new_v4(), i % 2 == 0)).await
        }));
    }
    for h in handles {
        h.await.unwrap().unwrap();
    }
    assert_eq!(store.inner.event_count(), 8);
}

#[tokio::test]
async fn serialized_locks_do_not_confuse_slashed_ids() {
    // Both lookups must be in flight together to pass the gate.
    let store = Arc::new(GatedStore::gated(2));
    let uc = EventUsecase::new(store.clone(), EngineConfig::default());
    let session = Uuid::new_v4();
    let r1 = review("c", session, true);
    let r2 = review("b/c", session, true);

    let both = async {
        tokio::join!(
            uc.create_card_event("a/b", &r1),
            uc.create_card_event("a", &r2)
        )
    };
    let (x, y) = tokio::time::timeout(Duration::from_secs(5), both)
        .await
        .expect("reviews of distinct cards waited on one lock");
    x.unwrap();
    y.unwrap();

    assert_eq!(store.inner.event_count(), 2);
    assert_eq!(store.inner.latest_event("a/b", "c").await.unwrap().number_practiced, 1);
    assert_eq!(store.inner.latest_event("a", "b/c").await.unwrap().number_practiced, 1);
}

#[tokio::test]
async fn unserialized_sessions_can_duplicate() {
    let store = Arc::new(GatedStore::gated(2));
    let uc = SessionUsecase::new(store.clone(), EngineConfig::unserialized());
    let req = LearningSessionCreateReq {
        deck_id: DECK.into(),
        started_at: Utc::now(),
    };

    let (a, b) = tokio::join!(
        uc.create_learning_session(USER, &req),
        uc.create_learning_session(USER, &req)
    );

    assert_ne!(a.unwrap(), b.unwrap());
    assert_eq!(store.inner.session_count(), 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn serialized_sessions_open_once_per_day() {
    let store = Arc::new(GatedStore::yielding());
    let uc = Arc::new(SessionUsecase::new(store.clone(), EngineConfig::default()));
    let started_at = Utc::now();

    let mut handles = Vec::new();
    for _ in 0..12 {
        let uc = uc.clone();
        handles.push(tokio::spawn(async move {
            let req = LearningSessionCreateReq {
                deck_id: DECK.into(),
                started_at,
            };
            uc.create_learning_session(USER, &req).await
        }));
    }

    let mut ids = HashSet::new();
    for h in handles {
        ids.insert(h.await.unwrap().unwrap());
    }
    assert_eq!(ids.len(), 1);
    assert_eq!(store.inner.session_count(), 1);
}

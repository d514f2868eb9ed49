use serde_json::json;

use ranklog::{
    mutation::{Mutation, MutationCode, MutationError, NewMutation},
    persist::{memory::MemoryStore, MutationStore, PersistError},
    types::{QueueKind, Scope},
};

fn cut(limit: Option<u32>) -> NewMutation {
    Mutation::Cut {
        scope: Scope::new(1, 2),
        new_limit: limit,
    }
    .to_new(Some("hwl".to_string()))
    .expect("encode")
}

#[test]
fn ids_increase_and_fetch_skips_processed_records() {
    let log = MemoryStore::new().mutation_log(QueueKind::Ranking);

    let a = log.enqueue(cut(Some(8))).expect("a");
    let b = log.enqueue(cut(Some(12))).expect("b");
    let c = log.enqueue(cut(None)).expect("c");
    assert!(a < b && b < c);

    log.mark_processed(b).expect("mark");
    let pending: Vec<_> = log
        .fetch_unprocessed_since(0)
        .expect("fetch")
        .into_iter()
        .map(|r| r.id)
        .collect();
    assert_eq!(pending, vec![a, c]);

    let after_a: Vec<_> = log
        .fetch_unprocessed_since(a)
        .expect("fetch")
        .into_iter()
        .map(|r| r.id)
        .collect();
    assert_eq!(after_a, vec![c]);
    assert_eq!(log.count().expect("count"), 3);
    assert!(log.is_processed(b).expect("state"));
}

#[test]
fn marking_twice_is_harmless_and_unknown_ids_fail() {
    let log = MemoryStore::new().mutation_log(QueueKind::Ranking);
    let id = log.enqueue(cut(Some(8))).expect("enqueue");

    log.mark_processed(id).expect("first");
    log.mark_processed(id).expect("second");

    assert!(matches!(
        log.mark_processed(99),
        Err(PersistError::MissingMutation(99))
    ));
}

#[test]
fn unique_enqueue_reuses_pending_records_only() {
    let log = MemoryStore::new().mutation_log(QueueKind::Ranking);

    let (first, created) = log.enqueue_unique(cut(Some(8))).expect("first");
    assert!(created);
    let (again, created) = log.enqueue_unique(cut(Some(8))).expect("again");
    assert_eq!((again, created), (first, false));

    let (other, created) = log.enqueue_unique(cut(Some(9))).expect("other payload");
    assert!(created);
    assert_ne!(other, first);

    log.mark_processed(first).expect("mark");
    let (fresh, created) = log.enqueue_unique(cut(Some(8))).expect("after processing");
    assert!(created);
    assert!(fresh > other);
}

#[test]
fn queues_are_separate_logs() {
    let store = MemoryStore::new();
    let ranking = store.mutation_log(QueueKind::Ranking);
    let payment = store.mutation_log(QueueKind::Payment);

    ranking.enqueue(cut(Some(8))).expect("ranking");
    let checkout = Mutation::Checkout { booking: 1 }.to_new(None).expect("encode");
    let id = payment.enqueue(checkout).expect("payment");

    assert_eq!(id, 1);
    assert_eq!(ranking.count().expect("count"), 1);
    assert_eq!(payment.count().expect("count"), 1);
    assert!(matches!(
        ranking.enqueue(Mutation::Checkout { booking: 2 }.to_new(None).expect("encode")),
        Err(PersistError::WrongQueue { .. })
    ));
}

#[test]
fn stored_records_decode_back_to_the_request() {
    let log = MemoryStore::new().mutation_log(QueueKind::Ranking);
    let withdraw = Mutation::Withdraw { participant: 41 };
    let id = log.enqueue(withdraw.to_new(None).expect("encode")).expect("enqueue");

    let record = log.get(id).expect("get").expect("record");

    assert_eq!(record.code, "AFMELDEN");
    assert_eq!(record.target_ref, "participant:41");
    assert_eq!(record.payload, json!({ "participant": 41 }));
    assert_eq!(Mutation::decode(&record).expect("decode"), withdraw);
}

#[test]
fn unknown_codes_and_bad_payloads_are_reported() {
    let log = MemoryStore::new().mutation_log(QueueKind::Ranking);
    let unknown = log
        .enqueue(NewMutation {
            code: "VERPLAATSEN".to_string(),
            target_ref: "participant:1".to_string(),
            payload: json!({}),
            requested_by: None,
        })
        .expect("enqueue");
    let bad = log
        .enqueue(NewMutation {
            code: MutationCode::Confirm.as_str().to_string(),
            target_ref: "participant:1".to_string(),
            payload: json!({ "participant": "not a number" }),
            requested_by: None,
        })
        .expect("enqueue");

    let unknown = log.get(unknown).expect("get").expect("record");
    let bad = log.get(bad).expect("get").expect("record");

    assert!(matches!(
        Mutation::decode(&unknown),
        Err(MutationError::UnknownCode(code)) if code == "VERPLAATSEN"
    ));
    assert!(matches!(
        Mutation::decode(&bad),
        Err(MutationError::BadPayload { .. })
    ));
}

#[test]
fn queue_names_match_the_stored_form() {
    for queue in [QueueKind::Ranking, QueueKind::Payment] {
        assert_eq!(QueueKind::from_name(queue.as_str()), Some(queue));
        assert_eq!(queue.to_string(), queue.as_str());
    }
    assert_eq!(QueueKind::from_name("Ranking"), None);
    assert_eq!(QueueKind::from_name(""), None);
}

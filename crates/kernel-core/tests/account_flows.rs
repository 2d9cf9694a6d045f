use std::sync::Arc;

use chrono::{TimeZone, Utc};
use contracts::{
    Command, CommandOutcome, CommandPayload, EngineSettings, ErrorCode, IssuedCredentials, Portal,
};
use kernel_core::{
    default_catalogs, AccountEngine, AccountStore, EngineError, ManualClock, MemoryStore, Outbox,
    SessionView,
};

fn engine() -> (AccountEngine, Outbox, String) {
    let clock = ManualClock::at(Utc.with_ymd_and_hms(2026, 3, 2, 8, 30, 0).unwrap());
    let outbox = Outbox::new();
    let mut engine = AccountEngine::new(EngineSettings::default(), default_catalogs())
        .with_clock(Arc::new(clock))
        .with_sink(Box::new(outbox.clone()));
    let admin = engine.bootstrap().expect("bootstrap").expect("admin");
    (engine, outbox, admin.account_id)
}

fn run(engine: &mut AccountEngine, id: &str, actor: &str, payload: CommandPayload) -> CommandOutcome {
    let result = engine.execute(&Command::new(id, actor, payload));
    assert!(result.accepted, "{id} rejected: {:?}", result.error);
    result.outcome.expect("accepted commands carry an outcome")
}

fn credentials(outcome: CommandOutcome) -> IssuedCredentials {
    match outcome {
        CommandOutcome::Credentials { credentials } => credentials,
        other => panic!("expected credentials, got {other:?}"),
    }
}

#[test]
fn a_school_day_through_the_command_envelope() {
    let (mut engine, outbox, admin) = engine();
    let alice = credentials(run(
        &mut engine,
        "c1",
        &admin,
        CommandPayload::CreateStudent {
            display_name: "Alice Dupré".to_string(),
            classe: "3eA".to_string(),
            teacher_id: None,
        },
    ));
    let bruno = credentials(run(
        &mut engine,
        "c2",
        &admin,
        CommandPayload::CreateStudent {
            display_name: "Bruno".to_string(),
            classe: "3eA".to_string(),
            teacher_id: None,
        },
    ));

    let account = engine
        .authenticate(&alice.username, &alice.secret, Portal::Student)
        .expect("login");
    let session = SessionView::signed_in(account.account_id.clone());
    assert!(session
        .resolve(engine.accounts())
        .expect("session")
        .credentials
        .must_rotate);

    run(
        &mut engine,
        "c3",
        &alice.account_id,
        CommandPayload::ForceChangePassword {
            new_secret: "triangle-rectangle".to_string(),
        },
    );
    run(
        &mut engine,
        "c4",
        &alice.account_id,
        CommandPayload::ConsultChapter {
            chapter_id: "chap1".to_string(),
        },
    );
    let request = match run(
        &mut engine,
        "c5",
        &alice.account_id,
        CommandPayload::SendFriendRequest {
            to_account_id: bruno.account_id.clone(),
        },
    ) {
        CommandOutcome::FriendRequest { request } => request,
        other => panic!("expected a friend request, got {other:?}"),
    };
    run(
        &mut engine,
        "c6",
        &bruno.account_id,
        CommandPayload::HandleFriendRequest {
            request_id: request.request_id,
            accept: true,
        },
    );

    let alice_now = session.resolve(engine.accounts()).expect("session");
    assert!(!alice_now.credentials.must_rotate);
    assert!(alice_now.friend_ids.contains(&bruno.account_id));
    assert!(alice_now.has_consulted("chap1"));
    assert!(outbox
        .drain()
        .iter()
        .any(|note| note.account_id == alice.account_id));
}

#[test]
fn rejected_commands_leave_state_untouched() {
    let (mut engine, _outbox, admin) = engine();
    let student = credentials(run(
        &mut engine,
        "c1",
        &admin,
        CommandPayload::CreateStudent {
            display_name: "Chloé".to_string(),
            classe: "4eB".to_string(),
            teacher_id: None,
        },
    ));
    let before = engine.account(&student.account_id).expect("student").clone();

    let result = engine.execute(&Command::new(
        "c2",
        student.account_id.as_str(),
        CommandPayload::Purchase {
            item_id: "frame1".to_string(),
        },
    ));
    assert!(!result.accepted);
    assert_eq!(
        result.error.map(|error| error.error_code),
        Some(ErrorCode::InsufficientFunds)
    );
    assert_eq!(engine.account(&student.account_id).expect("student"), &before);
}

#[test]
fn state_survives_a_flush_and_restore() {
    let (mut engine, _outbox, admin) = engine();
    let student = credentials(run(
        &mut engine,
        "c1",
        &admin,
        CommandPayload::CreateStudent {
            display_name: "Maël".to_string(),
            classe: "5eC".to_string(),
            teacher_id: None,
        },
    ));
    run(
        &mut engine,
        "c2",
        &admin,
        CommandPayload::AddBonus {
            account_id: student.account_id.clone(),
            xp: 120,
            coins: 800,
        },
    );
    run(
        &mut engine,
        "c3",
        &student.account_id,
        CommandPayload::CreateGuild {
            name: "Les Fractales".to_string(),
            emoji: "🌀".to_string(),
            description: String::new(),
        },
    );

    let mut store = MemoryStore::new();
    engine.flush_to(&mut store).expect("flush");
    let restored = AccountEngine::restore_from(EngineSettings::default(), None, &store)
        .expect("restore");

    assert_eq!(restored.accounts(), engine.accounts());
    assert_eq!(restored.guilds(), engine.guilds());
    assert_eq!(restored.ledger(), engine.ledger());
    assert_eq!(restored.catalogs(), engine.catalogs());
}

#[test]
fn stale_writes_are_refused_by_version() {
    let (engine, _outbox, admin) = engine();
    let mut store = AccountStore::from_accounts(engine.accounts().to_vec());
    let copy = store.get(&admin).expect("admin").clone();

    let mut first = copy.clone();
    first.display_name = "Directrice".to_string();
    assert_eq!(store.commit(first).expect("first write"), copy.version + 1);

    let err = store.commit(copy).expect_err("stale copy");
    assert!(matches!(err, EngineError::Conflict { .. }));
}

use chrono::{Duration, Utc};
use dearme_db::Database;
use dearme_db::models::{LetterContent, NewLetter, NewUser};
use dearme_types::models::{LetterStatus, User};

fn user(db: &Database, name: &str) -> User {
    db.create_user(&NewUser {
        username: name,
        email: &format!("{name}@example.com"),
        password_hash: "hash",
        first_name: "",
        last_name: "",
    })
    .unwrap()
}

fn content(receivers: &[&User]) -> LetterContent {
    LetterContent {
        receiver_ids: receivers.iter().map(|u| u.id).collect(),
        external_emails: "a@x.com, , b@y.com".into(),
        subject: "Open in ten years".into(),
        body: "<p>Hello</p>".into(),
        attachment: None,
        delivery_date: Utc::now() - Duration::minutes(1),
        grace_period_hours: 48,
        memory_ids: vec![],
        diary_ids: vec![],
    }
}

#[test]
fn insert_and_read_back_with_receivers() {
    let db = Database::open_in_memory().unwrap();
    let sender = user(&db, "sender");
    let bob = user(&db, "bob");

    let letter = db
        .insert_letter(&NewLetter {
            sender_id: sender.id,
            content: content(&[&bob]),
            status: LetterStatus::Draft,
            locked_at: None,
        })
        .unwrap();

    assert_eq!(letter.status, LetterStatus::Draft);
    assert_eq!(letter.receiver_ids, vec![bob.id]);
    assert_eq!(letter.grace_period_hours, 48);

    let listed = db.list_letters_for_sender(sender.id).unwrap();
    assert_eq!(listed.len(), 1);
    assert!(db.get_letter_for_sender(letter.id, bob.id).unwrap().is_none());
    assert_eq!(db.get_user_emails(&letter.receiver_ids).unwrap(), vec!["bob@example.com"]);
}

#[test]
fn transitions_are_conditional_on_current_status() {
    let db = Database::open_in_memory().unwrap();
    let sender = user(&db, "sender");
    let now = Utc::now();
    let letter = db
        .insert_letter(&NewLetter {
            sender_id: sender.id,
            content: content(&[]),
            status: LetterStatus::Draft,
            locked_at: None,
        })
        .unwrap();

    assert!(db.schedule_letter(letter.id, now).unwrap());
    assert!(!db.schedule_letter(letter.id, now).unwrap());

    assert!(db.lock_letter(letter.id, now).unwrap());
    assert!(!db.lock_letter(letter.id, now + Duration::hours(1)).unwrap());
    let locked = db.get_letter(letter.id).unwrap().unwrap();
    assert_eq!(locked.status, LetterStatus::Locked);
    assert_eq!(
        locked.locked_at.unwrap().timestamp_micros(),
        now.timestamp_micros()
    );

    // Content writes only land while the expected status holds.
    assert!(!db
        .update_letter(letter.id, LetterStatus::Scheduled, &content(&[]), LetterStatus::Scheduled, None)
        .unwrap());

    let claim = db
        .claim_letter(letter.id, &[LetterStatus::Locked], now, now + Duration::minutes(5))
        .unwrap()
        .unwrap();
    assert!(db.mark_delivered(letter.id, claim, now).unwrap());
    assert!(!db.mark_delivered(letter.id, claim, now).unwrap());
    assert!(!db.delete_letter(letter.id, sender.id).unwrap());
}

#[test]
fn due_selection_respects_status_and_date() {
    let db = Database::open_in_memory().unwrap();
    let sender = user(&db, "sender");
    let now = Utc::now();

    let mut future = content(&[]);
    future.delivery_date = now + Duration::days(1);

    let due_draft = db
        .insert_letter(&NewLetter { sender_id: sender.id, content: content(&[]), status: LetterStatus::Draft, locked_at: None })
        .unwrap();
    let due_scheduled = db
        .insert_letter(&NewLetter { sender_id: sender.id, content: content(&[]), status: LetterStatus::Scheduled, locked_at: None })
        .unwrap();
    db.insert_letter(&NewLetter { sender_id: sender.id, content: future, status: LetterStatus::Scheduled, locked_at: None })
        .unwrap();

    let due = db.due_letters(&[LetterStatus::Scheduled, LetterStatus::Locked], now).unwrap();
    assert_eq!(due.iter().map(|l| l.id).collect::<Vec<_>>(), vec![due_scheduled.id]);

    let with_drafts = db
        .due_letters(&[LetterStatus::Draft, LetterStatus::Scheduled], now)
        .unwrap();
    assert_eq!(with_drafts.len(), 2);
    assert!(with_drafts.iter().any(|l| l.id == due_draft.id));
}

#[test]
fn claim_is_exclusive_until_released_or_expired() {
    let db = Database::open_in_memory().unwrap();
    let sender = user(&db, "sender");
    let now = Utc::now();
    let lease = now + Duration::minutes(5);
    let statuses = [LetterStatus::Scheduled, LetterStatus::Locked];

    let letter = db
        .insert_letter(&NewLetter { sender_id: sender.id, content: content(&[]), status: LetterStatus::Scheduled, locked_at: None })
        .unwrap();

    let first = db.claim_letter(letter.id, &statuses, now, lease).unwrap().unwrap();
    assert!(db.claim_letter(letter.id, &statuses, now, lease).unwrap().is_none());
    // An expired lease can be taken over.
    let second = db
        .claim_letter(letter.id, &statuses, lease, lease + Duration::minutes(5))
        .unwrap()
        .unwrap();
    assert_ne!(first, second);

    db.record_delivery_failure(letter.id, second, "gateway down").unwrap();
    let failed = db.get_letter(letter.id).unwrap().unwrap();
    assert_eq!(failed.status, LetterStatus::Scheduled);
    assert_eq!(failed.delivery_attempts, 1);
    assert_eq!(failed.last_delivery_error.as_deref(), Some("gateway down"));

    let third = db.claim_letter(letter.id, &statuses, now, lease).unwrap().unwrap();
    assert!(db.mark_delivered(letter.id, third, now).unwrap());
    assert!(db.claim_letter(letter.id, &statuses, lease, lease).unwrap().is_none());
}

#[test]
fn outcome_needs_the_current_claim() {
    let db = Database::open_in_memory().unwrap();
    let sender = user(&db, "sender");
    let now = Utc::now();
    let statuses = [LetterStatus::Scheduled];

    let letter = db
        .insert_letter(&NewLetter { sender_id: sender.id, content: content(&[]), status: LetterStatus::Scheduled, locked_at: None })
        .unwrap();

    let stale = db
        .claim_letter(letter.id, &statuses, now, now + Duration::minutes(5))
        .unwrap()
        .unwrap();
    let later = now + Duration::minutes(6);
    let current = db
        .claim_letter(letter.id, &statuses, later, later + Duration::minutes(5))
        .unwrap()
        .unwrap();

    // The holder whose lease ran out can no longer settle the letter.
    assert!(!db.mark_delivered(letter.id, stale, later).unwrap());
    assert!(!db.record_delivery_failure(letter.id, stale, "late").unwrap());
    let untouched = db.get_letter(letter.id).unwrap().unwrap();
    assert_eq!(untouched.status, LetterStatus::Scheduled);
    assert_eq!(untouched.delivery_attempts, 0);

    assert!(db.mark_delivered(letter.id, current, later).unwrap());
}

#[test]
fn edit_windows_list_only_armed_scheduled_letters() {
    let db = Database::open_in_memory().unwrap();
    let sender = user(&db, "sender");
    let now = Utc::now();

    let armed = db
        .insert_letter(&NewLetter { sender_id: sender.id, content: content(&[]), status: LetterStatus::Scheduled, locked_at: Some(now) })
        .unwrap();
    db.insert_letter(&NewLetter { sender_id: sender.id, content: content(&[]), status: LetterStatus::Scheduled, locked_at: None })
        .unwrap();
    db.insert_letter(&NewLetter { sender_id: sender.id, content: content(&[]), status: LetterStatus::Locked, locked_at: Some(now) })
        .unwrap();

    let windows = db.scheduled_edit_windows().unwrap();
    assert_eq!(windows.len(), 1);
    assert_eq!(windows[0].letter_id, armed.id);
    assert_eq!(windows[0].grace_period_hours, 48);
}

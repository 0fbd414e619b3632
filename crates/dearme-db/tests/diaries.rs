use chrono::NaiveDate;
use dearme_db::models::{DiaryWrite, NewUser};
use dearme_db::{Database, DbError};
use uuid::Uuid;

fn owner(db: &Database, name: &str) -> Uuid {
    db.create_user(&NewUser {
        username: name,
        email: &format!("{name}@example.com"),
        password_hash: "hash",
        first_name: "",
        last_name: "",
    })
    .unwrap()
    .id
}

fn write(day: u32) -> DiaryWrite {
    DiaryWrite {
        entry_date: NaiveDate::from_ymd_opt(2024, 5, day).unwrap(),
        ciphertext: vec![1, 2, 3],
        nonce: vec![0; 12],
        memory_ids: vec![],
        photos: vec!["photos/a.jpg".into(), "photos/b.jpg".into()],
        locations: vec!["Lisbon".into(), "Sintra".into()],
    }
}

#[test]
fn second_entry_for_same_day_is_a_conflict() {
    let db = Database::open_in_memory().unwrap();
    let ada = owner(&db, "ada");
    let bob = owner(&db, "bob");

    db.create_diary(ada, &write(1)).unwrap();
    let err = db.create_diary(ada, &write(1)).unwrap_err();
    assert!(matches!(err, DbError::Conflict { field: "entry_date" }));

    // Another owner may use the same date.
    db.create_diary(bob, &write(1)).unwrap();
}

#[test]
fn moving_an_entry_onto_a_taken_date_is_a_conflict() {
    let db = Database::open_in_memory().unwrap();
    let ada = owner(&db, "ada");

    db.create_diary(ada, &write(1)).unwrap();
    let second = db.create_diary(ada, &write(2)).unwrap();

    let err = db.update_diary(ada, second.id, &write(1)).unwrap_err();
    assert!(matches!(err, DbError::Conflict { .. }));
}

#[test]
fn links_round_trip_in_order() {
    let db = Database::open_in_memory().unwrap();
    let ada = owner(&db, "ada");

    let row = db.create_diary(ada, &write(3)).unwrap();
    assert_eq!(row.photos, vec!["photos/a.jpg", "photos/b.jpg"]);
    let names: Vec<_> = row.locations.iter().map(|l| l.name.as_str()).collect();
    assert_eq!(names, vec!["Lisbon", "Sintra"]);

    let listed = db.list_diaries(ada).unwrap();
    assert_eq!(listed.len(), 1);
    assert!(db.get_diary(Uuid::new_v4(), row.id).unwrap().is_none());
    assert!(db.delete_diary(ada, row.id).unwrap());
}

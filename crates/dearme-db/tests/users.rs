use dearme_db::models::NewUser;
use dearme_db::{Database, DbError};
use dearme_types::api::ProfileUpdate;

fn new_user<'a>(username: &'a str, email: &'a str) -> NewUser<'a> {
    NewUser {
        username,
        email,
        password_hash: "hash",
        first_name: "Ada",
        last_name: "Lovelace",
    }
}

#[test]
fn accounts_start_inactive_and_unverified() {
    let db = Database::open_in_memory().unwrap();
    let user = db.create_user(&new_user("ada", "ada@example.com")).unwrap();
    assert!(!user.is_active);
    assert!(!user.is_email_verified);
    assert_eq!(user.timezone, "UTC");

    assert!(db.mark_email_verified(user.id).unwrap());
    let row = db.get_user_by_login("ADA@example.com").unwrap().unwrap();
    assert!(row.user.is_active && row.user.is_email_verified);
    assert_eq!(row.password, "hash");
}

#[test]
fn duplicate_email_and_username_are_told_apart() {
    let db = Database::open_in_memory().unwrap();
    db.create_user(&new_user("ada", "ada@example.com")).unwrap();

    let err = db.create_user(&new_user("other", "Ada@Example.com")).unwrap_err();
    assert!(matches!(err, DbError::Conflict { field: "email" }));

    let err = db.create_user(&new_user("ADA", "new@example.com")).unwrap_err();
    assert!(matches!(err, DbError::Conflict { field: "username" }));

    assert!(db.email_exists("ADA@EXAMPLE.COM").unwrap());
}

#[test]
fn profile_update_and_username_lookup() {
    let db = Database::open_in_memory().unwrap();
    let user = db.create_user(&new_user("ada", "ada@example.com")).unwrap();
    db.create_user(&new_user("bob", "bob@example.com")).unwrap();

    let updated = db
        .update_profile(
            user.id,
            &ProfileUpdate {
                first_name: "Augusta".into(),
                last_name: "King".into(),
                birthday: None,
                timezone: "Europe/London".into(),
                show_full_name: true,
            },
        )
        .unwrap();
    assert_eq!(updated.display_name(), "Augusta King");

    let found = db
        .get_users_by_usernames(&["bob".to_string(), "ghost".to_string()])
        .unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].username, "bob");
}

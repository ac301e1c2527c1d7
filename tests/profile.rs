mod common;

use common::*;
use furniture_shop::accounts::{get_profile, update_profile, ProfileForm};
use furniture_shop::errors::ServiceError;

fn edit(email: &str) -> ProfileForm {
    ProfileForm {
        first_name: "Asha".to_string(),
        last_name: "Rao".to_string(),
        email: email.to_string(),
        mobile_number: "9876543210".to_string(),
        address: "12 MG Road, Bengaluru".to_string(),
    }
}

#[test]
fn profile_is_created_on_first_view() {
    let Some(mut conn) = test_connection() else { return };
    let user = create_user(&mut conn, "asha");
    let profile = get_profile(&mut conn, user.id).unwrap();
    assert_eq!(profile.username, "asha");
    assert_eq!(profile.email, "asha@example.com");
    assert_eq!(profile.mobile_number, None);
    assert_eq!(profile.address, None);

    assert!(matches!(
        get_profile(&mut conn, user.id + 1000),
        Err(ServiceError::NotFound(_))
    ));
}

#[test]
fn edit_updates_names_email_and_contact() {
    let Some(mut conn) = test_connection() else { return };
    let user = create_user(&mut conn, "asha");
    let updated = update_profile(&mut conn, user.id, &edit("asha.rao@example.com")).unwrap();
    assert_eq!(updated.first_name, "Asha");
    assert_eq!(updated.last_name, "Rao");
    assert_eq!(updated.email, "asha.rao@example.com");
    assert_eq!(updated.mobile_number.as_deref(), Some("9876543210"));

    // Blank fields keep what is already stored.
    let unchanged = update_profile(&mut conn, user.id, &ProfileForm::default()).unwrap();
    assert_eq!(unchanged.email, "asha.rao@example.com");
    assert_eq!(unchanged.first_name, "Asha");
    assert_eq!(unchanged.address.as_deref(), Some("12 MG Road, Bengaluru"));
}

#[test]
fn email_of_another_account_is_refused() {
    let Some(mut conn) = test_connection() else { return };
    let asha = create_user(&mut conn, "asha");
    create_user(&mut conn, "vikram");

    assert!(matches!(
        update_profile(&mut conn, asha.id, &edit("vikram@example.com")),
        Err(ServiceError::Validation(_))
    ));
    let profile = get_profile(&mut conn, asha.id).unwrap();
    assert_eq!(profile.email, "asha@example.com");
    assert_eq!(profile.mobile_number, None);

    // Re-submitting one's own address is not a conflict.
    assert!(update_profile(&mut conn, asha.id, &edit("asha@example.com")).is_ok());
}

#[test]
fn malformed_email_writes_nothing() {
    let Some(mut conn) = test_connection() else { return };
    let user = create_user(&mut conn, "asha");
    assert!(matches!(
        update_profile(&mut conn, user.id, &edit("asha at example")),
        Err(ServiceError::Validation(_))
    ));
    let profile = get_profile(&mut conn, user.id).unwrap();
    assert_eq!(profile.email, "asha@example.com");
    assert_eq!(profile.first_name, "asha");
}

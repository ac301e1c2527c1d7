use diesel::prelude::*;
use diesel::result::{DatabaseErrorKind, Error as DieselError};
use serde::{Deserialize, Serialize};

use crate::errors::{Result, ServiceError};
use crate::models::{Profile, User};
use crate::schema::{profiles, users};

pub fn get_user_by_id(conn: &mut PgConnection, user_id: i32) -> Result<User> {
    users::table
        .find(user_id)
        .select(User::as_select())
        .first(conn)
        .optional()?
        .ok_or_else(|| ServiceError::not_found("User"))
}

/// Every user has exactly one customer profile; it is created on first use.
pub fn get_or_create_profile(conn: &mut PgConnection, user_id: i32) -> Result<Profile> {
    get_user_by_id(conn, user_id)?;
    diesel::insert_into(profiles::table)
        .values(profiles::user_id.eq(user_id))
        .on_conflict(profiles::user_id)
        .do_nothing()
        .execute(conn)?;
    let profile = profiles::table
        .filter(profiles::user_id.eq(user_id))
        .select(Profile::as_select())
        .first(conn)?;
    Ok(profile)
}

fn non_empty(value: &str) -> Option<String> {
    Some(value.trim())
        .filter(|value| !value.is_empty())
        .map(str::to_owned)
}

/// Overwrites contact details with the non-empty values submitted at checkout.
pub fn update_contact(
    conn: &mut PgConnection,
    profile: &Profile,
    mobile_number: &str,
    address: &str,
) -> Result<Profile> {
    let mobile_number = non_empty(mobile_number).or_else(|| profile.mobile_number.clone());
    let address = non_empty(address).or_else(|| profile.address.clone());
    let updated = diesel::update(profiles::table.find(profile.id))
        .set((
            profiles::mobile_number.eq(mobile_number),
            profiles::address.eq(address),
        ))
        .returning(Profile::as_returning())
        .get_result(conn)?;
    Ok(updated)
}

#[derive(Serialize, Debug)]
pub struct ProfileView {
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub mobile_number: Option<String>,
    pub address: Option<String>,
}

impl ProfileView {
    fn new(user: User, profile: Profile) -> Self {
        ProfileView {
            username: user.username,
            first_name: user.first_name,
            last_name: user.last_name,
            email: user.email,
            mobile_number: profile.mobile_number,
            address: profile.address,
        }
    }
}

/// Profile edit form. Blank fields keep their current value.
#[derive(Deserialize, Clone, Debug, Default)]
pub struct ProfileForm {
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub mobile_number: String,
    #[serde(default)]
    pub address: String,
}

impl ProfileForm {
    pub fn validate(&self) -> Result<()> {
        let email = self.email.trim();
        if !email.is_empty() {
            let well_formed = email
                .split_once('@')
                .is_some_and(|(local, domain)| !local.is_empty() && domain.contains('.'));
            if !well_formed || email.contains(char::is_whitespace) {
                return Err(ServiceError::Validation(
                    "Enter a valid email address".to_string(),
                ));
            }
        }
        Ok(())
    }
}

fn email_taken() -> ServiceError {
    ServiceError::Validation("This email is already taken by another account".to_string())
}

pub fn get_profile(conn: &mut PgConnection, user_id: i32) -> Result<ProfileView> {
    let user = get_user_by_id(conn, user_id)?;
    let profile = get_or_create_profile(conn, user_id)?;
    Ok(ProfileView::new(user, profile))
}

/// Applies a profile edit. The email must not belong to any other account.
pub fn update_profile(
    conn: &mut PgConnection,
    user_id: i32,
    form: &ProfileForm,
) -> Result<ProfileView> {
    form.validate()?;
    conn.transaction(|conn| {
        let user = get_user_by_id(conn, user_id)?;
        let email = non_empty(&form.email).unwrap_or_else(|| user.email.clone());
        if email != user.email {
            let taken: i64 = users::table
                .filter(users::email.eq(&email))
                .filter(users::id.ne(user_id))
                .count()
                .get_result(conn)?;
            if taken > 0 {
                return Err(email_taken());
            }
        }
        let user = diesel::update(users::table.find(user_id))
            .set((
                users::first_name.eq(non_empty(&form.first_name).unwrap_or(user.first_name)),
                users::last_name.eq(non_empty(&form.last_name).unwrap_or(user.last_name)),
                users::email.eq(email),
            ))
            .returning(User::as_returning())
            .get_result(conn)
            .map_err(|err| match err {
                DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, _) => email_taken(),
                other => ServiceError::from(other),
            })?;

        let profile = get_or_create_profile(conn, user_id)?;
        let profile = update_contact(conn, &profile, &form.mobile_number, &form.address)?;
        tracing::info!(user_id, "profile updated");
        Ok(ProfileView::new(user, profile))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_email(email: &str) -> ProfileForm {
        ProfileForm {
            email: email.to_string(),
            ..ProfileForm::default()
        }
    }

    #[test]
    fn blank_email_keeps_the_current_one() {
        assert!(with_email("").validate().is_ok());
        assert!(with_email("   ").validate().is_ok());
    }

    #[test]
    fn malformed_email_is_rejected() {
        assert!(with_email("asha@example.com").validate().is_ok());
        for bad in ["asha", "@example.com", "asha@localhost", "asha rao@example.com"] {
            assert!(
                matches!(with_email(bad).validate(), Err(ServiceError::Validation(_))),
                "{bad}"
            );
        }
    }
}

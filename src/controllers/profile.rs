use actix_web::{get, post, web, HttpRequest, HttpResponse, Responder};
use serde::Serialize;

use super::redirect_with_flash;
use crate::accounts::{get_profile, update_profile, ProfileForm, ProfileView};
use crate::errors::Result;
use crate::identity::{wants_json, CurrentUser};
use crate::DbPool;

#[derive(Serialize)]
struct ProfileUpdate {
    ok: bool,
    message: &'static str,
    profile: ProfileView,
}

#[get("/profile")]
pub async fn show_profile(pool: web::Data<DbPool>, user: CurrentUser) -> Result<impl Responder> {
    let profile = web::block(move || {
        let mut conn = pool.get()?;
        get_profile(&mut conn, user.id)
    })
    .await??;
    Ok(HttpResponse::Ok().json(profile))
}

#[post("/profile/edit")]
pub async fn edit_profile(
    req: HttpRequest,
    pool: web::Data<DbPool>,
    user: CurrentUser,
    form: web::Form<ProfileForm>,
) -> Result<impl Responder> {
    let form = form.into_inner();
    let profile = web::block(move || {
        let mut conn = pool.get()?;
        update_profile(&mut conn, user.id, &form)
    })
    .await??;
    let message = "Profile updated successfully";
    if wants_json(&req) {
        return Ok(HttpResponse::Ok().json(ProfileUpdate {
            ok: true,
            message,
            profile,
        }));
    }
    Ok(redirect_with_flash("/profile", message))
}

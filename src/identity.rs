use actix_web::{dev::Payload, FromRequest, HttpRequest};
use futures::future::{ready, Ready};

use crate::errors::ServiceError;

/// Header carrying the authenticated user's id, set by the auth layer in front of this service.
pub const USER_ID_HEADER: &str = "X-User-Id";

/// The authenticated shopper making the request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CurrentUser {
    pub id: i32,
}

impl FromRequest for CurrentUser {
    type Error = ServiceError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        let id = req
            .headers()
            .get(USER_ID_HEADER)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.trim().parse::<i32>().ok())
            .filter(|id| *id > 0);
        ready(id.map(|id| CurrentUser { id }).ok_or(ServiceError::Unauthenticated))
    }
}

/// AJAX callers get JSON; everyone else is redirected with a flash message.
pub fn wants_json(req: &HttpRequest) -> bool {
    req.headers()
        .get("x-requested-with")
        .and_then(|value| value.to_str().ok())
        .map(|value| value.eq_ignore_ascii_case("XMLHttpRequest"))
        .unwrap_or(false)
}

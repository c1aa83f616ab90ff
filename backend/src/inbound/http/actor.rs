//! Acting-user extraction for moderation handlers.
//!
//! Identity is resolved upstream; the gateway forwards the user id and role
//! as `X-Actor-Id` and `X-Actor-Role`. Handlers take [`ActingUser`] as an
//! argument and receive a domain [`Actor`], or the request fails with
//! `401 Unauthorized`.

use actix_web::{FromRequest, HttpRequest, dev::Payload};
use futures_util::future::{Ready, ready};
use serde_json::json;

use crate::domain::{Actor, ActorId, ActorRole, Error};

/// Header carrying the acting user's UUID.
pub const ACTOR_ID_HEADER: &str = "x-actor-id";

/// Header carrying the acting user's role.
pub const ACTOR_ROLE_HEADER: &str = "x-actor-role";

/// Extractor yielding the acting user for the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActingUser(pub Actor);

impl ActingUser {
    /// The resolved actor.
    #[must_use]
    pub const fn actor(&self) -> Actor {
        self.0
    }
}

fn header_error(header: &str, problem: &str, code: &str) -> Error {
    Error::unauthorized(format!("{problem} {header} header")).with_details(json!({
        "header": header,
        "code": code,
    }))
}

fn header_value<'a>(req: &'a HttpRequest, header: &str) -> Result<&'a str, Error> {
    let value = req
        .headers()
        .get(header)
        .ok_or_else(|| header_error(header, "missing", "missing_header"))?;
    value
        .to_str()
        .map_err(|_| header_error(header, "unreadable", "invalid_header"))
}

fn resolve_actor(req: &HttpRequest) -> Result<Actor, Error> {
    let id: ActorId = header_value(req, ACTOR_ID_HEADER)?
        .trim()
        .parse()
        .map_err(|_| header_error(ACTOR_ID_HEADER, "invalid", "invalid_header"))?;
    let role: ActorRole = header_value(req, ACTOR_ROLE_HEADER)?
        .parse()
        .map_err(|_| header_error(ACTOR_ROLE_HEADER, "invalid", "invalid_header"))?;
    Ok(Actor::new(id, role))
}

impl FromRequest for ActingUser {
    type Error = Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        ready(resolve_actor(req).map(ActingUser))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::http::StatusCode;
    use actix_web::{App, HttpResponse, test, web};
    use rstest::rstest;

    const REVIEWER: &str = "3fa85f64-5717-4562-b3fc-2c963f66afa6";

    async fn whoami(user: ActingUser) -> HttpResponse {
        let actor = user.actor();
        HttpResponse::Ok().body(format!("{} {}", actor.id(), actor.role()))
    }

    fn actor_test_app() -> App<
        impl actix_web::dev::ServiceFactory<
            actix_web::dev::ServiceRequest,
            Config = (),
            Response = actix_web::dev::ServiceResponse,
            Error = actix_web::Error,
            InitError = (),
        >,
    > {
        App::new().route("/whoami", web::get().to(whoami))
    }

    #[actix_web::test]
    async fn resolves_actor_from_headers() {
        let app = test::init_service(actor_test_app()).await;
        let req = test::TestRequest::get()
            .uri("/whoami")
            .insert_header((ACTOR_ID_HEADER, REVIEWER))
            .insert_header((ACTOR_ROLE_HEADER, "Reviewer"))
            .to_request();

        let res = test::call_service(&app, req).await;
        assert_eq!(res.status(), StatusCode::OK);
        let body = test::read_body(res).await;
        assert_eq!(body, format!("{REVIEWER} reviewer"));
    }

    #[rstest]
    #[case(None, Some("reviewer"), "missing_header")]
    #[case(Some(REVIEWER), None, "missing_header")]
    #[case(Some("not-a-uuid"), Some("reviewer"), "invalid_header")]
    #[case(Some(REVIEWER), Some("superuser"), "invalid_header")]
    #[actix_web::test]
    async fn missing_or_invalid_headers_are_unauthorised(
        #[case] id: Option<&str>,
        #[case] role: Option<&str>,
        #[case] code: &str,
    ) {
        let app = test::init_service(actor_test_app()).await;
        let mut req = test::TestRequest::get().uri("/whoami");
        if let Some(id) = id {
            req = req.insert_header((ACTOR_ID_HEADER, id));
        }
        if let Some(role) = role {
            req = req.insert_header((ACTOR_ROLE_HEADER, role));
        }

        let res = test::call_service(&app, req.to_request()).await;
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
        let body: Error = test::read_body_json(res).await;
        assert_eq!(
            body.details().and_then(|d| d.get("code")),
            Some(&serde_json::Value::from(code))
        );
    }
}

use crate::error::WebErrorKind;
use crate::{AppState, Error};
use axum::{
    extract::{Path, Request, State},
    http::{header, Method},
    middleware::Next,
    response::{IntoResponse, Response},
};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::Deserialize;
use std::collections::HashMap;

use log::*;

/// The claims Mercurio cares about. Publisher tokens may omit `user_id`;
/// recipient tokens must carry it to pass the client-route check.
#[derive(Debug, Deserialize)]
struct Claims {
    #[serde(default)]
    user_id: Option<String>,
}

/// Bearer-token authentication middleware.
///
/// Verifies the token signature against the symmetric secret loaded at boot
/// and, for any route carrying a `client_id` path variable, asserts that the
/// token's `user_id` claim matches the path. Only the read/write verbs
/// GET/POST/PUT are checked; everything else passes through.
pub async fn require_auth(
    State(app_state): State<AppState>,
    path_params: Option<Path<HashMap<String, String>>>,
    request: Request,
    next: Next,
) -> Response {
    if !is_authorization_required(request.method()) {
        return next.run(request).await;
    }

    let token = match bearer_token(&request) {
        Some(token) => token,
        None => {
            debug!("Blocking access: no bearer token presented");
            return Error::Web(WebErrorKind::Auth).into_response();
        }
    };

    let claims = match decode_claims(&token, app_state.auth_secret.as_bytes()) {
        Some(claims) => claims,
        None => {
            debug!("Blocking access: bearer token failed verification");
            return Error::Web(WebErrorKind::Auth).into_response();
        }
    };

    // Is it a client route? Then the token must belong to that client.
    let path_params = path_params.map(|Path(params)| params).unwrap_or_default();
    if let Some(client_id) = path_params.get("client_id") {
        if claims.user_id.as_deref() != Some(client_id.as_str()) {
            debug!("Blocking access: token does not correspond to client {client_id}");
            return Error::Web(WebErrorKind::Auth).into_response();
        }
    }

    next.run(request).await
}

fn is_authorization_required(method: &Method) -> bool {
    method == Method::GET || method == Method::POST || method == Method::PUT
}

fn bearer_token(request: &Request) -> Option<String> {
    request
        .headers()
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(|token| token.to_owned())
}

fn decode_claims(token: &str, secret: &[u8]) -> Option<Claims> {
    let mut validation = Validation::new(Algorithm::HS256);
    // Mercurio tokens are long-lived deployment credentials; expiry is not a
    // required claim.
    validation.validate_exp = false;
    validation.required_spec_claims.clear();

    decode::<Claims>(token, &DecodingKey::from_secret(secret), &validation)
        .map(|data| data.claims)
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{encode, EncodingKey, Header};
    use serde::Serialize;

    const SECRET: &[u8] = b"test-secret";

    #[derive(Serialize)]
    struct TestClaims {
        user_id: String,
    }

    fn token_for(user_id: &str) -> String {
        encode(
            &Header::default(),
            &TestClaims {
                user_id: user_id.to_owned(),
            },
            &EncodingKey::from_secret(SECRET),
        )
        .unwrap()
    }

    #[test]
    fn a_valid_token_decodes_its_user_id_claim() {
        let claims = decode_claims(&token_for("123"), SECRET).unwrap();

        assert_eq!(claims.user_id.as_deref(), Some("123"));
    }

    #[test]
    fn a_token_signed_with_another_secret_is_rejected() {
        let foreign = encode(
            &Header::default(),
            &TestClaims {
                user_id: "123".to_owned(),
            },
            &EncodingKey::from_secret(b"some-other-secret"),
        )
        .unwrap();

        assert!(decode_claims(&foreign, SECRET).is_none());
    }

    #[test]
    fn only_read_write_verbs_require_authorization() {
        assert!(is_authorization_required(&Method::GET));
        assert!(is_authorization_required(&Method::POST));
        assert!(is_authorization_required(&Method::PUT));
        assert!(!is_authorization_required(&Method::DELETE));
        assert!(!is_authorization_required(&Method::OPTIONS));
    }
}

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::cookie::CookieJar;
use jsonwebtoken::{DecodingKey, Validation, decode};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{AppState, urls, with_db};

pub const SESSION_COOKIE: &str = "yatube_session";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: i64,
    pub username: String,
    pub exp: usize,
}

/// Who is making the request; inserted for every route.
#[derive(Debug, Clone, Default)]
pub struct Viewer(pub Option<Claims>);

impl Viewer {
    pub fn claims(&self) -> Option<&Claims> {
        self.0.as_ref()
    }
}

pub fn decode_token(secret: &str, token: &str) -> jsonwebtoken::errors::Result<Claims> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
}

/// Resolve the session cookie. Missing, expired or forged tokens make the
/// request anonymous, as do tokens for accounts that no longer exist.
pub async fn identify(
    State(state): State<AppState>,
    jar: CookieJar,
    mut req: Request,
    next: Next,
) -> Response {
    let mut claims = jar
        .get(SESSION_COOKIE)
        .and_then(|cookie| decode_token(&state.secret, cookie.value()).ok());

    if let Some(user_id) = claims.as_ref().map(|c| c.sub) {
        match with_db(&state, move |db| db.user_exists(user_id)).await {
            Ok(true) => {}
            Ok(false) => {
                debug!("Session for missing user {} ignored", user_id);
                claims = None;
            }
            Err(e) => return e.into_response(),
        }
    }

    req.extensions_mut().insert(Viewer(claims));
    next.run(req).await
}

/// Send anonymous requests to the login page, remembering where they were going.
pub async fn require_login(mut req: Request, next: Next) -> Response {
    let claims = req.extensions().get::<Viewer>().and_then(|viewer| viewer.0.clone());

    match claims {
        Some(claims) => {
            req.extensions_mut().insert(claims);
            next.run(req).await
        }
        None => {
            let target = req.uri().path_and_query().map(|pq| pq.as_str()).unwrap_or("/");
            Redirect::to(&urls::login(target)).into_response()
        }
    }
}

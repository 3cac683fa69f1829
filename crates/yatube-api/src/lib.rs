pub mod about;
pub mod auth;
pub mod cache;
pub mod error;
pub mod follow;
pub mod media;
pub mod middleware;
pub mod pagination;
pub mod posts;
pub mod templates;
pub mod urls;

#[cfg(test)]
mod test_support;

use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    Extension, Router,
    extract::DefaultBodyLimit,
    http::StatusCode,
    middleware as axum_middleware,
    response::{Html, IntoResponse, Response},
    routing::{get, post},
};
use tower_http::services::ServeDir;
use tracing::error;

use yatube_db::Database;

use crate::cache::PageCache;
use crate::error::AppError;
use crate::middleware::{Viewer, identify, require_login};

/// Multipart bodies carry images of up to `media::MAX_IMAGE_SIZE`.
const MAX_BODY_SIZE: usize = 8 * 1024 * 1024;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Database,
    pub secret: String,
    pub media_dir: PathBuf,
    pub page_cache: PageCache,
}

pub fn router(state: AppState) -> Router {
    let public_routes: Router<AppState> = Router::new()
        .route("/", get(posts::index))
        .route("/group/{slug}/", get(posts::group_posts))
        .route("/profile/{username}/", get(posts::profile))
        .route("/posts/{post_id}/", get(posts::post_detail))
        .route("/auth/signup/", get(auth::signup_form).post(auth::signup))
        .route("/auth/login/", get(auth::login_form).post(auth::login))
        .route("/auth/logout/", get(auth::logout).post(auth::logout))
        .route("/about/author/", get(about::author))
        .route("/about/tech/", get(about::tech));

    let protected_routes: Router<AppState> = Router::new()
        .route("/create/", get(posts::post_create_form).post(posts::post_create))
        .route("/posts/{post_id}/edit/", get(posts::post_edit_form).post(posts::post_edit))
        .route("/posts/{post_id}/comment/", post(posts::add_comment))
        .route("/posts/{post_id}/add_comment/", post(posts::add_comment))
        .route("/follow/", get(follow::follow_index))
        .route("/profile/{username}/follow/", post(follow::profile_follow))
        .route("/profile/{username}/unfollow/", post(follow::profile_unfollow))
        .route_layer(axum_middleware::from_fn(require_login));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .nest_service("/media", ServeDir::new(&state.media_dir))
        .fallback(not_found)
        .layer(DefaultBodyLimit::max(MAX_BODY_SIZE))
        .layer(axum_middleware::from_fn_with_state(state.clone(), identify))
        .with_state(state)
}

async fn not_found(Extension(viewer): Extension<Viewer>) -> Response {
    let ctx = templates::context(viewer.claims());
    match templates::render("core/404.html", &ctx) {
        Ok(body) => (StatusCode::NOT_FOUND, Html(body)).into_response(),
        Err(e) => AppError::from(e).into_response(),
    }
}

/// Run a store call on the blocking pool.
pub(crate) async fn with_db<F, T>(state: &AppState, f: F) -> Result<T, AppError>
where
    F: FnOnce(&Database) -> anyhow::Result<T> + Send + 'static,
    T: Send + 'static,
{
    let state = state.clone();
    tokio::task::spawn_blocking(move || f(&state.db))
        .await
        .map_err(|e| {
            error!("spawn_blocking join error: {}", e);
            AppError::Internal(e.into())
        })?
        .map_err(AppError::from)
}

use axum::{
    Extension,
    extract::{Path, Query, State},
    response::{Html, Redirect},
};
use tracing::info;

use yatube_db::PostFilter;

use crate::error::AppError;
use crate::middleware::{Claims, Viewer};
use crate::pagination::{PageQuery, paginate_posts};
use crate::{AppState, templates, urls, with_db};

/// GET /follow/ — posts by the authors the viewer follows.
pub async fn follow_index(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Extension(viewer): Extension<Viewer>,
    Query(query): Query<PageQuery>,
) -> Result<Html<String>, AppError> {
    let page = paginate_posts(&state, PostFilter::FollowedBy(claims.sub), query.page).await?;

    let mut ctx = templates::context(viewer.claims());
    ctx.insert("page_obj", &page);
    Ok(Html(templates::render("posts/follow.html", &ctx)?))
}

/// POST /profile/{username}/follow/ — following yourself or someone you
/// already follow changes nothing.
pub async fn profile_follow(
    State(state): State<AppState>,
    Path(username): Path<String>,
    Extension(claims): Extension<Claims>,
) -> Result<Redirect, AppError> {
    let author_id = lookup_author(&state, &username).await?;

    if author_id != claims.sub {
        let user_id = claims.sub;
        let created = with_db(&state, move |db| db.follow(user_id, author_id)).await?;
        if created {
            info!("{} now follows {}", claims.username, username);
        }
    }

    Ok(Redirect::to(&urls::profile(&username)))
}

/// POST /profile/{username}/unfollow/
pub async fn profile_unfollow(
    State(state): State<AppState>,
    Path(username): Path<String>,
    Extension(claims): Extension<Claims>,
) -> Result<Redirect, AppError> {
    let author_id = lookup_author(&state, &username).await?;

    if author_id != claims.sub {
        let user_id = claims.sub;
        let removed = with_db(&state, move |db| db.unfollow(user_id, author_id)).await?;
        if !removed {
            return Err(AppError::NotFound);
        }
        info!("{} unfollowed {}", claims.username, username);
    }

    Ok(Redirect::to(&urls::profile(&username)))
}

async fn lookup_author(state: &AppState, username: &str) -> Result<i64, AppError> {
    let username = username.to_string();
    with_db(state, move |db| db.get_user_by_username(&username))
        .await?
        .map(|user| user.id)
        .ok_or(AppError::NotFound)
}

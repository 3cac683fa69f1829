use axum::{
    Extension, Form,
    body::Bytes,
    extract::{Multipart, Path, Query, State},
    http::Uri,
    response::{Html, IntoResponse, Redirect, Response},
};
use tracing::{debug, info};

use yatube_db::models::{CommentRow, GroupRow};
use yatube_db::{NewPost, PostChanges, PostFilter};
use yatube_types::forms::{CommentForm, FormErrors, INVALID_CHOICE, PostForm};
use yatube_types::models::Post;

use crate::cache::PageCache;
use crate::error::AppError;
use crate::media::{self, Upload};
use crate::middleware::{Claims, Viewer};
use crate::pagination::{PageQuery, paginate_posts};
use crate::{AppState, templates, urls, with_db};

// ── Listings ────────────────────────────────────────────────────────────

/// GET / — every post, served from the page cache when possible.
pub async fn index(
    State(state): State<AppState>,
    Extension(viewer): Extension<Viewer>,
    uri: Uri,
    Query(query): Query<PageQuery>,
) -> Result<Html<String>, AppError> {
    let key = PageCache::key(viewer.claims(), &uri);
    if let Some(body) = state.page_cache.get(&key) {
        debug!("Page cache hit for {}", key);
        return Ok(Html(body));
    }

    let page = paginate_posts(&state, PostFilter::All, query.page).await?;

    let mut ctx = templates::context(viewer.claims());
    ctx.insert("page_obj", &page);
    let body = templates::render("posts/index.html", &ctx)?;

    state.page_cache.insert(key, body.clone());
    Ok(Html(body))
}

/// GET /group/{slug}/
pub async fn group_posts(
    State(state): State<AppState>,
    Path(slug): Path<String>,
    Extension(viewer): Extension<Viewer>,
    Query(query): Query<PageQuery>,
) -> Result<Html<String>, AppError> {
    let group = with_db(&state, move |db| db.get_group_by_slug(&slug))
        .await?
        .ok_or(AppError::NotFound)?
        .into_model();

    let page = paginate_posts(&state, PostFilter::Group(group.id), query.page).await?;

    let mut ctx = templates::context(viewer.claims());
    ctx.insert("group", &group);
    ctx.insert("page_obj", &page);
    Ok(Html(templates::render("posts/group_list.html", &ctx)?))
}

/// GET /profile/{username}/
pub async fn profile(
    State(state): State<AppState>,
    Path(username): Path<String>,
    Extension(viewer): Extension<Viewer>,
    Query(query): Query<PageQuery>,
) -> Result<Html<String>, AppError> {
    let author = with_db(&state, move |db| db.get_user_by_username(&username))
        .await?
        .ok_or(AppError::NotFound)?
        .into_model();

    let page = paginate_posts(&state, PostFilter::Author(author.id), query.page).await?;

    let is_self = viewer.claims().is_some_and(|claims| claims.sub == author.id);
    let following = match viewer.claims() {
        Some(claims) if !is_self => {
            let (user_id, author_id) = (claims.sub, author.id);
            with_db(&state, move |db| db.is_following(user_id, author_id)).await?
        }
        _ => false,
    };

    let mut ctx = templates::context(viewer.claims());
    ctx.insert("author", &author);
    ctx.insert("post_count", &page.count);
    ctx.insert("following", &following);
    ctx.insert("is_self", &is_self);
    ctx.insert("page_obj", &page);
    Ok(Html(templates::render("posts/profile.html", &ctx)?))
}

// ── Detail ──────────────────────────────────────────────────────────────

/// GET /posts/{post_id}/
pub async fn post_detail(
    State(state): State<AppState>,
    Path(post_id): Path<i64>,
    Extension(viewer): Extension<Viewer>,
) -> Result<Html<String>, AppError> {
    let (post, comments, author_post_count) = with_db(&state, move |db| {
        let Some(post) = db.get_post(post_id)? else {
            return Ok(None);
        };
        let post = post.into_model();
        let comments: Vec<_> = db
            .list_comments(post_id)?
            .into_iter()
            .map(CommentRow::into_model)
            .collect();
        let count = db.count_posts(&PostFilter::Author(post.author.id))?;
        Ok(Some((post, comments, count)))
    })
    .await?
    .ok_or(AppError::NotFound)?;

    let is_author = viewer.claims().is_some_and(|claims| claims.sub == post.author.id);

    let mut ctx = templates::context(viewer.claims());
    ctx.insert("post", &post);
    ctx.insert("comments", &comments);
    ctx.insert("author_post_count", &author_post_count);
    ctx.insert("is_author", &is_author);
    ctx.insert("form", &CommentForm::default());
    Ok(Html(templates::render("posts/post_detail.html", &ctx)?))
}

// ── Create / edit ───────────────────────────────────────────────────────

/// GET /create/
pub async fn post_create_form(
    State(state): State<AppState>,
    Extension(viewer): Extension<Viewer>,
) -> Result<Response, AppError> {
    render_post_form(&state, &viewer, &PostForm::default(), &FormErrors::default(), None).await
}

/// POST /create/ — multipart `text`, `group`, `image`.
pub async fn post_create(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Extension(viewer): Extension<Viewer>,
    multipart: Multipart,
) -> Result<Response, AppError> {
    let submission = read_post_form(multipart).await?;

    let valid = match clean_post_form(&state, &submission).await? {
        Ok(valid) => valid,
        Err(errors) => {
            return render_post_form(&state, &viewer, &submission.form, &errors, None).await;
        }
    };

    let image = match &valid.image {
        Some((ext, bytes)) => Some(media::save_image(&state.media_dir, ext, bytes).await?),
        None => None,
    };

    let author_id = claims.sub;
    let stored = image.clone();
    let created = with_db(&state, move |db| {
        db.create_post(&NewPost {
            author_id,
            text: &valid.text,
            group_id: valid.group_id,
            image: image.as_deref(),
        })
    })
    .await;
    let post_id = match created {
        Ok(post_id) => post_id,
        Err(e) => {
            discard_upload(&state, stored.as_deref()).await;
            return Err(e);
        }
    };

    info!("Post {} created by {}", post_id, claims.username);
    Ok(Redirect::to(&urls::profile(&claims.username)).into_response())
}

/// GET /posts/{post_id}/edit/
pub async fn post_edit_form(
    State(state): State<AppState>,
    Path(post_id): Path<i64>,
    Extension(claims): Extension<Claims>,
    Extension(viewer): Extension<Viewer>,
) -> Result<Response, AppError> {
    let post = load_post(&state, post_id).await?;
    if post.author.id != claims.sub {
        return Ok(Redirect::to(&urls::post_detail(post_id)).into_response());
    }

    let form = PostForm {
        text: post.text.clone(),
        group: post.group.as_ref().map(|g| g.id.to_string()).unwrap_or_default(),
        clear_image: false,
    };
    render_post_form(&state, &viewer, &form, &FormErrors::default(), Some(&post)).await
}

/// POST /posts/{post_id}/edit/ — non-authors are sent back to the post
/// without any change.
pub async fn post_edit(
    State(state): State<AppState>,
    Path(post_id): Path<i64>,
    Extension(claims): Extension<Claims>,
    Extension(viewer): Extension<Viewer>,
    multipart: Multipart,
) -> Result<Response, AppError> {
    let post = load_post(&state, post_id).await?;
    if post.author.id != claims.sub {
        debug!("{} is not the author of post {}", claims.username, post_id);
        return Ok(Redirect::to(&urls::post_detail(post_id)).into_response());
    }

    let submission = read_post_form(multipart).await?;
    let valid = match clean_post_form(&state, &submission).await? {
        Ok(valid) => valid,
        Err(errors) => {
            return render_post_form(&state, &viewer, &submission.form, &errors, Some(&post)).await;
        }
    };

    // None keeps the stored image, Some(None) clears it
    let new_image = match &valid.image {
        Some((ext, bytes)) => Some(Some(media::save_image(&state.media_dir, ext, bytes).await?)),
        None if submission.form.clear_image => Some(None),
        None => None,
    };
    let replaced = new_image.is_some();
    let stored = new_image.clone().flatten();

    let updated = with_db(&state, move |db| {
        db.update_post(
            post_id,
            &PostChanges {
                text: &valid.text,
                group_id: valid.group_id,
                image: new_image.as_ref().map(|image| image.as_deref()),
            },
        )
    })
    .await;
    if let Err(e) = updated {
        discard_upload(&state, stored.as_deref()).await;
        return Err(e);
    }

    if let (true, Some(old)) = (replaced, post.image.as_deref()) {
        media::remove_image(&state.media_dir, old).await;
    }

    info!("Post {} edited by {}", post_id, claims.username);
    Ok(Redirect::to(&urls::post_detail(post_id)).into_response())
}

// ── Comments ────────────────────────────────────────────────────────────

/// POST /posts/{post_id}/comment/ — always lands back on the post; an
/// invalid comment is dropped.
pub async fn add_comment(
    State(state): State<AppState>,
    Path(post_id): Path<i64>,
    Extension(claims): Extension<Claims>,
    Form(form): Form<CommentForm>,
) -> Result<Redirect, AppError> {
    let author_id = claims.sub;
    let created = with_db(&state, move |db| {
        if db.get_post(post_id)?.is_none() {
            return Ok(None);
        }
        if !form.validate().is_empty() {
            return Ok(Some(false));
        }
        db.create_comment(post_id, author_id, &form.text)?;
        Ok(Some(true))
    })
    .await?
    .ok_or(AppError::NotFound)?;

    if !created {
        debug!("Dropped invalid comment on post {} by {}", post_id, claims.username);
    }
    Ok(Redirect::to(&urls::post_detail(post_id)))
}

// ── Helpers ─────────────────────────────────────────────────────────────

#[derive(Debug, Default)]
struct PostSubmission {
    form: PostForm,
    image: Option<Upload>,
}

/// A submission that passed validation.
struct ValidPost {
    text: String,
    group_id: Option<i64>,
    image: Option<(&'static str, Bytes)>,
}

async fn load_post(state: &AppState, post_id: i64) -> Result<Post, AppError> {
    with_db(state, move |db| db.get_post(post_id))
        .await?
        .map(|row| row.into_model())
        .ok_or(AppError::NotFound)
}

/// Drop a file saved for a write that did not happen.
async fn discard_upload(state: &AppState, image: Option<&str>) {
    if let Some(image) = image {
        media::remove_image(&state.media_dir, image).await;
    }
}

async fn read_post_form(mut multipart: Multipart) -> Result<PostSubmission, AppError> {
    let mut submission = PostSubmission::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(e.body_text()))?
    {
        let Some(name) = field.name().map(str::to_owned) else {
            continue;
        };
        match name.as_str() {
            "text" => {
                submission.form.text = field.text().await.map_err(|e| AppError::BadRequest(e.body_text()))?;
            }
            "group" => {
                submission.form.group = field.text().await.map_err(|e| AppError::BadRequest(e.body_text()))?;
            }
            "image-clear" => submission.form.clear_image = true,
            "image" => {
                let file_name = field.file_name().unwrap_or_default().to_owned();
                let bytes = field.bytes().await.map_err(|e| AppError::BadRequest(e.body_text()))?;
                // Browsers send an empty part when no file was chosen
                if !bytes.is_empty() {
                    submission.image = Some(Upload { file_name, bytes });
                }
            }
            _ => {}
        }
    }

    Ok(submission)
}

async fn clean_post_form(
    state: &AppState,
    submission: &PostSubmission,
) -> Result<Result<ValidPost, FormErrors>, AppError> {
    let mut errors = submission.form.validate();

    let group_id = submission.form.group_id().ok().flatten();
    if let Some(id) = group_id {
        let exists = with_db(state, move |db| Ok(db.get_group(id)?.is_some())).await?;
        if !exists {
            errors.add("group", INVALID_CHOICE);
        }
    }

    let image = match &submission.image {
        Some(upload) => match media::validate_image(upload) {
            Ok(ext) => Some((ext, upload.bytes.clone())),
            Err(message) => {
                errors.add("image", message);
                None
            }
        },
        None => None,
    };

    if !errors.is_empty() {
        return Ok(Err(errors));
    }
    Ok(Ok(ValidPost {
        text: submission.form.text.clone(),
        group_id,
        image,
    }))
}

async fn render_post_form(
    state: &AppState,
    viewer: &Viewer,
    form: &PostForm,
    errors: &FormErrors,
    post: Option<&Post>,
) -> Result<Response, AppError> {
    let groups: Vec<_> = with_db(state, |db| {
        Ok(db.list_groups()?.into_iter().map(GroupRow::into_model).collect())
    })
    .await?;

    let mut ctx = templates::context(viewer.claims());
    ctx.insert("form", form);
    ctx.insert("errors", errors);
    ctx.insert("groups", &groups);
    ctx.insert("is_edit", &post.is_some());
    if let Some(post) = post {
        ctx.insert("post", post);
    }
    Ok(Html(templates::render("posts/create_post.html", &ctx)?).into_response())
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;

    use crate::media::SMALL_GIF;
    use crate::test_support::TestApp;

    #[tokio::test]
    async fn public_pages_are_reachable() {
        let app = TestApp::new();
        let leo = app.user("leo");
        app.group("Cats", "cats");
        let post_id = app.post(&leo, "Hello there", None);

        for uri in [
            "/".to_string(),
            "/group/cats/".to_string(),
            "/profile/leo/".to_string(),
            format!("/posts/{post_id}/"),
            "/about/author/".to_string(),
            "/about/tech/".to_string(),
        ] {
            let res = app.get(&uri, None).await;
            assert_eq!(res.status, StatusCode::OK, "{uri}");
        }
    }

    #[tokio::test]
    async fn listings_render_post_fields() {
        let app = TestApp::new();
        let leo = app.user("leo");
        let cats = app.group("Cats", "cats");
        let post_id = app.post(&leo, "Whiskers", Some(cats));

        for uri in ["/", "/group/cats/", "/profile/leo/"] {
            let res = app.get(uri, None).await;
            assert!(res.body.contains("Whiskers"), "{uri}");
            assert!(res.body.contains(&format!(r#"data-post-id="{post_id}""#)), "{uri}");
            assert!(res.body.contains(r#"href="/group/cats/""#), "{uri}");
            assert!(res.body.contains("leo"), "{uri}");
        }
    }

    #[tokio::test]
    async fn group_page_excludes_other_groups() {
        let app = TestApp::new();
        let leo = app.user("leo");
        let cats = app.group("Cats", "cats");
        let dogs = app.group("Dogs", "dogs");
        app.post(&leo, "Meow", Some(cats));
        app.post(&leo, "Woof", Some(dogs));

        let res = app.get("/group/cats/", None).await;
        assert!(res.body.contains("Meow"));
        assert!(!res.body.contains("Woof"));
    }

    #[tokio::test]
    async fn listings_paginate_by_ten() {
        let app = TestApp::new();
        let leo = app.user("leo");
        let cats = app.group("Cats", "cats");
        for i in 0..13 {
            app.post(&leo, &format!("text{i}"), Some(cats));
        }

        for uri in ["/", "/group/cats/", "/profile/leo/"] {
            app.state.page_cache.clear();
            assert_eq!(app.get(uri, None).await.post_count(), 10, "{uri}");
            assert_eq!(app.get(&format!("{uri}?page=2"), None).await.post_count(), 3, "{uri}");
            assert_eq!(app.get(&format!("{uri}?page=9"), None).await.post_count(), 3, "{uri}");
            assert_eq!(app.get(&format!("{uri}?page=x"), None).await.post_count(), 10, "{uri}");
            let huge = format!("{uri}?page=99999999999999999999");
            assert_eq!(app.get(&huge, None).await.post_count(), 3, "{uri}");
        }
    }

    #[tokio::test]
    async fn newest_post_comes_first() {
        let app = TestApp::new();
        let leo = app.user("leo");
        app.post(&leo, "older", None);
        app.post(&leo, "newer", None);

        let body = app.get("/profile/leo/", None).await.body;
        let newer = body.find("newer").unwrap();
        let older = body.find("older").unwrap();
        assert!(newer < older);
    }

    #[tokio::test]
    async fn unknown_rows_are_not_found() {
        let app = TestApp::new();
        let leo = app.user("leo");

        for uri in ["/posts/999/", "/group/nope/", "/profile/nobody/"] {
            let res = app.get(uri, None).await;
            assert_eq!(res.status, StatusCode::NOT_FOUND, "{uri}");
            assert!(res.body.contains("Page not found"), "{uri}");
        }
        let res = app.get("/posts/999/edit/", Some(&leo)).await;
        assert_eq!(res.status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn unknown_path_renders_not_found_page() {
        let app = TestApp::new();
        let res = app.get("/somthing-page/", None).await;
        assert_eq!(res.status, StatusCode::NOT_FOUND);
        assert!(res.body.contains("Page not found"));
    }

    #[tokio::test]
    async fn post_detail_shows_post_and_comments() {
        let app = TestApp::new();
        let leo = app.user("leo");
        let mia = app.user("mia");
        let post_id = app.post(&leo, "Hello there", None);
        app.state.db.create_comment(post_id, mia.id, "General Kenobi").unwrap();

        let res = app.get(&format!("/posts/{post_id}/"), None).await;
        assert_eq!(res.status, StatusCode::OK);
        assert!(res.body.contains("Hello there"));
        assert!(res.body.contains("General Kenobi"));
        assert!(!res.body.contains("Edit post"));

        let res = app.get(&format!("/posts/{post_id}/"), Some(&leo)).await;
        assert!(res.body.contains("Edit post"));
    }

    #[tokio::test]
    async fn anonymous_users_are_sent_to_login() {
        let app = TestApp::new();
        let leo = app.user("leo");
        let post_id = app.post(&leo, "Hello", None);

        let res = app.get("/create/", None).await;
        assert!(res.status.is_redirection());
        assert_eq!(res.location(), Some("/auth/login/?next=/create/"));

        let edit = format!("/posts/{post_id}/edit/");
        let res = app.get(&edit, None).await;
        assert_eq!(res.location(), Some(format!("/auth/login/?next={edit}").as_str()));
    }

    #[tokio::test]
    async fn create_form_lists_groups() {
        let app = TestApp::new();
        let leo = app.user("leo");
        let cats = app.group("Cats", "cats");

        let res = app.get("/create/", Some(&leo)).await;
        assert_eq!(res.status, StatusCode::OK);
        assert!(res.body.contains(r#"name="text""#));
        assert!(res.body.contains(&format!(r#"<option value="{cats}""#)));
    }

    #[tokio::test]
    async fn valid_post_is_created() {
        let app = TestApp::new();
        let leo = app.user("leo");
        let cats = app.group("Cats", "cats");
        let before = app.total_posts();

        let res = app
            .post_multipart(
                "/create/",
                &[("text", "Fresh post"), ("group", &cats.to_string())],
                Some(("small.gif", SMALL_GIF)),
                Some(&leo),
            )
            .await;

        assert!(res.status.is_redirection());
        assert_eq!(res.location(), Some("/profile/leo/"));
        assert_eq!(app.total_posts(), before + 1);

        let row = app.latest_post().unwrap();
        assert_eq!(row.text, "Fresh post");
        assert_eq!(row.author_id, leo.id);
        assert_eq!(row.group_id, Some(cats));
        let image = row.image.expect("image should be stored");
        assert!(image.starts_with("posts/") && image.ends_with(".gif"));
        assert_eq!(std::fs::read(app.media_path(&image)).unwrap(), SMALL_GIF);
    }

    #[tokio::test]
    async fn invalid_post_redisplays_form() {
        let app = TestApp::new();
        let leo = app.user("leo");

        let res = app
            .post_multipart("/create/", &[("text", "  "), ("group", "42")], None, Some(&leo))
            .await;
        assert_eq!(res.status, StatusCode::OK);
        assert!(res.body.contains("This field is required."));
        assert!(res.body.contains("Select a valid choice."));
        assert_eq!(app.total_posts(), 0);

        let res = app
            .post_multipart(
                "/create/",
                &[("text", "with a fake image")],
                Some(("notes.txt", b"plain text")),
                Some(&leo),
            )
            .await;
        assert_eq!(res.status, StatusCode::OK);
        assert!(res.body.contains("Upload a valid image."));
        assert_eq!(app.total_posts(), 0);
    }

    #[tokio::test]
    async fn author_can_edit_post() {
        let app = TestApp::new();
        let leo = app.user("leo");
        let post_id = app.post(&leo, "Before", None);

        let res = app.get(&format!("/posts/{post_id}/edit/"), Some(&leo)).await;
        assert_eq!(res.status, StatusCode::OK);
        assert!(res.body.contains("Before"));

        let res = app
            .post_multipart(&format!("/posts/{post_id}/edit/"), &[("text", "After")], None, Some(&leo))
            .await;
        assert_eq!(res.location(), Some(format!("/posts/{post_id}/").as_str()));

        let row = app.state.db.get_post(post_id).unwrap().unwrap();
        assert_eq!(row.text, "After");
        assert_eq!(row.author_id, leo.id);
        assert_eq!(app.total_posts(), 1);
    }

    #[tokio::test]
    async fn edit_replaces_and_clears_image() {
        let app = TestApp::new();
        let leo = app.user("leo");
        let post_id = app.post(&leo, "Pic", None);
        let uri = format!("/posts/{post_id}/edit/");

        app.post_multipart(&uri, &[("text", "Pic")], Some(("a.gif", SMALL_GIF)), Some(&leo))
            .await;
        let first = app.state.db.get_post(post_id).unwrap().unwrap().image.unwrap();

        app.post_multipart(&uri, &[("text", "Pic")], Some(("b.gif", SMALL_GIF)), Some(&leo))
            .await;
        let second = app.state.db.get_post(post_id).unwrap().unwrap().image.unwrap();
        assert_ne!(first, second);
        assert!(!app.media_path(&first).exists());

        app.post_multipart(&uri, &[("text", "Pic"), ("image-clear", "on")], None, Some(&leo))
            .await;
        assert!(app.state.db.get_post(post_id).unwrap().unwrap().image.is_none());
        assert!(!app.media_path(&second).exists());
    }

    #[tokio::test]
    async fn editing_missing_post_is_not_found() {
        let app = TestApp::new();
        let leo = app.user("leo");

        let res = app
            .post_multipart("/posts/999/edit/", &[("text", "Hello")], None, Some(&leo))
            .await;
        assert_eq!(res.status, StatusCode::NOT_FOUND);
        assert_eq!(app.total_posts(), 0);
    }

    #[tokio::test]
    async fn invalid_edit_redisplays_form() {
        let app = TestApp::new();
        let leo = app.user("leo");
        let post_id = app.post(&leo, "Original", None);
        let uri = format!("/posts/{post_id}/edit/");

        let res = app.post_multipart(&uri, &[("text", "   ")], None, Some(&leo)).await;
        assert_eq!(res.status, StatusCode::OK);
        assert!(res.body.contains("This field is required."));
        assert!(res.body.contains(&format!(r#"action="{uri}""#)));
        assert_eq!(app.state.db.get_post(post_id).unwrap().unwrap().text, "Original");
    }

    fn reject_post_writes(app: &TestApp, event: &str) {
        let sql = format!(
            "CREATE TRIGGER reject_post_{event} BEFORE {event} ON posts \
             BEGIN SELECT RAISE(ABORT, 'posts are read-only'); END;"
        );
        app.state
            .db
            .with_conn(|conn| {
                conn.execute_batch(&sql)?;
                Ok(())
            })
            .unwrap();
    }

    fn stored_images(app: &TestApp) -> usize {
        std::fs::read_dir(app.media_path("posts"))
            .map(|entries| entries.count())
            .unwrap_or(0)
    }

    #[tokio::test]
    async fn failed_create_discards_the_upload() {
        let app = TestApp::new();
        let leo = app.user("leo");
        reject_post_writes(&app, "INSERT");

        let res = app
            .post_multipart("/create/", &[("text", "Pic")], Some(("a.gif", SMALL_GIF)), Some(&leo))
            .await;
        assert_eq!(res.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(app.total_posts(), 0);
        assert_eq!(stored_images(&app), 0);
    }

    #[tokio::test]
    async fn failed_edit_discards_the_upload() {
        let app = TestApp::new();
        let leo = app.user("leo");
        let post_id = app.post(&leo, "Pic", None);
        reject_post_writes(&app, "UPDATE");

        let res = app
            .post_multipart(
                &format!("/posts/{post_id}/edit/"),
                &[("text", "New pic")],
                Some(("a.gif", SMALL_GIF)),
                Some(&leo),
            )
            .await;
        assert_eq!(res.status, StatusCode::INTERNAL_SERVER_ERROR);
        let row = app.state.db.get_post(post_id).unwrap().unwrap();
        assert_eq!(row.text, "Pic");
        assert!(row.image.is_none());
        assert_eq!(stored_images(&app), 0);
    }

    #[tokio::test]
    async fn non_author_cannot_edit_post() {
        let app = TestApp::new();
        let leo = app.user("leo");
        let mia = app.user("mia");
        let post_id = app.post(&leo, "Original", None);
        let detail = format!("/posts/{post_id}/");

        let res = app.get(&format!("/posts/{post_id}/edit/"), Some(&mia)).await;
        assert_eq!(res.location(), Some(detail.as_str()));

        let res = app
            .post_multipart(&format!("/posts/{post_id}/edit/"), &[("text", "Hijacked")], None, Some(&mia))
            .await;
        assert_eq!(res.location(), Some(detail.as_str()));
        assert_eq!(app.state.db.get_post(post_id).unwrap().unwrap().text, "Original");
    }

    #[tokio::test]
    async fn comments_are_added_or_dropped() {
        let app = TestApp::new();
        let leo = app.user("leo");
        let mia = app.user("mia");
        let post_id = app.post(&leo, "Hello", None);
        let detail = format!("/posts/{post_id}/");

        let res = app
            .post_form(&format!("/posts/{post_id}/comment/"), "text=Nice+post", Some(&mia))
            .await;
        assert_eq!(res.location(), Some(detail.as_str()));

        let res = app
            .post_form(&format!("/posts/{post_id}/add_comment/"), "text=+++", Some(&mia))
            .await;
        assert_eq!(res.location(), Some(detail.as_str()));

        let comments = app.state.db.list_comments(post_id).unwrap();
        assert_eq!(comments.len(), 1);
        assert_eq!(comments[0].text, "Nice post");
        assert_eq!(comments[0].author_id, mia.id);

        let res = app.post_form("/posts/999/comment/", "text=Hi", Some(&mia)).await;
        assert_eq!(res.status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn anonymous_comment_is_rejected() {
        let app = TestApp::new();
        let leo = app.user("leo");
        let post_id = app.post(&leo, "Hello", None);
        let uri = format!("/posts/{post_id}/comment/");

        let res = app.post_form(&uri, "text=Hi", None).await;
        assert_eq!(res.location(), Some(format!("/auth/login/?next={uri}").as_str()));
        assert!(app.state.db.list_comments(post_id).unwrap().is_empty());
    }

    #[tokio::test]
    async fn index_is_cached_until_cleared() {
        let app = TestApp::new();
        let leo = app.user("leo");
        let post_id = app.post(&leo, "test_new_post", None);

        let old = app.get("/", None).await.body;
        assert!(old.contains("test_new_post"));

        app.state.db.delete_post(post_id).unwrap();
        let cached = app.get("/", None).await.body;
        assert_eq!(old, cached);

        app.state.page_cache.clear();
        let fresh = app.get("/", None).await.body;
        assert_ne!(old, fresh);
        assert!(!fresh.contains("test_new_post"));
    }
}

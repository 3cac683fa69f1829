//! Drives the real router in-process.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    Router,
    body::Body,
    http::{HeaderMap, Request, StatusCode, header},
};
use http_body_util::BodyExt;
use tempfile::TempDir;
use tower::ServiceExt;

use yatube_db::models::PostRow;
use yatube_db::{Database, NewPost, PostFilter};

use crate::auth::issue_token;
use crate::cache::PageCache;
use crate::middleware::SESSION_COOKIE;
use crate::{AppState, AppStateInner, router};

const SECRET: &str = "test-secret";
const BOUNDARY: &str = "yatube-test-boundary";

pub struct TestUser {
    pub id: i64,
    pub username: String,
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: String,
}

impl TestResponse {
    pub fn location(&self) -> Option<&str> {
        self.headers.get(header::LOCATION).and_then(|v| v.to_str().ok())
    }

    /// Number of post cards on the page.
    pub fn post_count(&self) -> usize {
        self.body.matches(r#"<article class="post""#).count()
    }
}

pub struct TestApp {
    pub state: AppState,
    router: Router,
    _media: TempDir,
}

impl TestApp {
    pub fn new() -> Self {
        let media = tempfile::tempdir().unwrap();
        let state: AppState = Arc::new(AppStateInner {
            db: Database::open_in_memory().unwrap(),
            secret: SECRET.to_string(),
            media_dir: media.path().to_path_buf(),
            page_cache: PageCache::new(Duration::from_secs(60)),
        });
        let router = router(state.clone());
        Self {
            state,
            router,
            _media: media,
        }
    }

    /// A user without a usable password; sessions are minted directly.
    pub fn user(&self, username: &str) -> TestUser {
        let id = self.state.db.create_user(username, "", "!").unwrap();
        TestUser {
            id,
            username: username.to_string(),
        }
    }

    pub fn group(&self, title: &str, slug: &str) -> i64 {
        self.state.db.create_group(title, slug, "Test description").unwrap()
    }

    pub fn post(&self, author: &TestUser, text: &str, group_id: Option<i64>) -> i64 {
        self.state
            .db
            .create_post(&NewPost {
                author_id: author.id,
                text,
                group_id,
                image: None,
            })
            .unwrap()
    }

    pub fn total_posts(&self) -> u64 {
        self.state.db.count_posts(&PostFilter::All).unwrap()
    }

    pub fn latest_post(&self) -> Option<PostRow> {
        self.state.db.list_posts(&PostFilter::All, 1, 0).unwrap().into_iter().next()
    }

    pub fn media_path(&self, relative: &str) -> PathBuf {
        self.state.media_dir.join(relative)
    }

    pub async fn get(&self, uri: &str, user: Option<&TestUser>) -> TestResponse {
        let req = self.builder("GET", uri, user).body(Body::empty()).unwrap();
        self.send(req).await
    }

    pub async fn request_with_cookie(&self, uri: &str, cookie: &str) -> TestResponse {
        let req = Request::builder()
            .uri(uri)
            .header(header::COOKIE, cookie)
            .body(Body::empty())
            .unwrap();
        self.send(req).await
    }

    pub async fn post_form(&self, uri: &str, body: &str, user: Option<&TestUser>) -> TestResponse {
        let req = self
            .builder("POST", uri, user)
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from(body.to_string()))
            .unwrap();
        self.send(req).await
    }

    /// `file` is sent as the `image` field.
    pub async fn post_multipart(
        &self,
        uri: &str,
        fields: &[(&str, &str)],
        file: Option<(&str, &[u8])>,
        user: Option<&TestUser>,
    ) -> TestResponse {
        let mut body = Vec::new();
        for (name, value) in fields {
            body.extend_from_slice(
                format!(
                    "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
                )
                .as_bytes(),
            );
        }
        if let Some((file_name, bytes)) = file {
            body.extend_from_slice(
                format!(
                    "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"image\"; filename=\"{file_name}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
                )
                .as_bytes(),
            );
            body.extend_from_slice(bytes);
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());

        let req = self
            .builder("POST", uri, user)
            .header(header::CONTENT_TYPE, format!("multipart/form-data; boundary={BOUNDARY}"))
            .body(Body::from(body))
            .unwrap();
        self.send(req).await
    }

    fn builder(&self, method: &str, uri: &str, user: Option<&TestUser>) -> axum::http::request::Builder {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(user) = user {
            let token = issue_token(SECRET, user.id, &user.username).unwrap();
            builder = builder.header(header::COOKIE, format!("{SESSION_COOKIE}={token}"));
        }
        builder
    }

    async fn send(&self, req: Request<Body>) -> TestResponse {
        let res = self.router.clone().oneshot(req).await.unwrap();
        let status = res.status();
        let headers = res.headers().clone();
        let bytes = res.into_body().collect().await.unwrap().to_bytes();
        TestResponse {
            status,
            headers,
            body: String::from_utf8_lossy(&bytes).into_owned(),
        }
    }
}

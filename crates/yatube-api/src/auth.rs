use argon2::{
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
    password_hash::{SaltString, rand_core::OsRng},
};
use axum::{
    Extension, Form,
    extract::{Query, State},
    response::{Html, IntoResponse, Redirect, Response},
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use jsonwebtoken::{EncodingKey, Header, encode};
use serde::Deserialize;
use tracing::{info, warn};

use yatube_types::forms::{FormErrors, LoginForm, SignupForm};

use crate::error::AppError;
use crate::middleware::{Claims, SESSION_COOKIE, Viewer};
use crate::{AppState, templates, urls, with_db};

const SESSION_DAYS: i64 = 30;

#[derive(Debug, Default, Deserialize)]
pub struct NextQuery {
    pub next: Option<String>,
}

pub async fn signup_form(Extension(viewer): Extension<Viewer>) -> Result<Html<String>, AppError> {
    render_signup(&viewer, &SignupForm::default(), &FormErrors::default())
}

pub async fn signup(
    State(state): State<AppState>,
    Extension(viewer): Extension<Viewer>,
    jar: CookieJar,
    Form(form): Form<SignupForm>,
) -> Result<Response, AppError> {
    let mut errors = form.validate();

    if errors.is_empty() {
        let username = form.username.clone();
        let taken = with_db(&state, move |db| Ok(db.get_user_by_username(&username)?.is_some())).await?;
        if taken {
            errors.add("username", "A user with that username already exists.");
        }
    }
    if !errors.is_empty() {
        return Ok(render_signup(&viewer, &form, &errors)?.into_response());
    }

    let password_hash = hash_password(&form.password1)?;
    let username = form.username.clone();
    let email = form.email.trim().to_string();
    let user_id =
        with_db(&state, move |db| db.create_user(&username, &email, &password_hash)).await?;

    info!("User {} signed up", form.username);

    let token = issue_token(&state.secret, user_id, &form.username)?;
    Ok((jar.add(session_cookie(token)), Redirect::to(urls::INDEX)).into_response())
}

pub async fn login_form(
    Extension(viewer): Extension<Viewer>,
    Query(query): Query<NextQuery>,
) -> Result<Html<String>, AppError> {
    let form = LoginForm {
        next: query.next,
        ..Default::default()
    };
    render_login(&viewer, &form, &FormErrors::default())
}

pub async fn login(
    State(state): State<AppState>,
    Extension(viewer): Extension<Viewer>,
    jar: CookieJar,
    Form(form): Form<LoginForm>,
) -> Result<Response, AppError> {
    let username = form.username.clone();
    let user = with_db(&state, move |db| db.get_user_by_username(&username)).await?;

    let user = match user {
        Some(user) if verify_password(&form.password, &user.password) => user,
        _ => {
            warn!("Failed login for '{}'", form.username);
            let mut errors = FormErrors::default();
            errors.add(
                "__all__",
                "Please enter a correct username and password. Note that both fields may be case-sensitive.",
            );
            return Ok(render_login(&viewer, &form, &errors)?.into_response());
        }
    };

    let token = issue_token(&state.secret, user.id, &user.username)?;
    let target = form
        .next
        .as_deref()
        .filter(|next| urls::is_safe_redirect(next))
        .unwrap_or(urls::INDEX);

    Ok((jar.add(session_cookie(token)), Redirect::to(target)).into_response())
}

pub async fn logout(jar: CookieJar) -> Result<Response, AppError> {
    let body = templates::render("users/logged_out.html", &templates::context(None))?;
    let jar = jar.remove(Cookie::build((SESSION_COOKIE, "")).path("/"));
    Ok((jar, Html(body)).into_response())
}

pub fn issue_token(secret: &str, user_id: i64, username: &str) -> anyhow::Result<String> {
    let claims = Claims {
        sub: user_id,
        username: username.to_string(),
        exp: (chrono::Utc::now() + chrono::Duration::days(SESSION_DAYS)).timestamp() as usize,
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?;

    Ok(token)
}

/// Hash a password with Argon2id.
pub fn hash_password(password: &str) -> anyhow::Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("Password hashing failed: {}", e))?
        .to_string();
    Ok(hash)
}

/// Accounts with an unparseable hash can never log in.
pub fn verify_password(password: &str, stored: &str) -> bool {
    PasswordHash::new(stored)
        .map(|parsed| Argon2::default().verify_password(password.as_bytes(), &parsed).is_ok())
        .unwrap_or(false)
}

fn session_cookie(token: String) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, token))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .build()
}

fn render_signup(viewer: &Viewer, form: &SignupForm, errors: &FormErrors) -> Result<Html<String>, AppError> {
    let mut ctx = templates::context(viewer.claims());
    ctx.insert("form", form);
    ctx.insert("errors", errors);
    Ok(Html(templates::render("users/signup.html", &ctx)?))
}

fn render_login(viewer: &Viewer, form: &LoginForm, errors: &FormErrors) -> Result<Html<String>, AppError> {
    let mut ctx = templates::context(viewer.claims());
    ctx.insert("form", form);
    ctx.insert("errors", errors);
    Ok(Html(templates::render("users/login.html", &ctx)?))
}

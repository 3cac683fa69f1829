use axum::{
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};
use tracing::error;

use crate::templates;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("not found")]
    NotFound,

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),

    #[error(transparent)]
    Template(#[from] tera::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self {
            Self::NotFound => error_page(StatusCode::NOT_FOUND, "core/404.html"),
            Self::BadRequest(reason) => (StatusCode::BAD_REQUEST, reason).into_response(),
            Self::Internal(e) => {
                error!("Internal error: {:#}", e);
                error_page(StatusCode::INTERNAL_SERVER_ERROR, "core/500.html")
            }
            Self::Template(e) => {
                error!("Template error: {:?}", e);
                error_page(StatusCode::INTERNAL_SERVER_ERROR, "core/500.html")
            }
        }
    }
}

fn error_page(status: StatusCode, template: &str) -> Response {
    match templates::render(template, &templates::context(None)) {
        Ok(body) => (status, Html(body)).into_response(),
        Err(e) => {
            error!("Failed to render {}: {}", template, e);
            status.into_response()
        }
    }
}

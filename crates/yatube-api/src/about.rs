use axum::{Extension, response::Html};

use crate::error::AppError;
use crate::middleware::Viewer;
use crate::templates;

pub async fn author(Extension(viewer): Extension<Viewer>) -> Result<Html<String>, AppError> {
    Ok(Html(templates::render("about/author.html", &templates::context(viewer.claims()))?))
}

pub async fn tech(Extension(viewer): Extension<Viewer>) -> Result<Html<String>, AppError> {
    Ok(Html(templates::render("about/tech.html", &templates::context(viewer.claims()))?))
}

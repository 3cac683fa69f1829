//! Database row types. These map directly to SQLite rows and are converted
//! into `yatube_types::models` before they reach handlers.

use chrono::{DateTime, NaiveDateTime, Utc};
use tracing::warn;
use yatube_types::models::{Author, Comment, Group, GroupRef, Post, User};

pub struct UserRow {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub password: String,
    pub created_at: String,
}

pub struct GroupRow {
    pub id: i64,
    pub title: String,
    pub slug: String,
    pub description: String,
}

pub struct PostRow {
    pub id: i64,
    pub text: String,
    pub author_id: i64,
    pub author_username: String,
    pub group_id: Option<i64>,
    pub group_title: Option<String>,
    pub group_slug: Option<String>,
    pub image: Option<String>,
    pub created_at: String,
}

pub struct CommentRow {
    pub id: i64,
    pub post_id: i64,
    pub author_id: i64,
    pub author_username: String,
    pub text: String,
    pub created_at: String,
}

impl UserRow {
    pub fn into_model(self) -> User {
        User {
            created_at: parse_timestamp(&self.created_at, "user", self.id),
            id: self.id,
            username: self.username,
        }
    }
}

impl GroupRow {
    pub fn into_model(self) -> Group {
        Group {
            id: self.id,
            title: self.title,
            slug: self.slug,
            description: self.description,
        }
    }
}

impl PostRow {
    pub fn into_model(self) -> Post {
        let group = match (self.group_id, self.group_title, self.group_slug) {
            (Some(id), Some(title), Some(slug)) => Some(GroupRef { id, title, slug }),
            _ => None,
        };
        Post {
            created_at: parse_timestamp(&self.created_at, "post", self.id),
            id: self.id,
            text: self.text,
            author: Author {
                id: self.author_id,
                username: self.author_username,
            },
            group,
            image: self.image,
        }
    }
}

impl CommentRow {
    pub fn into_model(self) -> Comment {
        Comment {
            created_at: parse_timestamp(&self.created_at, "comment", self.id),
            id: self.id,
            post_id: self.post_id,
            author: Author {
                id: self.author_id,
                username: self.author_username,
            },
            text: self.text,
        }
    }
}

/// SQLite stores timestamps as "YYYY-MM-DD HH:MM:SS.SSS" without timezone;
/// they are always UTC.
fn parse_timestamp(raw: &str, kind: &str, id: i64) -> DateTime<Utc> {
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f")
        .map(|ndt| ndt.and_utc())
        .or_else(|_| raw.parse::<DateTime<Utc>>())
        .unwrap_or_else(|e| {
            warn!("Corrupt created_at '{}' on {} {}: {}", raw, kind, id, e);
            DateTime::default()
        })
}

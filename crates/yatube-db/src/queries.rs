use crate::Database;
use crate::models::{CommentRow, GroupRow, PostRow, UserRow};
use anyhow::Result;
use rusqlite::types::ToSql;
use rusqlite::{Connection, Row};

/// Which posts a listing shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostFilter {
    All,
    Group(i64),
    Author(i64),
    /// Posts by every author the given user follows.
    FollowedBy(i64),
}

impl PostFilter {
    fn clause(&self) -> (&'static str, Option<i64>) {
        match self {
            Self::All => ("1 = 1", None),
            Self::Group(id) => ("p.group_id = ?", Some(*id)),
            Self::Author(id) => ("p.author_id = ?", Some(*id)),
            Self::FollowedBy(id) => (
                "p.author_id IN (SELECT author_id FROM follows WHERE user_id = ?)",
                Some(*id),
            ),
        }
    }
}

pub struct NewPost<'a> {
    pub author_id: i64,
    pub text: &'a str,
    pub group_id: Option<i64>,
    pub image: Option<&'a str>,
}

pub struct PostChanges<'a> {
    pub text: &'a str,
    pub group_id: Option<i64>,
    /// `None` keeps the current image; `Some(None)` clears it.
    pub image: Option<Option<&'a str>>,
}

const POST_COLUMNS: &str = "p.id, p.text, p.author_id, u.username, p.group_id, g.title, g.slug, p.image, p.created_at
     FROM posts p
     JOIN users u ON u.id = p.author_id
     LEFT JOIN post_groups g ON g.id = p.group_id";

impl Database {
    // -- Users --

    pub fn create_user(&self, username: &str, email: &str, password_hash: &str) -> Result<i64> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO users (username, email, password) VALUES (?1, ?2, ?3)",
                (username, email, password_hash),
            )?;
            Ok(conn.last_insert_rowid())
        })
    }

    pub fn get_user_by_username(&self, username: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT id, username, email, password, created_at FROM users WHERE username = ?1",
                [username],
                user_from_row,
            )
            .optional()
        })
    }

    pub fn user_exists(&self, id: i64) -> Result<bool> {
        self.with_conn(|conn| {
            let found: bool =
                conn.query_row("SELECT EXISTS(SELECT 1 FROM users WHERE id = ?1)", [id], |row| row.get(0))?;
            Ok(found)
        })
    }

    // -- Groups --

    pub fn create_group(&self, title: &str, slug: &str, description: &str) -> Result<i64> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO post_groups (title, slug, description) VALUES (?1, ?2, ?3)",
                (title, slug, description),
            )?;
            Ok(conn.last_insert_rowid())
        })
    }

    pub fn get_group_by_slug(&self, slug: &str) -> Result<Option<GroupRow>> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT id, title, slug, description FROM post_groups WHERE slug = ?1",
                [slug],
                group_from_row,
            )
            .optional()
        })
    }

    pub fn get_group(&self, id: i64) -> Result<Option<GroupRow>> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT id, title, slug, description FROM post_groups WHERE id = ?1",
                [id],
                group_from_row,
            )
            .optional()
        })
    }

    pub fn list_groups(&self) -> Result<Vec<GroupRow>> {
        self.with_conn(|conn| {
            let mut stmt =
                conn.prepare("SELECT id, title, slug, description FROM post_groups ORDER BY title")?;
            let rows = stmt
                .query_map([], group_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    // -- Posts --

    pub fn create_post(&self, post: &NewPost<'_>) -> Result<i64> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO posts (text, author_id, group_id, image) VALUES (?1, ?2, ?3, ?4)",
                rusqlite::params![post.text, post.author_id, post.group_id, post.image],
            )?;
            Ok(conn.last_insert_rowid())
        })
    }

    /// Returns false when the post does not exist.
    pub fn update_post(&self, id: i64, changes: &PostChanges<'_>) -> Result<bool> {
        self.with_conn(|conn| {
            let updated = match changes.image {
                Some(image) => conn.execute(
                    "UPDATE posts SET text = ?1, group_id = ?2, image = ?3 WHERE id = ?4",
                    rusqlite::params![changes.text, changes.group_id, image, id],
                )?,
                None => conn.execute(
                    "UPDATE posts SET text = ?1, group_id = ?2 WHERE id = ?3",
                    rusqlite::params![changes.text, changes.group_id, id],
                )?,
            };
            Ok(updated > 0)
        })
    }

    /// Removes the post and, through the foreign key, its comments.
    pub fn delete_post(&self, id: i64) -> Result<bool> {
        self.with_conn(|conn| Ok(conn.execute("DELETE FROM posts WHERE id = ?1", [id])? > 0))
    }

    pub fn get_post(&self, id: i64) -> Result<Option<PostRow>> {
        self.with_conn(|conn| {
            let sql = format!("SELECT {POST_COLUMNS} WHERE p.id = ?1");
            conn.query_row(&sql, [id], post_from_row).optional()
        })
    }

    pub fn count_posts(&self, filter: &PostFilter) -> Result<u64> {
        self.with_conn(|conn| {
            let (clause, param) = filter.clause();
            let sql = format!("SELECT COUNT(*) FROM posts p WHERE {clause}");
            let params: Vec<&dyn ToSql> = param.iter().map(|p| p as &dyn ToSql).collect();
            let count: i64 = conn.query_row(&sql, params.as_slice(), |row| row.get(0))?;
            Ok(count as u64)
        })
    }

    /// Newest first; ties on the timestamp fall back to insertion order.
    pub fn list_posts(&self, filter: &PostFilter, limit: u64, offset: u64) -> Result<Vec<PostRow>> {
        self.with_conn(|conn| query_posts(conn, filter, limit, offset))
    }

    // -- Comments --

    pub fn create_comment(&self, post_id: i64, author_id: i64, text: &str) -> Result<i64> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO comments (post_id, author_id, text) VALUES (?1, ?2, ?3)",
                rusqlite::params![post_id, author_id, text],
            )?;
            Ok(conn.last_insert_rowid())
        })
    }

    /// Oldest first.
    pub fn list_comments(&self, post_id: i64) -> Result<Vec<CommentRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT c.id, c.post_id, c.author_id, u.username, c.text, c.created_at
                 FROM comments c
                 JOIN users u ON u.id = c.author_id
                 WHERE c.post_id = ?1
                 ORDER BY c.created_at, c.id",
            )?;
            let rows = stmt
                .query_map([post_id], |row| {
                    Ok(CommentRow {
                        id: row.get(0)?,
                        post_id: row.get(1)?,
                        author_id: row.get(2)?,
                        author_username: row.get(3)?,
                        text: row.get(4)?,
                        created_at: row.get(5)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    // -- Follows --

    /// Returns true if a new relation was created. Existing relations and
    /// self-follows are left untouched.
    pub fn follow(&self, user_id: i64, author_id: i64) -> Result<bool> {
        if user_id == author_id {
            return Ok(false);
        }
        self.with_conn(|conn| {
            let inserted = conn.execute(
                "INSERT OR IGNORE INTO follows (user_id, author_id) VALUES (?1, ?2)",
                [user_id, author_id],
            )?;
            Ok(inserted > 0)
        })
    }

    /// Returns true if a relation was removed.
    pub fn unfollow(&self, user_id: i64, author_id: i64) -> Result<bool> {
        self.with_conn(|conn| {
            let deleted = conn.execute(
                "DELETE FROM follows WHERE user_id = ?1 AND author_id = ?2",
                [user_id, author_id],
            )?;
            Ok(deleted > 0)
        })
    }

    pub fn is_following(&self, user_id: i64, author_id: i64) -> Result<bool> {
        self.with_conn(|conn| {
            let exists: bool = conn.query_row(
                "SELECT EXISTS(SELECT 1 FROM follows WHERE user_id = ?1 AND author_id = ?2)",
                [user_id, author_id],
                |row| row.get(0),
            )?;
            Ok(exists)
        })
    }

    pub fn count_follows(&self) -> Result<u64> {
        self.with_conn(|conn| {
            let count: i64 = conn.query_row("SELECT COUNT(*) FROM follows", [], |row| row.get(0))?;
            Ok(count as u64)
        })
    }
}

fn query_posts(conn: &Connection, filter: &PostFilter, limit: u64, offset: u64) -> Result<Vec<PostRow>> {
    let (clause, param) = filter.clause();
    let sql = format!(
        "SELECT {POST_COLUMNS}
         WHERE {clause}
         ORDER BY p.created_at DESC, p.id DESC
         LIMIT ? OFFSET ?"
    );

    let limit = limit as i64;
    let offset = offset as i64;
    let mut params: Vec<&dyn ToSql> = param.iter().map(|p| p as &dyn ToSql).collect();
    params.push(&limit);
    params.push(&offset);

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params.as_slice(), post_from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(rows)
}

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<UserRow> {
    Ok(UserRow {
        id: row.get(0)?,
        username: row.get(1)?,
        email: row.get(2)?,
        password: row.get(3)?,
        created_at: row.get(4)?,
    })
}

fn group_from_row(row: &Row<'_>) -> rusqlite::Result<GroupRow> {
    Ok(GroupRow {
        id: row.get(0)?,
        title: row.get(1)?,
        slug: row.get(2)?,
        description: row.get(3)?,
    })
}

fn post_from_row(row: &Row<'_>) -> rusqlite::Result<PostRow> {
    Ok(PostRow {
        id: row.get(0)?,
        text: row.get(1)?,
        author_id: row.get(2)?,
        author_username: row.get(3)?,
        group_id: row.get(4)?,
        group_title: row.get(5)?,
        group_slug: row.get(6)?,
        image: row.get(7)?,
        created_at: row.get(8)?,
    })
}

/// Extension trait for optional query results
trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>>;
}

impl<T> OptionalExt<T> for std::result::Result<T, rusqlite::Error> {
    fn optional(self) -> Result<Option<T>> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

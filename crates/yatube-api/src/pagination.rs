use serde::{Deserialize, Serialize};

use yatube_db::PostFilter;
use yatube_db::models::PostRow;
use yatube_types::models::Post;

use crate::error::AppError;
use crate::{AppState, with_db};

pub const POSTS_PER_PAGE: u64 = 10;

/// `?page=N` on listing pages. Kept as a string so that garbage falls back
/// to the first page instead of rejecting the request.
#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<String>,
}

#[derive(Debug, Clone, Copy)]
pub struct Paginator {
    count: u64,
    per_page: u64,
}

impl Paginator {
    pub fn new(count: u64, per_page: u64) -> Self {
        Self { count, per_page }
    }

    /// An empty listing still has one (empty) page.
    pub fn num_pages(&self) -> u64 {
        if self.count == 0 {
            1
        } else {
            self.count.div_ceil(self.per_page)
        }
    }

    /// Missing or non-numeric input selects the first page; integers outside
    /// `1..=num_pages`, however long, select the last one.
    pub fn page_number(&self, requested: Option<&str>) -> u64 {
        let Some(raw) = requested.map(str::trim) else {
            return 1;
        };
        match raw.parse::<i64>() {
            Ok(n) if n >= 1 && n as u64 <= self.num_pages() => n as u64,
            Ok(_) => self.num_pages(),
            Err(_) if is_integer(raw) => self.num_pages(),
            Err(_) => 1,
        }
    }

    pub fn offset(&self, number: u64) -> u64 {
        (number - 1) * self.per_page
    }

    pub fn page<T>(&self, number: u64, object_list: Vec<T>) -> Page<T> {
        let num_pages = self.num_pages();
        Page {
            object_list,
            number,
            num_pages,
            count: self.count,
            has_previous: number > 1,
            has_next: number < num_pages,
            previous_page_number: (number > 1).then(|| number - 1),
            next_page_number: (number < num_pages).then(|| number + 1),
        }
    }
}

/// An optionally signed run of ASCII digits.
fn is_integer(raw: &str) -> bool {
    let digits = raw.strip_prefix(['-', '+']).unwrap_or(raw);
    !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit())
}

#[derive(Debug, Serialize)]
pub struct Page<T> {
    pub object_list: Vec<T>,
    pub number: u64,
    pub num_pages: u64,
    pub count: u64,
    pub has_previous: bool,
    pub has_next: bool,
    pub previous_page_number: Option<u64>,
    pub next_page_number: Option<u64>,
}

/// Count, resolve the requested page and fetch its slice in one store call.
pub async fn paginate_posts(
    state: &AppState,
    filter: PostFilter,
    requested: Option<String>,
) -> Result<Page<Post>, AppError> {
    with_db(state, move |db| {
        let paginator = Paginator::new(db.count_posts(&filter)?, POSTS_PER_PAGE);
        let number = paginator.page_number(requested.as_deref());
        let rows = db.list_posts(&filter, POSTS_PER_PAGE, paginator.offset(number))?;
        Ok(paginator.page(number, rows.into_iter().map(PostRow::into_model).collect()))
    })
    .await
}

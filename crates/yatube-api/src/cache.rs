//! Time-bounded cache of rendered pages.
//!
//! Entries are never invalidated by writes; they live until the TTL runs out
//! or the whole cache is cleared.

use std::time::Duration;

use axum::http::Uri;
use moka::sync::Cache;

use crate::middleware::Claims;

const MAX_ENTRIES: u64 = 1024;

pub struct PageCache {
    inner: Cache<String, String>,
}

impl PageCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            inner: Cache::builder()
                .max_capacity(MAX_ENTRIES)
                .time_to_live(ttl)
                .build(),
        }
    }

    /// Path and query, varied by viewer so personalised navigation is not
    /// shared between sessions.
    pub fn key(viewer: Option<&Claims>, uri: &Uri) -> String {
        let path = uri.path_and_query().map(|pq| pq.as_str()).unwrap_or("/");
        match viewer {
            Some(claims) => format!("user:{}:{}", claims.sub, path),
            None => format!("anon:{}", path),
        }
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.inner.get(key)
    }

    pub fn insert(&self, key: String, body: String) {
        self.inner.insert(key, body);
    }

    pub fn clear(&self) {
        self.inner.invalidate_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_vary_by_viewer_and_query() {
        let uri: Uri = "/?page=2".parse().unwrap();
        let claims = Claims {
            sub: 7,
            username: "leo".into(),
            exp: 0,
        };
        assert_eq!(PageCache::key(None, &uri), "anon:/?page=2");
        assert_eq!(PageCache::key(Some(&claims), &uri), "user:7:/?page=2");
    }

    #[test]
    fn clear_drops_entries() {
        let cache = PageCache::new(Duration::from_secs(60));
        cache.insert("anon:/".into(), "<html>".into());
        assert_eq!(cache.get("anon:/").as_deref(), Some("<html>"));

        cache.clear();
        assert!(cache.get("anon:/").is_none());
    }

    #[test]
    fn entries_expire() {
        let cache = PageCache::new(Duration::from_millis(20));
        cache.insert("anon:/".into(), "<html>".into());
        std::thread::sleep(Duration::from_millis(60));
        assert!(cache.get("anon:/").is_none());
    }
}

//! Builders for the application's own paths.

use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};

/// Characters left alone inside a path segment.
const SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~')
    .remove(b'@')
    .remove(b'+');

/// Characters left alone in the `next` query value; slashes stay readable.
const NEXT_VALUE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'/')
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

pub const INDEX: &str = "/";
pub const LOGIN: &str = "/auth/login/";

pub fn profile(username: &str) -> String {
    format!("/profile/{}/", utf8_percent_encode(username, SEGMENT))
}

pub fn post_detail(post_id: i64) -> String {
    format!("/posts/{post_id}/")
}

pub fn login(next: &str) -> String {
    format!("{LOGIN}?next={}", utf8_percent_encode(next, NEXT_VALUE))
}

/// Only same-site absolute paths are followed after login. Whitespace and
/// control characters are refused: browsers strip tabs and newlines, which
/// turns `/\t/host` into `//host`.
pub fn is_safe_redirect(target: &str) -> bool {
    target.starts_with('/')
        && !target.starts_with("//")
        && !target.contains('\\')
        && !target.chars().any(|c| c.is_control() || c.is_whitespace())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn login_keeps_slashes_in_next() {
        assert_eq!(login("/create/"), "/auth/login/?next=/create/");
        assert_eq!(login("/follow/?page=2"), "/auth/login/?next=/follow/%3Fpage%3D2");
    }

    #[test]
    fn profile_encodes_unicode_usernames() {
        assert_eq!(profile("leo"), "/profile/leo/");
        assert_eq!(profile("Автор"), "/profile/%D0%90%D0%B2%D1%82%D0%BE%D1%80/");
    }

    #[test]
    fn rejects_offsite_redirects() {
        assert!(is_safe_redirect("/posts/1/"));
        assert!(!is_safe_redirect("//evil.example"));
        assert!(!is_safe_redirect("https://evil.example"));
        assert!(!is_safe_redirect("/\\evil.example"));
        assert!(!is_safe_redirect("/\t/evil.example"));
        assert!(!is_safe_redirect("/\n/evil.example"));
        assert!(!is_safe_redirect("/a\nb"));
        assert!(!is_safe_redirect("/ /evil.example"));
        assert!(!is_safe_redirect(""));
    }
}

//! Result deduplication by exact URL and by domain.
//!
//! Stable: the first occurrence wins. A later item is dropped if its URL
//! was already seen, or if its domain (`host[:port]`) was already seen,
//! even when the full URL differs. Providers often surface several pages
//! of one site for a query; collapsing them keeps the source list diverse.

use std::collections::HashSet;

use crate::types::HasUrl;

/// Extract the `host[:port]` part of an `http(s)://` URL.
///
/// Matching is case-insensitive on the scheme. If the value does not look
/// like `http(s)://host...`, the whole string is returned, so a malformed
/// URL can only collide with an identical malformed URL.
pub fn extract_domain(url: &str) -> &str {
    let rest = strip_scheme(url);
    let Some(rest) = rest else {
        return url;
    };
    let end = rest.find(['/', '?', '#']).unwrap_or(rest.len());
    if end == 0 {
        return url;
    }
    &rest[..end]
}

fn strip_scheme(url: &str) -> Option<&str> {
    for scheme in ["https://", "http://"] {
        if url.len() >= scheme.len()
            && url.is_char_boundary(scheme.len())
            && url[..scheme.len()].eq_ignore_ascii_case(scheme)
        {
            return Some(&url[scheme.len()..]);
        }
    }
    None
}

/// Deduplicate by URL and domain, keeping first occurrences in order.
///
/// Runs in O(n) with two seen-sets.
pub fn dedupe<T: HasUrl>(items: Vec<T>) -> Vec<T> {
    let mut seen_urls: HashSet<String> = HashSet::new();
    let mut seen_domains: HashSet<String> = HashSet::new();

    items
        .into_iter()
        .filter(|item| {
            let url = item.url();
            let domain = extract_domain(url);
            if seen_urls.contains(url) || seen_domains.contains(domain) {
                return false;
            }
            seen_urls.insert(url.to_owned());
            seen_domains.insert(domain.to_owned());
            true
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Item {
        url: String,
        tag: u32,
    }

    impl HasUrl for Item {
        fn url(&self) -> &str {
            &self.url
        }
    }

    fn items(urls: &[&str]) -> Vec<Item> {
        urls.iter()
            .enumerate()
            .map(|(i, u)| Item {
                url: (*u).to_owned(),
                tag: i as u32,
            })
            .collect()
    }

    #[test]
    fn extract_domain_takes_host_and_port() {
        assert_eq!(extract_domain("https://a.com/1"), "a.com");
        assert_eq!(extract_domain("http://a.com:8080/x?y"), "a.com:8080");
        assert_eq!(extract_domain("HTTPS://Example.org"), "Example.org");
        assert_eq!(extract_domain("https://a.com?q=1"), "a.com");
        assert_eq!(extract_domain("https://a.com#frag"), "a.com");
    }

    #[test]
    fn extract_domain_falls_back_to_whole_string() {
        assert_eq!(extract_domain("not a url"), "not a url");
        assert_eq!(extract_domain("ftp://files.example.com/x"), "ftp://files.example.com/x");
        assert_eq!(extract_domain("https:///path"), "https:///path");
        assert_eq!(extract_domain(""), "");
    }

    #[test]
    fn same_domain_collapses_to_first() {
        let out = dedupe(items(&["https://a.com/1", "https://a.com/2"]));
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].url, "https://a.com/1");
    }

    #[test]
    fn exact_duplicate_collapses() {
        let out = dedupe(items(&["https://a.com/x", "https://a.com/x"]));
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].tag, 0);
    }

    #[test]
    fn distinct_domains_preserve_order() {
        let out = dedupe(items(&[
            "https://c.com/1",
            "https://a.com/1",
            "https://b.com/1",
            "https://a.com/2",
        ]));
        let urls: Vec<&str> = out.iter().map(|i| i.url.as_str()).collect();
        assert_eq!(urls, vec!["https://c.com/1", "https://a.com/1", "https://b.com/1"]);
    }

    #[test]
    fn different_ports_are_different_domains() {
        let out = dedupe(items(&["http://a.com:80/x", "http://a.com:8080/x"]));
        assert_eq!(out.len(), 2);
    }

    #[test]
    fn malformed_values_never_panic_and_only_collide_when_identical() {
        let out = dedupe(items(&["garbage", "garbage", "other garbage", "https://garbage/"]));
        let urls: Vec<&str> = out.iter().map(|i| i.url.as_str()).collect();
        assert_eq!(urls, vec!["garbage", "other garbage", "https://garbage/"]);
    }

    #[test]
    fn dedupe_is_idempotent() {
        let inputs: Vec<Vec<Item>> = vec![
            items(&[]),
            items(&["https://a.com/1", "https://a.com/2", "https://b.com/1"]),
            items(&["x", "x", "https://x/", "http://x/", "https://y.org:1/a", "https://y.org:1/b"]),
            items(&["https://é.example/ü", "https://É.example/ü", "https://é.example/v"]),
        ];
        for input in inputs {
            let once = dedupe(input);
            let twice = dedupe(once.clone());
            assert_eq!(once, twice);
        }
    }

    #[test]
    fn empty_input_returns_empty() {
        let out: Vec<Item> = dedupe(vec![]);
        assert!(out.is_empty());
    }
}

//! Link policies shared by the crawl engine, the frontier and storage

/// Cleans a raw `href` value: percent-decodes and trims it
///
/// Returns `None` for values that carry no link at all (empty or the bare
/// root anchor `/`).
pub fn normalize_link(raw: &str) -> Option<String> {
    let decoded = urlencoding::decode(raw)
        .map(|s| s.into_owned())
        .unwrap_or_else(|_| raw.to_string());
    let link = decoded.trim().to_string();

    if link.is_empty() || link == "/" {
        None
    } else {
        Some(link)
    }
}

/// Applies the hash-fragment policy to a candidate URL
///
/// With `extract_hash_urls` off, everything from the first `#` is cut and an
/// empty remainder is dropped. With it on, URLs with more than one `#` are
/// dropped and the rest pass through unchanged.
///
/// # Examples
///
/// ```
/// use arns_crawler::url::apply_hash_policy;
///
/// assert_eq!(apply_hash_policy("/a#b", false).as_deref(), Some("/a"));
/// assert_eq!(apply_hash_policy("#top", false), None);
/// assert_eq!(apply_hash_policy("/a#b", true).as_deref(), Some("/a#b"));
/// assert_eq!(apply_hash_policy("/a#b#c", true), None);
/// ```
pub fn apply_hash_policy(url: &str, extract_hash_urls: bool) -> Option<String> {
    if extract_hash_urls {
        if url.matches('#').count() > 1 {
            return None;
        }
        return Some(url.to_string());
    }

    let kept = match url.find('#') {
        Some(index) => &url[..index],
        None => url,
    };

    if kept.is_empty() {
        None
    } else {
        Some(kept.to_string())
    }
}

/// First two frontier gates: drop empty/root links, then apply the hash policy
pub fn prefilter_candidate(url: &str, extract_hash_urls: bool) -> Option<String> {
    if url.is_empty() || url == "/" {
        return None;
    }
    apply_hash_policy(url, extract_hash_urls)
}

/// Returns true for links that stay on the page's own name
pub fn is_relative(link: &str) -> bool {
    link.starts_with('/') || link.starts_with("./") || link.starts_with("#/")
}

/// Splits links into `(relative, absolute)`, trimming and lower-casing each
pub fn split_links<I, S>(links: I) -> (Vec<String>, Vec<String>)
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut relative = Vec::new();
    let mut absolute = Vec::new();

    for link in links {
        let link = link.as_ref().trim().to_lowercase();
        if link.is_empty() {
            continue;
        }
        if is_relative(&link) {
            relative.push(link);
        } else {
            absolute.push(link);
        }
    }

    (relative, absolute)
}

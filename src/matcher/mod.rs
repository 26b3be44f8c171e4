//! Path pattern matching
//!
//! A closed pattern language over URL paths, used by the gateway for rule
//! lookup and by the reconciler for Ingress path classification. Patterns are
//! `/`-separated segments where `*` matches exactly one segment and a
//! trailing `/**` matches the parent and any descendant. Trailing slashes
//! never affect the result.

/// Check whether a request path matches a pattern.
///
/// - Exact match: `/api/v1/users` matches `/api/v1/users`
/// - Single segment wildcard: `/api/v1/*` matches `/api/v1/users` but not
///   `/api/v1/users/123`
/// - Any-depth suffix: `/api/v1/**` matches `/api/v1`, `/api/v1/users`, and
///   `/api/v1/users/123/posts`
///
/// A trailing `/*` is accepted as an any-depth suffix too, for Ingress path
/// back-compat; `*` is only segment-strict when it is not the final segment.
pub fn match_path(pattern: &str, path: &str) -> bool {
    if pattern == path {
        return true;
    }

    // `/**` and trailing `/*` both mean the prefix and any descendant.
    if let Some(prefix) = pattern
        .strip_suffix("/**")
        .or_else(|| pattern.strip_suffix("/*"))
    {
        let prefix = prefix.trim_end_matches('/');
        let clean_path = path.trim_end_matches('/');
        if prefix.is_empty() {
            return true;
        }
        return clean_path == prefix || clean_path.starts_with(&format!("{prefix}/"));
    }

    // Segment-by-segment comparison with single `*` wildcards.
    let pattern_parts: Vec<&str> = pattern.trim_matches('/').split('/').collect();
    let path_parts: Vec<&str> = path.trim_matches('/').split('/').collect();

    if pattern_parts.len() != path_parts.len() {
        return false;
    }

    pattern_parts
        .iter()
        .zip(&path_parts)
        .all(|(pp, sp)| *pp == "*" || pp == sp)
}

/// Check whether a concrete Ingress path should be redirected to the gateway
/// because it covers the given paid path pattern.
///
/// Ingress `(.*)` regex suffixes and paid `/**` / `/*` suffixes are stripped
/// before comparison; the Ingress path covers the paid path when the cleaned
/// paths are equal or the Ingress prefix is a parent of the paid prefix. A
/// catch-all `/` Ingress path covers every paid sub-tree.
pub fn ingress_path_covers_paid_path(ingress_path: &str, paid_path: &str) -> bool {
    let mut clean_ingress = ingress_path
        .strip_suffix("(.*)")
        .unwrap_or(ingress_path)
        .trim_end_matches('/');
    if clean_ingress.is_empty() {
        clean_ingress = "/";
    }

    let stripped = paid_path
        .strip_suffix("/**")
        .or_else(|| paid_path.strip_suffix("/*"))
        .unwrap_or(paid_path);
    let mut clean_paid = stripped.trim_end_matches('/');
    if clean_paid.is_empty() {
        clean_paid = "/";
    }

    if clean_ingress == clean_paid {
        return true;
    }
    // A catch-all ingress captures every paid sub-tree.
    if clean_ingress == "/" {
        return true;
    }
    // The ingress prefix is a parent of the paid prefix, or the ingress path
    // sits inside the paid sub-tree; either way its traffic needs gating.
    if clean_paid != "/"
        && (clean_paid.starts_with(&format!("{clean_ingress}/"))
            || clean_ingress.starts_with(&format!("{clean_paid}/")))
    {
        return true;
    }
    ingress_path == paid_path
}

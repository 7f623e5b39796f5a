//! Route template normalization and placeholder expansion.
//!
//! Templates are written the way a developer thinks of them (`users/{param}/posts`,
//! `\admin\\stats/`, ...) and turned into the exact `/`-separated form stored in the
//! trie, with every placeholder replaced by the wildcard token of its parameter.

use crate::router::{RouteError, WildcardKind};

/// Collapses runs of `/` and `\` into a single `/` and trims leading separators.
///
/// Trailing separators are trimmed as well unless `keep_trailing` is set.
///
/// ```
/// use waypath::host::format_path;
///
/// assert_eq!(format_path("//a\\\\b//c/", false), "a/b/c");
/// assert_eq!(format_path("/a//b/", true), "a/b/");
/// ```
pub fn format_path(path: &str, keep_trailing: bool) -> String {
    let mut out = String::with_capacity(path.len());
    let mut in_separator = false;
    for ch in path.chars() {
        if ch == '/' || ch == '\\' {
            if !in_separator {
                out.push('/');
            }
            in_separator = true;
        } else {
            out.push(ch);
            in_separator = false;
        }
    }

    let trimmed = out.trim_start_matches('/');
    let trimmed = if keep_trailing {
        trimmed
    } else {
        trimmed.trim_end_matches('/')
    };
    trimmed.to_owned()
}

/// Builds the stored form of a route template.
///
/// The result always starts with `/`; a trailing separator on `template` is kept. Each
/// occurrence of `placeholder` (e.g. `{param}`) is replaced, left to right, by the token
/// of the next entry in `params`. Parameters left over once the placeholders run out are
/// appended as extra trailing segments.
///
/// # Errors
///
/// [`RouteError::TemplateMismatch`] if the template has more placeholders than there
/// are parameters.
///
/// # Examples
///
/// ```
/// use waypath::host::expand_template;
/// use waypath::router::WildcardKind;
///
/// let path = expand_template(
///     "users/{param}/posts",
///     "{param}",
///     &[WildcardKind::Digits, WildcardKind::String],
/// )
/// .unwrap();
/// assert_eq!(path, "/users/{digits}/posts/{string}");
/// ```
pub fn expand_template(
    template: &str,
    placeholder: &str,
    params: &[WildcardKind],
) -> Result<String, RouteError> {
    let ends_with_separator = template.ends_with('/') || template.ends_with('\\');
    let mut path = format!("/{}", format_path(template, false));
    if ends_with_separator && path.len() > 1 {
        path.push('/');
    }

    // One pass over the normalized template; substituted tokens are never rescanned.
    let mut params = params.iter();
    let mut expanded = String::with_capacity(path.len());
    let mut rest = 0;
    let mut missing = false;
    for (start, matched) in path.match_indices(placeholder) {
        expanded.push_str(&path[rest..start]);
        match params.next() {
            Some(kind) => expanded.push_str(kind.token()),
            None => {
                expanded.push_str(matched);
                missing = true;
            }
        }
        rest = start + matched.len();
    }
    expanded.push_str(&path[rest..]);
    let mut path = expanded;
    if missing {
        return Err(RouteError::TemplateMismatch { path });
    }

    for kind in params {
        if !path.ends_with('/') {
            path.push('/');
        }
        path.push_str(kind.token());
    }
    Ok(path)
}

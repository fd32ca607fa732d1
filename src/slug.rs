//! Slug and filename derivation.
//!
//! A slug is the URL-safe identifier derived from a recipe title; it is
//! also the file basename, so both derivations are enforced here at write
//! time rather than treated as an incidental detail.

/// Upper bound on slug length before collision suffixing.
pub const MAX_SLUG_LEN: usize = 200;

/// Convert free text to a URL-safe slug: lowercased, punctuation stripped,
/// whitespace/underscores collapsed to single hyphens, bounded length.
///
/// `"Chicken Curry (Pressure Cooker)"` becomes
/// `"chicken-curry-pressure-cooker"`.
pub fn slugify(text: &str) -> String {
    let mut slug = String::with_capacity(text.len());
    let mut pending_hyphen = false;

    for ch in text.chars() {
        for lc in ch.to_lowercase() {
            if lc.is_ascii_alphanumeric() {
                if pending_hyphen && !slug.is_empty() {
                    slug.push('-');
                }
                pending_hyphen = false;
                slug.push(lc);
            } else if lc.is_whitespace() || lc == '-' || lc == '_' {
                pending_hyphen = true;
            }
            // Any other punctuation is dropped without acting as a separator,
            // so "Mom's Pie" yields "moms-pie" rather than "mom-s-pie".
        }
    }

    if slug.len() > MAX_SLUG_LEN {
        slug.truncate(MAX_SLUG_LEN);
    }
    while slug.ends_with('-') {
        slug.pop();
    }
    slug
}

/// Sanitize a name for use as a file basename.
///
/// Strips directory components and anything outside `[a-z0-9._-]` so a slug
/// supplied by a caller can never escape the recipes directory.
pub fn sanitize_filename(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name);

    let mut out = String::with_capacity(base.len());
    let mut prev_hyphen = false;
    for ch in base.chars() {
        let mapped = if ch.is_ascii_alphanumeric() || ch == '.' || ch == '_' {
            Some(ch)
        } else if ch == ' ' || ch == '-' {
            Some('-')
        } else {
            None
        };
        if let Some(c) = mapped {
            if c == '-' {
                if prev_hyphen {
                    continue;
                }
                prev_hyphen = true;
            } else {
                prev_hyphen = false;
            }
            out.push(c);
        }
    }

    out.trim_matches(|c| c == '-' || c == '.').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slugify_basic() {
        assert_eq!(slugify("Chicken Curry"), "chicken-curry");
    }

    #[test]
    fn test_slugify_punctuation() {
        assert_eq!(
            slugify("Chicken Curry (Pressure Cooker)"),
            "chicken-curry-pressure-cooker"
        );
        assert_eq!(slugify("Mom's Famous Apple Pie!"), "moms-famous-apple-pie");
    }

    #[test]
    fn test_slugify_collapses_whitespace() {
        assert_eq!(slugify("  Slow   Cooked\tBeef  "), "slow-cooked-beef");
        assert_eq!(slugify("one_two - three"), "one-two-three");
    }

    #[test]
    fn test_slugify_truncates() {
        let long = "a".repeat(300);
        assert_eq!(slugify(&long).len(), MAX_SLUG_LEN);
    }

    #[test]
    fn test_slugify_no_trailing_hyphen_after_truncation() {
        let mut text = "ab ".repeat(80);
        text.truncate(MAX_SLUG_LEN + 1);
        let slug = slugify(&text);
        assert!(!slug.ends_with('-'));
        assert!(slug.len() <= MAX_SLUG_LEN);
    }

    #[test]
    fn test_slugify_empty_when_no_alphanumerics() {
        assert_eq!(slugify("!!! ???"), "");
    }

    #[test]
    fn test_sanitize_strips_directories() {
        assert_eq!(sanitize_filename("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_filename("a/b\\c"), "c");
    }

    #[test]
    fn test_sanitize_removes_unsafe_characters() {
        assert_eq!(sanitize_filename("my recipe?.md"), "my-recipe.md");
        assert_eq!(sanitize_filename("--weird--name--"), "weird-name");
    }

    #[test]
    fn test_sanitize_trims_leading_dots() {
        assert_eq!(sanitize_filename(".hidden"), "hidden");
    }
}

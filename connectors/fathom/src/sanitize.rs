use sha2::{Digest, Sha256};

pub const MAX_SLUG_LEN: usize = 60;
const MAX_DATE_LEN: usize = 20;
const ID_SUFFIX_LEN: usize = 12;

/// Builds a deterministic file stem `{date}_{title-slug}_{id-hash}`.
///
/// The suffix is derived from the raw id, so two meetings with identical
/// titles and dates still land in different files.
pub fn sanitize(title: &str, date: &str, id: &str) -> String {
    let slug = slugify(title, MAX_SLUG_LEN).unwrap_or_else(|| "untitled".to_string());
    let date = slugify(date, MAX_DATE_LEN).unwrap_or_else(|| "undated".to_string());
    format!("{}_{}_{}", date, slug, id_suffix(id))
}

/// Lowercases and collapses every run outside `[a-z0-9-_]` into one `-`.
/// Returns `None` when nothing usable is left.
pub fn slugify(value: &str, max_len: usize) -> Option<String> {
    let mut slug = String::with_capacity(value.len());
    let mut pending_dash = false;

    for c in value.to_lowercase().chars() {
        if c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '_' {
            if pending_dash {
                slug.push('-');
                pending_dash = false;
            }
            slug.push(c);
        } else {
            pending_dash = true;
        }
    }

    // Only ASCII survives above, so byte truncation is safe.
    let slug = trim_separators(&slug);
    let slug = trim_separators(&slug[..slug.len().min(max_len)]);
    (!slug.is_empty()).then(|| slug.to_string())
}

fn trim_separators(s: &str) -> &str {
    s.trim_matches(|c: char| c == '-' || c == '_')
}

fn id_suffix(id: &str) -> String {
    let mut hex = format!("{:x}", Sha256::digest(id.as_bytes()));
    hex.truncate(ID_SUFFIX_LEN);
    hex
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slugify_collapses_runs() {
        assert_eq!(
            slugify("  My Meeting: Q4 / Plan ", MAX_SLUG_LEN).as_deref(),
            Some("my-meeting-q4-plan")
        );
        assert_eq!(slugify("a___b--c", MAX_SLUG_LEN).as_deref(), Some("a___b--c"));
        assert_eq!(slugify("Ünïcødé ☕ Chat", MAX_SLUG_LEN).as_deref(), Some("n-c-d-chat"));
        assert_eq!(slugify("!!!", MAX_SLUG_LEN), None);
    }

    #[test]
    fn test_slugify_truncates_and_retrims() {
        let long = format!("{}-tail", "a".repeat(MAX_SLUG_LEN - 1));
        let slug = slugify(&long, MAX_SLUG_LEN).unwrap();
        assert_eq!(slug.len(), MAX_SLUG_LEN - 1);
        assert!(!slug.ends_with('-'));
    }

    #[test]
    fn test_sanitize_layout() {
        let name = sanitize("Q1 Planning", "2024-01-05", "x1");
        assert!(name.starts_with("2024-01-05_q1-planning_"));
        let suffix = name.rsplit('_').next().unwrap();
        assert_eq!(suffix.len(), 12);
        assert!(suffix.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_sanitize_is_deterministic() {
        assert_eq!(
            sanitize("Team Sync", "2024-12-01", "abc123"),
            sanitize("Team Sync", "2024-12-01", "abc123")
        );
    }

    #[test]
    fn test_identical_titles_with_distinct_ids_do_not_collide() {
        let ids = ["1", "2", "a/b", "a-b", "A-B", "a b", "m1", "M1"];
        let names: std::collections::HashSet<String> = ids
            .iter()
            .map(|id| sanitize("Standup", "2024-01-01", id))
            .collect();
        assert_eq!(names.len(), ids.len());
    }

    #[test]
    fn test_empty_title_and_date() {
        let name = sanitize("", "", "id");
        assert!(name.starts_with("undated_untitled_"));
    }

    #[test]
    fn test_filename_is_bounded() {
        let name = sanitize(&"word ".repeat(100), "2024-01-01", &"x".repeat(500));
        assert!(name.len() <= MAX_DATE_LEN + MAX_SLUG_LEN + ID_SUFFIX_LEN + 2);
    }
}

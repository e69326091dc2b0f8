//! Shared utility functions

/// Truncate a string to a maximum length, appending "..." if truncated.
/// Handles multi-byte characters by finding a valid char boundary.
pub fn truncate_str(s: &str, max_len: usize) -> String {
    if s.len() <= max_len {
        return s.to_string();
    }
    let suffix = "...";
    let target = max_len.saturating_sub(suffix.len());
    let mut end = target;
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}{}", &s[..end], suffix)
}

/// Last `/`-separated segment of a relative archive path.
pub fn base_name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

/// Split a file name into `(stem, extension)` on the last `.`.
///
/// The extension keeps its leading dot. Leading dots do not start an
/// extension, so `.profile` has none. Only the final extension is split off:
/// `a.tar.gz` yields `("a.tar", ".gz")`.
pub fn split_extension(name: &str) -> (&str, &str) {
    match name.rfind('.') {
        Some(idx) if name[..idx].chars().any(|c| c != '.') => name.split_at(idx),
        _ => (name, ""),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_str() {
        assert_eq!(truncate_str("short", 10), "short");
        assert_eq!(truncate_str("a much longer title", 10), "a much ...");
    }

    #[test]
    fn test_truncate_str_multibyte() {
        let s = "ééééééééé";
        let out = truncate_str(s, 8);
        assert!(out.ends_with("..."));
        assert!(out.len() <= 8);
    }

    #[test]
    fn test_base_name() {
        assert_eq!(base_name("vault/2019/abc/report.pdf"), "report.pdf");
        assert_eq!(base_name("report.pdf"), "report.pdf");
        assert_eq!(base_name("dir/"), "");
    }

    #[test]
    fn test_split_extension() {
        assert_eq!(split_extension("a.pdf"), ("a", ".pdf"));
        assert_eq!(split_extension("a.tar.gz"), ("a.tar", ".gz"));
        assert_eq!(split_extension("README"), ("README", ""));
        assert_eq!(split_extension(".profile"), (".profile", ""));
        assert_eq!(split_extension("..hidden.txt"), ("..hidden", ".txt"));
        assert_eq!(split_extension("trailing."), ("trailing", "."));
    }
}

/// Longest component most filesystems accept.
const MAX_COMPONENT_LEN: usize = 255;

/// Makes one path component safe for the local filesystem: invalid characters
/// become underscores, surrounding dots/spaces are trimmed, overlong names are
/// truncated keeping the extension.
pub fn sanitize_component(name: &str) -> String {
    let sanitized: String = name
        .chars()
        .map(|c| match c {
            '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*' => '_',
            c => c,
        })
        .collect();

    let mut sanitized = sanitized
        .trim_matches(|c| c == '.' || c == ' ')
        .to_string();

    if sanitized.chars().count() > MAX_COMPONENT_LEN {
        let ext = sanitized
            .rfind('.')
            .filter(|&i| i > 0)
            .map(|i| sanitized[i..].to_string())
            .unwrap_or_default();
        let budget = MAX_COMPONENT_LEN.saturating_sub(ext.chars().count());
        let stem: String = sanitized.chars().take(budget).collect();
        sanitized = format!("{stem}{ext}");
    }

    if sanitized.is_empty() {
        "unnamed_file".to_string()
    } else {
        sanitized
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_names_pass_through() {
        assert_eq!(sanitize_component("bracket.step"), "bracket.step");
        assert_eq!(sanitize_component("My Project"), "My Project");
    }

    #[test]
    fn test_invalid_characters_become_underscores() {
        assert_eq!(sanitize_component("a/b\\c:d"), "a_b_c_d");
        assert_eq!(sanitize_component("rev<2>?*|\"x\""), "rev_2_____x_");
    }

    #[test]
    fn test_trailing_dots_and_spaces_trimmed() {
        assert_eq!(sanitize_component("drawing. "), "drawing");
        assert_eq!(sanitize_component("  .hidden.  "), "hidden");
    }

    #[test]
    fn test_empty_result_falls_back() {
        assert_eq!(sanitize_component(""), "unnamed_file");
        assert_eq!(sanitize_component(" . "), "unnamed_file");
    }

    #[test]
    fn test_overlong_name_keeps_extension() {
        let long = format!("{}.step", "a".repeat(300));
        let sanitized = sanitize_component(&long);
        assert_eq!(sanitized.chars().count(), MAX_COMPONENT_LEN);
        assert!(sanitized.ends_with(".step"));
    }

    #[test]
    fn test_sanitization_is_deterministic() {
        assert_eq!(sanitize_component("a/b:c"), sanitize_component("a/b:c"));
    }
}

/// Track title -> safe export file name
pub const DEFAULT_BASE_NAME: &str = "tonictwo";
pub const MAX_BASE_NAME_CHARS: usize = 60;

fn is_kept(c: char) -> bool {
    c.is_alphabetic() || c.is_numeric() || c.is_whitespace() || c == '_' || c == '-'
}

/// Strip everything but letters, digits, whitespace, `_` and `-`, turn each
/// whitespace run into one `_` and cap the result at 60 characters.
pub fn safe_file_base_name(track_name: &str) -> String {
    let raw = track_name.trim();
    let base = if raw.is_empty() { DEFAULT_BASE_NAME } else { raw };

    let mut safe = String::with_capacity(base.len());
    let mut in_space = false;
    for c in base.chars().filter(|c| is_kept(*c)) {
        if c.is_whitespace() {
            if !in_space {
                safe.push('_');
            }
            in_space = true;
        } else {
            safe.push(c);
            in_space = false;
        }
    }

    let safe: String = safe.chars().take(MAX_BASE_NAME_CHARS).collect();
    if safe.is_empty() {
        DEFAULT_BASE_NAME.to_string()
    } else {
        safe
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strips_punctuation_and_trailing_space() {
        assert_eq!(safe_file_base_name("My Track!! "), "My_Track");
    }

    #[test]
    fn test_empty_uses_default() {
        assert_eq!(safe_file_base_name(""), "tonictwo");
        assert_eq!(safe_file_base_name("   "), "tonictwo");
        assert_eq!(safe_file_base_name("?!*"), "tonictwo");
    }

    #[test]
    fn test_collapses_whitespace_runs() {
        assert_eq!(safe_file_base_name("a  \t b"), "a_b");
        assert_eq!(safe_file_base_name("!! lead"), "_lead");
    }

    #[test]
    fn test_keeps_unicode_letters_and_separators() {
        assert_eq!(safe_file_base_name("Canción_1-b"), "Canción_1-b");
        assert_eq!(safe_file_base_name("日本 2"), "日本_2");
        assert_eq!(safe_file_base_name("../etc/passwd"), "etcpasswd");
    }

    #[test]
    fn test_keeps_alphabetic_combining_marks() {
        // Vowel signs are Alphabetic, so they stay; the virama is not and is dropped
        assert_eq!(safe_file_base_name("नमस्ते"), "नमसते");
    }

    #[test]
    fn test_truncates_to_sixty_chars() {
        let long = "x".repeat(75);
        let safe = safe_file_base_name(&long);
        assert_eq!(safe.chars().count(), 60);

        let accented = "é".repeat(61);
        assert_eq!(safe_file_base_name(&accented).chars().count(), 60);
    }
}

// ABOUTME: Utility functions for vault paths, slugging and log previews
// ABOUTME: Path cleanup runs before every vault call

pub fn slugify(text: &str) -> String {
    slug::slugify(text)
}

pub const LINK_ALIAS_MAX: usize = 80;

/// Text safe to use as a wiki-link alias: the first non-blank line, with
/// `|` and brackets removed, shortened to [`LINK_ALIAS_MAX`].
pub fn link_alias(text: &str) -> String {
    let line = text
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .unwrap_or_default();
    let cleaned: String = line
        .chars()
        .map(|c| if c == '|' { '-' } else { c })
        .filter(|c| !matches!(c, '[' | ']'))
        .collect();
    truncate_str(cleaned.trim(), LINK_ALIAS_MAX)
}

/// Shortens `s` to at most `max_chars` bytes on a char boundary, marking the cut.
pub fn truncate_str(s: &str, max_chars: usize) -> String {
    if s.len() <= max_chars {
        return s.to_string();
    }

    let mut boundary = max_chars;
    while boundary > 0 && !s.is_char_boundary(boundary) {
        boundary -= 1;
    }

    if boundary == 0 {
        return String::new();
    }

    format!("{}...", &s[..boundary])
}

/// Makes a rendered template usable as a vault path.
///
/// Colons become ` -`, backslashes become `/`, runs of separators collapse,
/// leading and trailing separators are stripped and non-breaking spaces are
/// replaced with plain spaces. An input that is only separators or
/// whitespace cleans to the empty string.
pub fn clean_path(path: &str) -> String {
    let replaced = path
        .trim()
        .replace(':', " -")
        .replace('\\', "/")
        .replace(['\u{00A0}', '\u{202F}'], " ");

    replaced
        .split('/')
        .filter(|segment| !segment.is_empty())
        .collect::<Vec<_>>()
        .join("/")
}

/// Folder component of a vault path, empty for files at the vault root.
pub fn parent_folder(path: &str) -> &str {
    match path.rfind('/') {
        Some(pos) => &path[..pos],
        None => "",
    }
}

use once_cell::sync::Lazy;
use regex::Regex;

static MARKDOWN_WRAPPER_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)^\s*<markdown>\r?\n?(.*?)\r?\n?</markdown>\s*$").expect("wrapper regex")
});

static FENCE_WRAPPER_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)^\s*```(?:markdown|md)\r?\n(.*?)\r?\n```\s*$").expect("fence regex")
});

// The backend is told to output bare markdown, but models occasionally echo the
// <markdown> wrapper back or enclose the whole document in a fence anyway.
pub fn strip_response_wrapper(text: &str) -> String {
    if let Some(caps) = MARKDOWN_WRAPPER_RE.captures(text) {
        return caps[1].to_string();
    }
    if let Some(caps) = FENCE_WRAPPER_RE.captures(text) {
        return caps[1].to_string();
    }
    text.to_string()
}

#[cfg(test)]
mod tests {
    use super::strip_response_wrapper;

    #[test]
    fn strips_echoed_markdown_wrapper() {
        let raw = "<markdown>\n# Hola\n\nMundo\n</markdown>";
        assert_eq!(strip_response_wrapper(raw), "# Hola\n\nMundo");
    }

    #[test]
    fn strips_enclosing_markdown_fence() {
        let raw = "```markdown\n# Hola\n```";
        assert_eq!(strip_response_wrapper(raw), "# Hola");
    }

    #[test]
    fn clean_output_passes_through() {
        let raw = "# Hola\n\nMundo\n";
        assert_eq!(strip_response_wrapper(raw), raw);
    }

    #[test]
    fn inner_fences_are_left_alone() {
        let raw = "intro\n\n```mermaid\nA --> B\n```\n\noutro\n";
        assert_eq!(strip_response_wrapper(raw), raw);
    }
}

use ammonia;

/// Clean HTML content using the ammonia library.
///
/// Whitelist-based: safe tags (like <b>, <p>) survive while dangerous tags
/// (like <script>, <iframe>) and malicious attributes (like onclick) are removed.
///
/// Applied to free text that is later rendered to other users: question prompts
/// and options, essay answers shown to graders, and grader feedback shown to students.
pub fn clean_html(input: &str) -> String {
    ammonia::clean(input)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_html_strips_scripts_keeps_text() {
        assert_eq!(clean_html("<b>Mitosis</b><script>alert(1)</script>"), "<b>Mitosis</b>");
        assert_eq!(clean_html("plain answer"), "plain answer");
    }
}

/// Flattens per-page extracted text into trimmed, lower-cased, non-empty lines.
/// Page order and in-page line order are preserved; page boundaries are not.
pub fn normalize<S: AsRef<str>>(pages: &[S]) -> Vec<String> {
    pages
        .iter()
        .flat_map(|page| page.as_ref().lines())
        .map(|line| line.trim().to_lowercase())
        .filter(|line| !line.is_empty())
        .collect()
}

/// Returns true if any line contains `keyword` as a substring.
pub fn contains_keyword(lines: &[String], keyword: &str) -> bool {
    let keyword = keyword.to_lowercase();
    lines.iter().any(|line| line.contains(&keyword))
}

#[cfg(test)]
mod tests {
    use super::{contains_keyword, normalize};

    #[test]
    fn drops_blank_lines_and_keeps_page_order() {
        let lines = normalize(&["Line1\n\nLine2", "  Line3  "]);
        assert_eq!(lines, vec!["line1", "line2", "line3"]);
    }

    #[test]
    fn empty_input_yields_nothing() {
        let pages: [&str; 0] = [];
        assert!(normalize(&pages).is_empty());
        assert!(normalize(&["", "   \n\t\n"]).is_empty());
    }

    #[test]
    fn handles_crlf_and_inner_whitespace() {
        let lines = normalize(&["  M A R C H \r\n\r\n  Tsukemen  Bowl\r\n"]);
        assert_eq!(lines, vec!["m a r c h", "tsukemen  bowl"]);
    }

    #[test]
    fn keeps_duplicates() {
        let lines = normalize(&["a\na", "a"]);
        assert_eq!(lines.len(), 3);
    }

    #[test]
    fn keyword_is_a_substring_match() {
        let lines = normalize(&["Spicy Tsukemen (limited)", "shoyu"]);
        assert!(contains_keyword(&lines, "tsukemen"));
        assert!(contains_keyword(&lines, "Tsukemen"));
        assert!(!contains_keyword(&lines, "miso"));
    }
}

//! CamelCase/snake_case-aware tokenizer (spec.md §4.1). Deterministic and
//! total: every `&str` produces some (possibly empty) token sequence.

/// Split `text` into lowercase alphanumeric tokens.
///
/// Rules: a word break is inserted at every lowercase→uppercase transition;
/// `_` and `-` are treated as whitespace; the result is the maximal
/// alphanumeric runs between breaks, lowercased.
pub fn normalize(text: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut prev_lower = false;

    let flush = |current: &mut String, tokens: &mut Vec<String>| {
        if !current.is_empty() {
            tokens.push(std::mem::take(current).to_lowercase());
        }
    };

    for c in text.chars() {
        if c == '_' || c == '-' {
            flush(&mut current, &mut tokens);
            prev_lower = false;
            continue;
        }
        if !c.is_alphanumeric() {
            flush(&mut current, &mut tokens);
            prev_lower = false;
            continue;
        }
        if prev_lower && c.is_uppercase() {
            flush(&mut current, &mut tokens);
        }
        prev_lower = c.is_lowercase();
        current.push(c);
    }
    flush(&mut current, &mut tokens);
    tokens
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_user_by_id() {
        assert_eq!(normalize("getUserById"), vec!["get", "user", "by", "id"]);
    }

    #[test]
    fn parse_html_v2() {
        assert_eq!(normalize("parseHTML_v2"), vec!["parse", "html", "v2"]);
    }

    #[test]
    fn camel_case_word() {
        assert_eq!(normalize("camelCase_word"), vec!["camel", "case", "word"]);
    }

    #[test]
    fn idempotent_on_joined_output() {
        let once = normalize("camelCase_word");
        let joined = once.join(" ");
        let twice = normalize(&joined);
        assert_eq!(once, twice);
    }

    #[test]
    fn empty_and_punctuation_only() {
        assert!(normalize("").is_empty());
        assert!(normalize("___---...").is_empty());
    }

    #[test]
    fn hyphenated_and_whitespace_are_separators() {
        assert_eq!(normalize("foo-bar baz"), vec!["foo", "bar", "baz"]);
    }
}

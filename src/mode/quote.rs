//! Quoting helpers shared by the dialects.

use regex::Regex;
use std::sync::LazyLock;

/// Words made only of these characters are safe unquoted in every dialect.
static SIMPLE_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[\w\-/]+$").expect("valid simple-word pattern"));

pub fn is_simple(value: &str) -> bool {
    SIMPLE_PATTERN.is_match(value)
}

/// Wrap `value` in `quote_char`, backslash-escaping every char in `bad_chars`.
pub fn escape_quoted(value: &str, quote_char: char, bad_chars: &[char]) -> String {
    debug_assert!(bad_chars.contains(&'\\'));
    debug_assert!(bad_chars.contains(&quote_char));

    let mut res = String::with_capacity(value.len() + 2);
    res.push(quote_char);
    for c in value.chars() {
        if bad_chars.contains(&c) {
            res.push('\\');
        }
        res.push(c);
    }
    res.push(quote_char);
    res
}

/// Leave simple words alone, quote everything else.
pub fn quote_word(value: &str, quote_char: char, bad_chars: &[char]) -> String {
    if is_simple(value) {
        value.to_string()
    } else {
        escape_quoted(value, quote_char, bad_chars)
    }
}

/// Python string literal, following the rules of `repr(str)`.
pub fn python_literal(value: &str) -> String {
    let quote = if value.contains('\'') && !value.contains('"') {
        '"'
    } else {
        '\''
    };

    let mut res = String::with_capacity(value.len() + 2);
    res.push(quote);
    for c in value.chars() {
        match c {
            '\\' => res.push_str("\\\\"),
            '\n' => res.push_str("\\n"),
            '\r' => res.push_str("\\r"),
            '\t' => res.push_str("\\t"),
            c if c == quote => {
                res.push('\\');
                res.push(c);
            }
            c if (c as u32) < 0x20 || ((c as u32) >= 0x7f && (c as u32) <= 0xa0) => {
                res.push_str(&format!("\\x{:02x}", c as u32));
            }
            c => res.push(c),
        }
    }
    res.push(quote);
    res
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("/usr/bin", true)]
    #[case("kitty-ssh", true)]
    #[case("snake_case9", true)]
    #[case("hello world", false)]
    #[case("~/bin", false)]
    #[case("", false)]
    #[case("a.b", false)]
    fn simple_words(#[case] value: &str, #[case] simple: bool) {
        assert_eq!(is_simple(value), simple);
    }

    #[test]
    fn escapes_only_bad_chars() {
        assert_eq!(
            escape_quoted(r#"say "hi" \o/"#, '"', &['"', '\\']),
            r#""say \"hi\" \\o/""#
        );
    }

    #[test]
    fn quote_word_keeps_simple_words() {
        assert_eq!(quote_word("/usr/bin", '\'', &['\'', '\\']), "/usr/bin");
        assert_eq!(quote_word("it's", '\'', &['\'', '\\']), r"'it\'s'");
    }

    #[rstest]
    #[case("plain", "'plain'")]
    #[case("it's", "\"it's\"")]
    #[case("both ' and \"", "'both \\' and \"'")]
    #[case("tab\there", "'tab\\there'")]
    #[case("esc\x1b[0m", "'esc\\x1b[0m'")]
    #[case("back\\slash", "'back\\\\slash'")]
    fn python_literals(#[case] value: &str, #[case] expected: &str) {
        assert_eq!(python_literal(value), expected);
    }
}

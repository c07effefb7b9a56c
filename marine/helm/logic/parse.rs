//! Top-level splitting of condition text. Scanning skips quoted text and
//! tracks parenthesis depth; operators are ASCII so byte offsets are always
//! valid slice boundaries.

use once_cell::sync::Lazy;
use regex::Regex;

use super::node::Relation;

static VARIABLE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_.]*$").expect("variable pattern"));
static RIGHT_VARIABLE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\$\(\s*([A-Za-z_][A-Za-z0-9_.]*)\s*\)$").expect("reference pattern")
});
static BARE_LITERAL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"^[^\s()=<>!"$]+$"#).expect("literal pattern"));

/// Logical connective joining parenthesized operands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Connective {
    And,
    Or,
}

/// Classified leaf token.
#[derive(Debug, Clone, PartialEq)]
pub enum Leaf {
    Variable(String),
    Number(f64),
    Literal(String),
}

fn closing_paren(bytes: &[u8], open: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut quoted = false;
    for (offset, byte) in bytes.iter().enumerate().skip(open) {
        match byte {
            b'"' => quoted = !quoted,
            b'(' if !quoted => depth += 1,
            b')' if !quoted => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(offset);
                }
            }
            _ => {}
        }
    }
    None
}

/// Whether the whole text is wrapped in one pair of parentheses.
pub fn is_global_parens(text: &str) -> bool {
    let text = text.trim();
    text.starts_with('(') && closing_paren(text.as_bytes(), 0) == Some(text.len() - 1)
}

/// Removes any number of enclosing parenthesis pairs.
pub fn strip_global_parens(text: &str) -> &str {
    let mut text = text.trim();
    while is_global_parens(text) {
        text = text[1..text.len() - 1].trim();
    }
    text
}

/// Body following a leading `not` keyword, if present.
pub fn strip_not(text: &str) -> Option<&str> {
    let text = text.trim();
    let head = text.get(..3)?;
    if !head.eq_ignore_ascii_case("not") {
        return None;
    }
    let rest = &text[3..];
    match rest.bytes().next() {
        Some(byte) if byte.is_ascii_whitespace() || byte == b'(' => Some(rest.trim()),
        _ => None,
    }
}

/// Whether the text is `not (...)`.
pub fn is_global_not_parens(text: &str) -> bool {
    strip_not(text).is_some_and(is_global_parens)
}

fn word_at(bytes: &[u8], at: usize, word: &str) -> bool {
    let end = at + word.len();
    if end > bytes.len() || !bytes[at..end].eq_ignore_ascii_case(word.as_bytes()) {
        return false;
    }
    let before_ok = at == 0 || bytes[at - 1].is_ascii_whitespace() || bytes[at - 1] == b')';
    let after_ok = end == bytes.len() || bytes[end].is_ascii_whitespace() || bytes[end] == b'(';
    before_ok && after_ok
}

/// Splits at every top-level `and`/`or`. Returns `Ok(None)` when the text
/// has no top-level connective and an error when both kinds appear.
pub fn split_connective(text: &str) -> Result<Option<(Connective, Vec<&str>)>, String> {
    let bytes = text.as_bytes();
    let mut depth = 0usize;
    let mut quoted = false;
    let mut found: Option<Connective> = None;
    let mut pieces = Vec::new();
    let mut start = 0;
    let mut at = 0;
    while at < bytes.len() {
        match bytes[at] {
            b'"' => quoted = !quoted,
            b'(' if !quoted => depth += 1,
            b')' if !quoted => depth = depth.saturating_sub(1),
            _ if quoted || depth > 0 => {}
            _ => {
                let hit = if word_at(bytes, at, "and") {
                    Some((Connective::And, 3))
                } else if word_at(bytes, at, "or") {
                    Some((Connective::Or, 2))
                } else {
                    None
                };
                if let Some((connective, width)) = hit {
                    if found.is_some_and(|seen| seen != connective) {
                        return Err("mixed and/or at one level needs parentheses".into());
                    }
                    found = Some(connective);
                    pieces.push(text[start..at].trim());
                    start = at + width;
                    at = start;
                    continue;
                }
            }
        }
        at += 1;
    }
    Ok(found.map(|connective| {
        pieces.push(text[start..].trim());
        (connective, pieces)
    }))
}

/// Splits a comparison at its first top-level relational operator.
pub fn split_relation(text: &str) -> Option<(Relation, &str, &str)> {
    let bytes = text.as_bytes();
    let mut depth = 0usize;
    let mut quoted = false;
    for at in 0..bytes.len() {
        match bytes[at] {
            b'"' => quoted = !quoted,
            b'(' if !quoted => depth += 1,
            b')' if !quoted => depth = depth.saturating_sub(1),
            _ if quoted || depth > 0 => {}
            _ => {
                for (symbol, relation) in Relation::SYMBOLS {
                    if bytes[at..].starts_with(symbol.as_bytes()) {
                        let right = &text[at + symbol.len()..];
                        return Some((relation, text[..at].trim(), right.trim()));
                    }
                }
            }
        }
    }
    None
}

/// Classifies the left side of a comparison, which must name a variable.
pub fn left_leaf(token: &str) -> Option<Leaf> {
    VARIABLE
        .is_match(token)
        .then(|| Leaf::Variable(token.to_string()))
}

/// Classifies the right side of a comparison.
pub fn right_leaf(token: &str) -> Option<Leaf> {
    if let Some(captures) = RIGHT_VARIABLE.captures(token) {
        return Some(Leaf::Variable(captures[1].to_string()));
    }
    if let Ok(value) = token.parse::<f64>() {
        if value.is_finite() {
            return Some(Leaf::Number(value));
        }
    }
    let quoted = token.len() >= 2
        && token.starts_with('"')
        && token.ends_with('"')
        && !token[1..token.len() - 1].contains('"');
    if quoted || BARE_LITERAL.is_match(token) {
        return Some(Leaf::Literal(token.to_string()));
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn global_parens_require_single_outer_pair() {
        assert!(is_global_parens("(a=1)"));
        assert!(is_global_parens(" ((a=1)) "));
        assert!(!is_global_parens("(a=1) and (b=2)"));
        assert_eq!(strip_global_parens("((a = 1))"), "a = 1");
    }

    #[test]
    fn parens_inside_quotes_are_ignored() {
        assert!(is_global_parens("(a=\")\")"));
    }

    #[test]
    fn splits_same_connective_chain() {
        let (connective, pieces) = split_connective("(a=1) AND (b=2) and (c=3)")
            .unwrap()
            .unwrap();
        assert_eq!(connective, Connective::And);
        assert_eq!(pieces, vec!["(a=1)", "(b=2)", "(c=3)"]);
        assert!(split_connective("(a=1) and (b=2) or (c=3)").is_err());
        assert!(split_connective("brand=android").unwrap().is_none());
    }

    #[test]
    fn relation_split_prefers_two_char_ops() {
        let (relation, left, right) = split_relation("SPEED >= 2.0").unwrap();
        assert_eq!(relation, Relation::Ge);
        assert_eq!((left, right), ("SPEED", "2.0"));
        let (relation, _, right) = split_relation("A == $(B)").unwrap();
        assert_eq!(relation, Relation::Eq);
        assert_eq!(right, "$(B)");
    }

    #[test]
    fn relation_split_skips_multibyte_text() {
        let (relation, left, right) = split_relation("DÉPTH = 1").unwrap();
        assert_eq!(relation, Relation::Eq);
        assert_eq!((left, right), ("DÉPTH", "1"));
        assert!(split_relation("café").is_none());
        assert!(left_leaf("DÉPTH").is_none());
    }

    #[test]
    fn classifies_leaves() {
        assert_eq!(right_leaf("$(DEPTH)"), Some(Leaf::Variable("DEPTH".into())));
        assert_eq!(right_leaf("2.5"), Some(Leaf::Number(2.5)));
        assert_eq!(right_leaf("\"two words\""), Some(Leaf::Literal("\"two words\"".into())));
        assert_eq!(right_leaf("active"), Some(Leaf::Literal("active".into())));
        assert_eq!(right_leaf("two words"), None);
        assert_eq!(left_leaf("3abc"), None);
        assert!(strip_not("not (a=1)").is_some());
        assert!(strip_not("nothing=1").is_none());
    }
}

use serde::{Deserialize, Serialize};

/// Which characters may appear inside a tag name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TagSyntax {
    /// Letters and digits only; anything else separates tags.
    #[default]
    Alphanumeric,
    /// Letters, digits and ASCII punctuation. Whitespace and `,` separate tags.
    Punctuated,
}

impl TagSyntax {
    fn is_tag_char(self, c: char) -> bool {
        match self {
            TagSyntax::Alphanumeric => c.is_alphanumeric(),
            TagSyntax::Punctuated => c.is_alphanumeric() || (c.is_ascii_punctuation() && c != ','),
        }
    }
}

/// Splits free-form tag input into tag names.
///
/// Empty tokens are dropped. Order of first appearance is kept and repeated
/// names collapse onto their first occurrence. Names are case-sensitive.
pub fn normalize(raw: &str, syntax: TagSyntax) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for token in raw.split(|c: char| !syntax.is_tag_char(c)) {
        if token.is_empty() || names.iter().any(|n| n == token) {
            continue;
        }
        names.push(token.to_string());
    }
    names
}

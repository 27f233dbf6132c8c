//! Tokenizer shared by every expression dialect.
//!
//! The lexer never fails: characters it does not understand become
//! [`Token::Unknown`] and the parser reports them as syntax errors. Whitespace
//! runs are kept as their own segments because syntax-error messages quote the
//! source two segments either side of the offending token.

use std::ops::Range;

/// A lexical token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    /// A bare attribute or function name.
    Identifier(String),
    /// `#name`, kept with its prefix.
    NamePlaceholder(String),
    /// `:value`, kept with its prefix.
    ValuePlaceholder(String),
    /// A run of decimal digits.
    Number(String),
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Plus,
    Minus,
    Dot,
    Comma,
    LParen,
    RParen,
    LBracket,
    RBracket,
    And,
    Or,
    Not,
    Between,
    In,
    Set,
    Remove,
    Add,
    Delete,
    /// A character no dialect accepts.
    Unknown(String),
    /// End of input.
    Eof,
}

impl Token {
    /// Returns `true` for the comparison operators.
    #[must_use]
    pub fn is_comparator(&self) -> bool {
        matches!(
            self,
            Self::Eq | Self::Ne | Self::Lt | Self::Le | Self::Gt | Self::Ge
        )
    }

    /// Returns `true` for the update clause keywords.
    #[must_use]
    pub fn is_clause_keyword(&self) -> bool {
        matches!(self, Self::Set | Self::Remove | Self::Add | Self::Delete)
    }
}

/// A slice of the source: either a token or a whitespace run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    /// `None` for whitespace.
    pub token: Option<Token>,
    /// Byte range in the source.
    pub span: Range<usize>,
}

/// The lexed form of an expression.
#[derive(Debug, Clone)]
pub struct TokenStream<'a> {
    source: &'a str,
    segments: Vec<Segment>,
    /// Segment index of each non-whitespace token, ending with `Eof`.
    tokens: Vec<usize>,
}

impl<'a> TokenStream<'a> {
    /// Tokenize `source`.
    #[must_use]
    pub fn new(source: &'a str) -> Self {
        let mut segments = Vec::new();
        let bytes = source.as_bytes();
        let mut pos = 0;

        while pos < bytes.len() {
            let start = pos;
            let c = bytes[pos];
            let token = if c.is_ascii_whitespace() {
                pos = scan_while(bytes, pos, |b| b.is_ascii_whitespace());
                None
            } else if c == b'#' || c == b':' {
                let end = scan_while(bytes, pos + 1, is_ident_continue);
                if end == pos + 1 {
                    pos += 1;
                    Some(Token::Unknown(char::from(c).to_string()))
                } else {
                    pos = end;
                    let text = source[start..end].to_owned();
                    Some(if c == b'#' {
                        Token::NamePlaceholder(text)
                    } else {
                        Token::ValuePlaceholder(text)
                    })
                }
            } else if c.is_ascii_digit() {
                pos = scan_while(bytes, pos, |b| b.is_ascii_digit());
                Some(Token::Number(source[start..pos].to_owned()))
            } else if is_ident_start(c) {
                pos = scan_while(bytes, pos, is_ident_continue);
                Some(keyword_or_identifier(&source[start..pos]))
            } else if let Some((token, len)) = punctuation(&bytes[pos..]) {
                pos += len;
                Some(token)
            } else {
                let ch = source[pos..].chars().next().unwrap_or('?');
                pos += ch.len_utf8();
                Some(Token::Unknown(ch.to_string()))
            };
            segments.push(Segment {
                token,
                span: start..pos,
            });
        }

        segments.push(Segment {
            token: Some(Token::Eof),
            span: source.len()..source.len(),
        });

        let tokens = segments
            .iter()
            .enumerate()
            .filter(|(_, s)| s.token.is_some())
            .map(|(i, _)| i)
            .collect();

        Self {
            source,
            segments,
            tokens,
        }
    }

    /// Number of tokens including the trailing `Eof`.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    /// Returns `true` when the source holds nothing but whitespace.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tokens.len() == 1
    }

    /// The token at position `idx`, `Eof` past the end.
    #[must_use]
    pub fn token(&self, idx: usize) -> &Token {
        self.tokens
            .get(idx)
            .and_then(|&seg| self.segments[seg].token.as_ref())
            .unwrap_or(&Token::Eof)
    }

    /// Returns `true` if whitespace separates token `idx` from the one before it.
    #[must_use]
    pub fn preceded_by_whitespace(&self, idx: usize) -> bool {
        self.tokens
            .get(idx)
            .is_some_and(|&seg| seg > 0 && self.segments[seg - 1].token.is_none())
    }

    /// Source text of token `idx`, `<EOF>` for the end marker.
    #[must_use]
    pub fn text(&self, idx: usize) -> String {
        match self.token(idx) {
            Token::Eof => "<EOF>".to_owned(),
            _ => self
                .tokens
                .get(idx)
                .map(|&seg| self.source[self.segments[seg].span.clone()].to_owned())
                .unwrap_or_default(),
        }
    }

    /// Source text from two segments before token `idx` to two segments after it.
    #[must_use]
    pub fn near(&self, idx: usize) -> String {
        let seg = self
            .tokens
            .get(idx)
            .copied()
            .unwrap_or(self.segments.len() - 1);
        let first = seg.saturating_sub(2);
        let last = (seg + 2).min(self.segments.len() - 1);
        let start = self.segments[first].span.start;
        let end = self.segments[last].span.end;
        self.source[start..end].to_owned()
    }
}

fn scan_while(bytes: &[u8], mut pos: usize, pred: impl Fn(u8) -> bool) -> usize {
    while pos < bytes.len() && pred(bytes[pos]) {
        pos += 1;
    }
    pos
}

fn is_ident_start(b: u8) -> bool {
    b.is_ascii_alphabetic() || b == b'_'
}

fn is_ident_continue(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

fn keyword_or_identifier(word: &str) -> Token {
    match word.to_ascii_uppercase().as_str() {
        "AND" => Token::And,
        "OR" => Token::Or,
        "NOT" => Token::Not,
        "BETWEEN" => Token::Between,
        "IN" => Token::In,
        "SET" => Token::Set,
        "REMOVE" => Token::Remove,
        "ADD" => Token::Add,
        "DELETE" => Token::Delete,
        _ => Token::Identifier(word.to_owned()),
    }
}

fn punctuation(rest: &[u8]) -> Option<(Token, usize)> {
    let token = match rest {
        [b'<', b'>', ..] => return Some((Token::Ne, 2)),
        [b'<', b'=', ..] => return Some((Token::Le, 2)),
        [b'>', b'=', ..] => return Some((Token::Ge, 2)),
        [b'=', ..] => Token::Eq,
        [b'<', ..] => Token::Lt,
        [b'>', ..] => Token::Gt,
        [b'+', ..] => Token::Plus,
        [b'-', ..] => Token::Minus,
        [b'.', ..] => Token::Dot,
        [b',', ..] => Token::Comma,
        [b'(', ..] => Token::LParen,
        [b')', ..] => Token::RParen,
        [b'[', ..] => Token::LBracket,
        [b']', ..] => Token::RBracket,
        _ => return None,
    };
    Some((token, 1))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<Token> {
        let stream = TokenStream::new(source);
        (0..stream.len()).map(|i| stream.token(i).clone()).collect()
    }

    #[test]
    fn test_should_lex_keywords_case_insensitively() {
        assert_eq!(
            kinds("a and B Or not c"),
            vec![
                Token::Identifier("a".to_owned()),
                Token::And,
                Token::Identifier("B".to_owned()),
                Token::Or,
                Token::Not,
                Token::Identifier("c".to_owned()),
                Token::Eof,
            ]
        );
    }

    #[test]
    fn test_should_lex_placeholders_and_operators() {
        assert_eq!(
            kinds("#n<>:v<=x[12]"),
            vec![
                Token::NamePlaceholder("#n".to_owned()),
                Token::Ne,
                Token::ValuePlaceholder(":v".to_owned()),
                Token::Le,
                Token::Identifier("x".to_owned()),
                Token::LBracket,
                Token::Number("12".to_owned()),
                Token::RBracket,
                Token::Eof,
            ]
        );
    }

    #[test]
    fn test_should_turn_stray_characters_into_unknown_tokens() {
        assert_eq!(
            kinds("a ! b"),
            vec![
                Token::Identifier("a".to_owned()),
                Token::Unknown("!".to_owned()),
                Token::Identifier("b".to_owned()),
                Token::Eof,
            ]
        );
        assert_eq!(kinds("#")[0], Token::Unknown("#".to_owned()));
    }

    #[test]
    fn test_should_quote_two_segments_each_side() {
        let stream = TokenStream::new("SET MyStr = myNum + 1");
        let idx = (0..stream.len())
            .find(|&i| *stream.token(i) == Token::Number("1".to_owned()))
            .unwrap();
        assert_eq!(stream.text(idx), "1");
        assert_eq!(stream.near(idx), "+ 1");

        let stream = TokenStream::new("SET MyStr = myNum Mystr2 myNum2");
        assert_eq!(stream.text(4), "Mystr2");
        assert_eq!(stream.near(4), "myNum Mystr2 myNum2");
    }

    #[test]
    fn test_should_render_eof_marker() {
        let stream = TokenStream::new("a =");
        assert_eq!(stream.text(2), "<EOF>");
        assert_eq!(stream.near(2), " =");
        assert!(TokenStream::new("   ").is_empty());
    }
}

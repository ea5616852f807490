//! Query Tokenizer
//!
//! Splits query text into words, quoted text and the separators `= , ; ( )`.
//! Every token remembers its character position for error reporting.

use nom::{
    branch::alt,
    bytes::complete::{take_while, take_while1},
    character::complete::{char, one_of},
    combinator::map,
    sequence::delimited,
    IResult,
};

use crate::query::error::{QueryError, QueryResult};

const SEPARATORS: &str = "=,;()";

/// Kind of token
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenKind {
    /// Run of non-separator, non-whitespace characters
    Word(String),
    /// Text between single quotes, without the quotes
    Quoted(String),
    /// One of `= , ; ( )`
    Separator(char),
}

/// A token with its character position
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub position: usize,
}

impl Token {
    /// Whether this is the given keyword, ignoring case
    pub fn is_keyword(&self, keyword: &str) -> bool {
        matches!(&self.kind, TokenKind::Word(w) if w.eq_ignore_ascii_case(keyword))
    }

    /// Whether this is the given separator
    pub fn is_separator(&self, separator: char) -> bool {
        self.kind == TokenKind::Separator(separator)
    }

    /// Word text, if this is a word
    pub fn word(&self) -> Option<&str> {
        match &self.kind {
            TokenKind::Word(w) => Some(w),
            _ => None,
        }
    }

    /// Text as written, for messages
    pub fn text(&self) -> String {
        match &self.kind {
            TokenKind::Word(w) => w.clone(),
            TokenKind::Quoted(q) => format!("'{}'", q),
            TokenKind::Separator(c) => c.to_string(),
        }
    }
}

fn separator(input: &str) -> IResult<&str, TokenKind> {
    map(one_of(SEPARATORS), TokenKind::Separator)(input)
}

fn quoted(input: &str) -> IResult<&str, TokenKind> {
    map(
        delimited(char('\''), take_while(|c| c != '\''), char('\'')),
        |text: &str| TokenKind::Quoted(text.to_string()),
    )(input)
}

fn word(input: &str) -> IResult<&str, TokenKind> {
    map(
        take_while1(|c: char| !c.is_whitespace() && c != '\'' && !SEPARATORS.contains(c)),
        |text: &str| TokenKind::Word(text.to_string()),
    )(input)
}

/// Split query text into tokens
pub fn tokenize(text: &str) -> QueryResult<Vec<Token>> {
    let mut tokens = Vec::new();
    let mut rest = text.trim_start();

    while !rest.is_empty() {
        let position = text[..text.len() - rest.len()].chars().count();
        match alt((separator, quoted, word))(rest) {
            Ok((remaining, kind)) => {
                tokens.push(Token { kind, position });
                rest = remaining.trim_start();
            }
            Err(_) if rest.starts_with('\'') => {
                return Err(QueryError::syntax("unterminated quoted text", position));
            }
            Err(_) => {
                return Err(QueryError::syntax("unexpected character", position));
            }
        }
    }

    Ok(tokens)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(text: &str) -> Vec<TokenKind> {
        tokenize(text).unwrap().into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn test_tokenize_query() {
        assert_eq!(
            kinds("SELECT COUNT(*) FROM a.B WHERE x='y z'"),
            vec![
                TokenKind::Word("SELECT".into()),
                TokenKind::Word("COUNT".into()),
                TokenKind::Separator('('),
                TokenKind::Word("*".into()),
                TokenKind::Separator(')'),
                TokenKind::Word("FROM".into()),
                TokenKind::Word("a.B".into()),
                TokenKind::Word("WHERE".into()),
                TokenKind::Word("x".into()),
                TokenKind::Separator('='),
                TokenKind::Quoted("y z".into()),
            ]
        );
    }

    #[test]
    fn test_positions() {
        let tokens = tokenize("  SELECT  a,b").unwrap();
        let positions: Vec<usize> = tokens.iter().map(|t| t.position).collect();
        assert_eq!(positions, vec![2, 10, 11, 12]);
    }

    #[test]
    fn test_positions_count_characters() {
        let tokens = tokenize("'é' x").unwrap();
        assert_eq!(tokens[1].position, 4);
    }

    #[test]
    fn test_unterminated_quote() {
        let err = tokenize("COLUMN 'abc").unwrap_err();
        assert_eq!(err.position(), Some(7));
    }

    #[test]
    fn test_keyword_match() {
        let tokens = tokenize("select").unwrap();
        assert!(tokens[0].is_keyword("SELECT"));
        assert!(!tokens[0].is_separator('='));
        assert_eq!(tokens[0].word(), Some("select"));
    }
}

//! Lexical analysis for problem expressions.
//!
//! Built on logos. Whitespace is skipped. There is no comment syntax, so a
//! `#` is a lex error like any other stray character.

use std::fmt;

use logos::Logos;

use crate::error::{CvxError, Result, Span};

#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t\r\n\f]+")]
enum RawToken {
    #[regex(r"[0-9]+(\.[0-9]*)?([eE][+-]?[0-9]+)?", |lex| lex.slice().parse::<f64>().ok())]
    #[regex(r"\.[0-9]+([eE][+-]?[0-9]+)?", |lex| lex.slice().parse::<f64>().ok())]
    Number(f64),

    #[regex(r"[A-Za-z_][A-Za-z0-9_]*", |lex| lex.slice().to_owned())]
    Ident(String),

    #[token("+")]
    Plus,
    #[token("-")]
    Minus,
    #[token("*")]
    Star,
    #[token("**")]
    Pow,
    #[token("/")]
    Slash,
    #[token("@")]
    At,
    #[token("==")]
    EqEq,
    #[token("<=")]
    Le,
    #[token(">=")]
    Ge,
    #[token("<")]
    Lt,
    #[token(">")]
    Gt,

    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token("[")]
    LBracket,
    #[token("]")]
    RBracket,
    #[token(",")]
    Comma,
    #[token(":")]
    Colon,
}

/// Operator tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    Plus,
    Minus,
    Star,
    Pow,
    Slash,
    At,
    EqEq,
    Le,
    Ge,
    Lt,
    Gt,
}

impl Operator {
    pub fn as_str(self) -> &'static str {
        match self {
            Operator::Plus => "+",
            Operator::Minus => "-",
            Operator::Star => "*",
            Operator::Pow => "**",
            Operator::Slash => "/",
            Operator::At => "@",
            Operator::EqEq => "==",
            Operator::Le => "<=",
            Operator::Ge => ">=",
            Operator::Lt => "<",
            Operator::Gt => ">",
        }
    }

    /// `==`, `<=`, `>=`, `<` or `>`.
    pub fn is_relational(self) -> bool {
        matches!(
            self,
            Operator::EqEq | Operator::Le | Operator::Ge | Operator::Lt | Operator::Gt
        )
    }
}

/// Delimiter tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Delimiter {
    LParen,
    RParen,
    LBracket,
    RBracket,
    Comma,
    Colon,
}

impl Delimiter {
    pub fn as_str(self) -> &'static str {
        match self {
            Delimiter::LParen => "(",
            Delimiter::RParen => ")",
            Delimiter::LBracket => "[",
            Delimiter::RBracket => "]",
            Delimiter::Comma => ",",
            Delimiter::Colon => ":",
        }
    }
}

/// Token classes: NUMBER, IDENTIFIER, OPERATOR, DELIMITER and END.
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Number(f64),
    Ident(String),
    Op(Operator),
    Delim(Delimiter),
    End,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Number(v) => write!(f, "number `{v}`"),
            Token::Ident(name) => write!(f, "identifier `{name}`"),
            Token::Op(op) => write!(f, "`{}`", op.as_str()),
            Token::Delim(d) => write!(f, "`{}`", d.as_str()),
            Token::End => write!(f, "end of input"),
        }
    }
}

impl From<RawToken> for Token {
    fn from(raw: RawToken) -> Self {
        match raw {
            RawToken::Number(v) => Token::Number(v),
            RawToken::Ident(name) => Token::Ident(name),
            RawToken::Plus => Token::Op(Operator::Plus),
            RawToken::Minus => Token::Op(Operator::Minus),
            RawToken::Star => Token::Op(Operator::Star),
            RawToken::Pow => Token::Op(Operator::Pow),
            RawToken::Slash => Token::Op(Operator::Slash),
            RawToken::At => Token::Op(Operator::At),
            RawToken::EqEq => Token::Op(Operator::EqEq),
            RawToken::Le => Token::Op(Operator::Le),
            RawToken::Ge => Token::Op(Operator::Ge),
            RawToken::Lt => Token::Op(Operator::Lt),
            RawToken::Gt => Token::Op(Operator::Gt),
            RawToken::LParen => Token::Delim(Delimiter::LParen),
            RawToken::RParen => Token::Delim(Delimiter::RParen),
            RawToken::LBracket => Token::Delim(Delimiter::LBracket),
            RawToken::RBracket => Token::Delim(Delimiter::RBracket),
            RawToken::Comma => Token::Delim(Delimiter::Comma),
            RawToken::Colon => Token::Delim(Delimiter::Colon),
        }
    }
}

/// A token with its byte span.
#[derive(Debug, Clone, PartialEq)]
pub struct Lexeme {
    pub token: Token,
    pub span: Span,
}

/// Lazy token iterator over one source fragment.
///
/// Yields exactly one [`Token::End`] and then stops. A lex error is yielded
/// once and also ends the sequence. [`Lexer::restart`] rewinds to the start.
#[derive(Clone)]
pub struct Lexer<'src> {
    source: &'src str,
    inner: logos::Lexer<'src, RawToken>,
    finished: bool,
}

impl<'src> Lexer<'src> {
    pub fn new(source: &'src str) -> Self {
        Lexer {
            source,
            inner: RawToken::lexer(source),
            finished: false,
        }
    }

    pub fn source(&self) -> &'src str {
        self.source
    }

    /// Rewind to the beginning of the source.
    pub fn restart(&mut self) {
        self.inner = RawToken::lexer(self.source);
        self.finished = false;
    }
}

impl Iterator for Lexer<'_> {
    type Item = Result<Lexeme>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        match self.inner.next() {
            Some(Ok(raw)) => {
                let range = self.inner.span();
                Some(Ok(Lexeme {
                    token: raw.into(),
                    span: Span::new(range.start, range.end),
                }))
            }
            Some(Err(())) => {
                self.finished = true;
                let offset = self.inner.span().start;
                let found = self.source[offset..].chars().next().unwrap_or('\0');
                Some(Err(CvxError::Lex { offset, found }))
            }
            None => {
                self.finished = true;
                let end = self.source.len();
                Some(Ok(Lexeme {
                    token: Token::End,
                    span: Span::new(end, end),
                }))
            }
        }
    }
}

/// Tokenize a whole fragment, ending with [`Token::End`].
pub fn tokenize(source: &str) -> Result<Vec<Lexeme>> {
    Lexer::new(source).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(source: &str) -> Vec<Token> {
        tokenize(source)
            .unwrap()
            .into_iter()
            .map(|l| l.token)
            .collect()
    }

    #[test]
    fn test_classifies_tokens() {
        assert_eq!(
            tokens("x[0:10] >= 0.1"),
            vec![
                Token::Ident("x".into()),
                Token::Delim(Delimiter::LBracket),
                Token::Number(0.0),
                Token::Delim(Delimiter::Colon),
                Token::Number(10.0),
                Token::Delim(Delimiter::RBracket),
                Token::Op(Operator::Ge),
                Token::Number(0.1),
                Token::End,
            ]
        );
    }

    #[test]
    fn test_longest_operator_wins() {
        assert_eq!(
            tokens("a ** 2 * b <= c"),
            vec![
                Token::Ident("a".into()),
                Token::Op(Operator::Pow),
                Token::Number(2.0),
                Token::Op(Operator::Star),
                Token::Ident("b".into()),
                Token::Op(Operator::Le),
                Token::Ident("c".into()),
                Token::End,
            ]
        );
    }

    #[test]
    fn test_number_forms() {
        assert_eq!(
            tokens("1 2.5 .5 1e3 2.5e-1"),
            vec![
                Token::Number(1.0),
                Token::Number(2.5),
                Token::Number(0.5),
                Token::Number(1000.0),
                Token::Number(0.25),
                Token::End,
            ]
        );
    }

    #[test]
    fn test_spans() {
        let lexemes = tokenize("  sum(x)").unwrap();
        assert_eq!(lexemes[0].span, Span::new(2, 5));
        assert_eq!(lexemes.last().unwrap().span, Span::new(8, 8));
    }

    #[test]
    fn test_comments_are_rejected() {
        let err = tokenize("x + 1 # budget").unwrap_err();
        assert!(matches!(err, CvxError::Lex { offset: 6, found: '#' }));
        assert!(matches!(tokenize("x; y"), Err(CvxError::Lex { offset: 1, found: ';' })));
    }

    #[test]
    fn test_single_equals_is_rejected() {
        assert!(matches!(tokenize("x = 1"), Err(CvxError::Lex { offset: 2, found: '=' })));
    }

    #[test]
    fn test_restart() {
        let mut lexer = Lexer::new("a + b");
        assert_eq!(lexer.by_ref().count(), 4);
        assert!(lexer.next().is_none());
        lexer.restart();
        let first = lexer.next().unwrap().unwrap();
        assert_eq!(first.token, Token::Ident("a".into()));
    }
}

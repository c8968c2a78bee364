//! Expression lexer.
//!
//! Turns expression text into a flat list of tokens with byte offsets.

use super::EvalError;

/// Punctuation and operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Punct {
    LParen,
    RParen,
    LBracket,
    RBracket,
    LBrace,
    RBrace,
    Comma,
    Colon,
    Semi,
    Dot,
    Question,
    Arrow,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Bang,
    Assign,
    PlusAssign,
    MinusAssign,
    StarAssign,
    SlashAssign,
    PlusPlus,
    MinusMinus,
    Eq,
    StrictEq,
    Ne,
    StrictNe,
    Lt,
    Le,
    Gt,
    Ge,
    AndAnd,
    OrOr,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Number(f64),
    Str(String),
    Ident(String),
    Punct(Punct),
}

/// A token and the byte offset it starts at.
#[derive(Debug, Clone, PartialEq)]
pub struct Lexeme {
    pub token: Token,
    pub offset: usize,
}

// Longest operators first so `===` wins over `==` and `=`.
const OPERATORS: &[(&str, Punct)] = &[
    ("===", Punct::StrictEq),
    ("!==", Punct::StrictNe),
    ("=>", Punct::Arrow),
    ("==", Punct::Eq),
    ("!=", Punct::Ne),
    ("<=", Punct::Le),
    (">=", Punct::Ge),
    ("&&", Punct::AndAnd),
    ("||", Punct::OrOr),
    ("++", Punct::PlusPlus),
    ("--", Punct::MinusMinus),
    ("+=", Punct::PlusAssign),
    ("-=", Punct::MinusAssign),
    ("*=", Punct::StarAssign),
    ("/=", Punct::SlashAssign),
    ("(", Punct::LParen),
    (")", Punct::RParen),
    ("[", Punct::LBracket),
    ("]", Punct::RBracket),
    ("{", Punct::LBrace),
    ("}", Punct::RBrace),
    (",", Punct::Comma),
    (":", Punct::Colon),
    (";", Punct::Semi),
    (".", Punct::Dot),
    ("?", Punct::Question),
    ("+", Punct::Plus),
    ("-", Punct::Minus),
    ("*", Punct::Star),
    ("/", Punct::Slash),
    ("%", Punct::Percent),
    ("!", Punct::Bang),
    ("=", Punct::Assign),
    ("<", Punct::Lt),
    (">", Punct::Gt),
];

fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_' || c == '$'
}

fn is_ident_continue(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '$'
}

/// Split `source` into tokens.
pub fn tokenize(source: &str) -> Result<Vec<Lexeme>, EvalError> {
    let mut lexemes = Vec::new();
    let mut pos = 0;

    while let Some(c) = source[pos..].chars().next() {
        if c.is_whitespace() {
            pos += c.len_utf8();
            continue;
        }

        let start = pos;
        let rest = &source[pos..];

        let token = if c.is_ascii_digit()
            || (c == '.' && rest[1..].starts_with(|d: char| d.is_ascii_digit()))
        {
            let len = number_len(rest);
            let text = &rest[..len];
            pos += len;
            let number = text.parse::<f64>().map_err(|_| EvalError::InvalidNumber {
                text: text.to_string(),
            })?;
            Token::Number(number)
        } else if is_ident_start(c) {
            let len = rest
                .find(|d: char| !is_ident_continue(d))
                .unwrap_or(rest.len());
            pos += len;
            Token::Ident(rest[..len].to_string())
        } else if c == '"' || c == '\'' {
            let (text, len) = read_string(rest, c).ok_or(EvalError::UnterminatedString {
                offset: start,
            })?;
            pos += len;
            Token::Str(text)
        } else if let Some((op, punct)) = OPERATORS.iter().find(|(op, _)| rest.starts_with(op)) {
            pos += op.len();
            Token::Punct(*punct)
        } else {
            return Err(EvalError::UnexpectedChar { ch: c, offset: start });
        };

        lexemes.push(Lexeme {
            token,
            offset: start,
        });
    }

    Ok(lexemes)
}

/// Read a quoted string starting at the opening quote. Returns the decoded
/// text and the number of bytes consumed, or `None` if it never closes.
fn read_string(rest: &str, quote: char) -> Option<(String, usize)> {
    let mut text = String::new();
    let mut chars = rest.char_indices().skip(1);

    while let Some((i, c)) = chars.next() {
        match c {
            c if c == quote => return Some((text, i + c.len_utf8())),
            '\\' => {
                let (_, escaped) = chars.next()?;
                text.push(match escaped {
                    'n' => '\n',
                    't' => '\t',
                    'r' => '\r',
                    '0' => '\0',
                    other => other,
                });
            }
            c => text.push(c),
        }
    }

    None
}

/// Length of the number literal at the start of `rest`: digits and dots,
/// then an optional `e`/`E` exponent with an optional sign.
fn number_len(rest: &str) -> usize {
    let bytes = rest.as_bytes();
    let mut len = bytes
        .iter()
        .position(|b| !(b.is_ascii_digit() || *b == b'.'))
        .unwrap_or(bytes.len());

    if matches!(bytes.get(len), Some(b'e' | b'E')) {
        let mut digits = len + 1;
        if matches!(bytes.get(digits), Some(b'+' | b'-')) {
            digits += 1;
        }
        let exponent = bytes[digits.min(bytes.len())..]
            .iter()
            .take_while(|b| b.is_ascii_digit())
            .count();
        if exponent > 0 {
            len = digits + exponent;
        }
    }
    len
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(source: &str) -> Vec<Token> {
        tokenize(source)
            .unwrap()
            .into_iter()
            .map(|lexeme| lexeme.token)
            .collect()
    }

    #[test]
    fn identifiers_numbers_and_operators() {
        assert_eq!(
            tokens("count + 1.5"),
            vec![
                Token::Ident("count".into()),
                Token::Punct(Punct::Plus),
                Token::Number(1.5),
            ]
        );
        assert_eq!(
            tokens("$event.x===a"),
            vec![
                Token::Ident("$event".into()),
                Token::Punct(Punct::Dot),
                Token::Ident("x".into()),
                Token::Punct(Punct::StrictEq),
                Token::Ident("a".into()),
            ]
        );
    }

    #[test]
    fn exponent_literals() {
        assert_eq!(tokens("1e3"), vec![Token::Number(1000.0)]);
        assert_eq!(tokens("2.5e-3"), vec![Token::Number(0.0025)]);
        assert_eq!(tokens("1E+2"), vec![Token::Number(100.0)]);
        // Without digits after it, `e` starts an identifier.
        assert_eq!(
            tokens("2e"),
            vec![Token::Number(2.0), Token::Ident("e".into())]
        );
    }

    #[test]
    fn strings_with_escapes() {
        assert_eq!(
            tokens(r#"'it\'s' "a\nb""#),
            vec![Token::Str("it's".into()), Token::Str("a\nb".into())]
        );
    }

    #[test]
    fn offsets_point_at_token_starts() {
        let lexemes = tokenize("a  ++").unwrap();
        assert_eq!(lexemes[0].offset, 0);
        assert_eq!(lexemes[1].offset, 3);
        assert_eq!(lexemes[1].token, Token::Punct(Punct::PlusPlus));
    }

    #[test]
    fn lexical_errors() {
        assert_eq!(
            tokenize("a # b"),
            Err(EvalError::UnexpectedChar { ch: '#', offset: 2 })
        );
        assert_eq!(
            tokenize("'open"),
            Err(EvalError::UnterminatedString { offset: 0 })
        );
        assert!(matches!(
            tokenize("1.2.3"),
            Err(EvalError::InvalidNumber { .. })
        ));
    }
}

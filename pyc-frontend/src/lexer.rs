//! Tokenizer for the textual IR.

use pyc_utils::{Error, PycResult};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Token {
    /// Bare identifier or keyword; may contain `.` (attribute keys).
    Ident(String),
    /// `%name`: a value reference or definition.
    Value(String),
    /// `@name`: a symbol reference.
    Symbol(String),
    Int(u64),
    LBrace,
    RBrace,
    LParen,
    RParen,
    Comma,
    Equals,
    Colon,
    Arrow,
    Eof,
}

impl std::fmt::Display for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Token::Ident(s) => write!(f, "`{s}'"),
            Token::Value(s) => write!(f, "`%{s}'"),
            Token::Symbol(s) => write!(f, "`@{s}'"),
            Token::Int(v) => write!(f, "`{v}'"),
            Token::LBrace => write!(f, "`{{'"),
            Token::RBrace => write!(f, "`}}'"),
            Token::LParen => write!(f, "`('"),
            Token::RParen => write!(f, "`)'"),
            Token::Comma => write!(f, "`,'"),
            Token::Equals => write!(f, "`='"),
            Token::Colon => write!(f, "`:'"),
            Token::Arrow => write!(f, "`->'"),
            Token::Eof => write!(f, "end of input"),
        }
    }
}

/// A token plus the line it started on, for diagnostics.
#[derive(Clone, Debug)]
pub struct Spanned {
    pub token: Token,
    pub line: usize,
}

fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '.'
}

/// Tokenize the whole input. `//` starts a comment running to end of line.
pub fn tokenize(src: &str) -> PycResult<Vec<Spanned>> {
    let mut tokens = Vec::new();
    let mut chars = src.chars().peekable();
    let mut line = 1usize;

    macro_rules! push {
        ($tok:expr) => {
            tokens.push(Spanned { token: $tok, line })
        };
    }

    while let Some(&c) = chars.peek() {
        match c {
            '\n' => {
                line += 1;
                chars.next();
            }
            c if c.is_whitespace() => {
                chars.next();
            }
            '/' => {
                chars.next();
                if chars.peek() == Some(&'/') {
                    for c in chars.by_ref() {
                        if c == '\n' {
                            line += 1;
                            break;
                        }
                    }
                } else {
                    return Err(Error::parse(format!("line {line}: stray `/'")));
                }
            }
            '{' => {
                chars.next();
                push!(Token::LBrace);
            }
            '}' => {
                chars.next();
                push!(Token::RBrace);
            }
            '(' => {
                chars.next();
                push!(Token::LParen);
            }
            ')' => {
                chars.next();
                push!(Token::RParen);
            }
            ',' => {
                chars.next();
                push!(Token::Comma);
            }
            '=' => {
                chars.next();
                push!(Token::Equals);
            }
            ':' => {
                chars.next();
                push!(Token::Colon);
            }
            '-' => {
                chars.next();
                if chars.peek() == Some(&'>') {
                    chars.next();
                    push!(Token::Arrow);
                } else {
                    return Err(Error::parse(format!("line {line}: stray `-'")));
                }
            }
            '%' | '@' => {
                let sigil = c;
                chars.next();
                let mut name = String::new();
                while let Some(&c) = chars.peek() {
                    if is_ident_char(c) {
                        name.push(c);
                        chars.next();
                    } else {
                        break;
                    }
                }
                if name.is_empty() {
                    return Err(Error::parse(format!(
                        "line {line}: `{sigil}' not followed by a name"
                    )));
                }
                if sigil == '%' {
                    push!(Token::Value(name));
                } else {
                    push!(Token::Symbol(name));
                }
            }
            c if c.is_ascii_digit() => {
                let mut text = String::new();
                while let Some(&c) = chars.peek() {
                    if c.is_ascii_alphanumeric() {
                        text.push(c);
                        chars.next();
                    } else {
                        break;
                    }
                }
                let value = if let Some(hex) = text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
                    u64::from_str_radix(hex, 16)
                } else {
                    text.parse::<u64>()
                };
                match value {
                    Ok(v) => push!(Token::Int(v)),
                    Err(..) => {
                        return Err(Error::parse(format!(
                            "line {line}: bad integer literal `{text}'"
                        )))
                    }
                }
            }
            c if is_ident_start(c) => {
                let mut name = String::new();
                while let Some(&c) = chars.peek() {
                    if is_ident_char(c) {
                        name.push(c);
                        chars.next();
                    } else {
                        break;
                    }
                }
                push!(Token::Ident(name));
            }
            c => {
                return Err(Error::parse(format!(
                    "line {line}: unexpected character `{c}'"
                )))
            }
        }
    }
    push!(Token::Eof);
    Ok(tokens)
}

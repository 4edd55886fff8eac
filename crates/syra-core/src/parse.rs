//! Surface-syntax parser for atoms.
//!
//! Minimal parenthesized term syntax: `Symbol`, `$variable`,
//! `(head child ...)`, and literals (`42`, `-1.5`, `true`, `"text"`) which
//! become grounded atoms. `;` starts a line comment. Malformed input is a
//! structured [`ParseError`] and never touches any store.

use thiserror::Error;

use crate::atom::{Atom, Interner};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("unexpected end of input (unclosed '(' at byte {open})")]
    UnclosedParen { open: usize },
    #[error("unbalanced ')' at byte {offset}")]
    UnbalancedClose { offset: usize },
    #[error("unterminated string literal starting at byte {offset}")]
    UnterminatedString { offset: usize },
    #[error("invalid escape '\\{escape}' at byte {offset}")]
    InvalidEscape { escape: char, offset: usize },
    #[error("empty variable name at byte {offset}")]
    EmptyVariable { offset: usize },
    #[error("expected exactly one atom, found none")]
    Empty,
    #[error("trailing input after first atom at byte {offset}")]
    TrailingInput { offset: usize },
}

enum Token {
    Open(usize),
    Close(usize),
    Str(String),
    Word(String, usize),
}

fn tokenize(text: &str) -> Result<Vec<Token>, ParseError> {
    let mut tokens = Vec::new();
    let mut chars = text.char_indices().peekable();

    while let Some(&(offset, ch)) = chars.peek() {
        match ch {
            c if c.is_whitespace() => {
                chars.next();
            }
            ';' => {
                // Line comment.
                for (_, c) in chars.by_ref() {
                    if c == '\n' {
                        break;
                    }
                }
            }
            '(' => {
                chars.next();
                tokens.push(Token::Open(offset));
            }
            ')' => {
                chars.next();
                tokens.push(Token::Close(offset));
            }
            '"' => {
                chars.next();
                let mut out = String::new();
                let mut closed = false;
                while let Some((esc_offset, c)) = chars.next() {
                    match c {
                        '"' => {
                            closed = true;
                            break;
                        }
                        '\\' => match chars.next() {
                            Some((_, 'n')) => out.push('\n'),
                            Some((_, 't')) => out.push('\t'),
                            Some((_, '"')) => out.push('"'),
                            Some((_, '\\')) => out.push('\\'),
                            Some((_, other)) => {
                                return Err(ParseError::InvalidEscape {
                                    escape: other,
                                    offset: esc_offset,
                                })
                            }
                            None => return Err(ParseError::UnterminatedString { offset }),
                        },
                        _ => out.push(c),
                    }
                }
                if !closed {
                    return Err(ParseError::UnterminatedString { offset });
                }
                tokens.push(Token::Str(out));
            }
            _ => {
                let mut word = String::new();
                while let Some(&(_, c)) = chars.peek() {
                    if c.is_whitespace() || c == '(' || c == ')' || c == '"' || c == ';' {
                        break;
                    }
                    word.push(c);
                    chars.next();
                }
                tokens.push(Token::Word(word, offset));
            }
        }
    }

    Ok(tokens)
}

fn word_to_atom(interner: &Interner, word: &str, offset: usize) -> Result<Atom, ParseError> {
    if let Some(name) = word.strip_prefix('$') {
        if name.is_empty() {
            return Err(ParseError::EmptyVariable { offset });
        }
        return Ok(interner.variable(name));
    }
    if word == "true" {
        return Ok(interner.boolean(true));
    }
    if word == "false" {
        return Ok(interner.boolean(false));
    }
    if let Ok(i) = word.parse::<i64>() {
        return Ok(interner.int(i));
    }
    // Only words that look numeric become floats; `+`, `-`, `e` alone stay
    // symbols because f64::parse rejects them.
    if word.contains(['.', 'e', 'E']) && word.starts_with(|c: char| c.is_ascii_digit() || c == '-')
    {
        if let Ok(f) = word.parse::<f64>() {
            return Ok(interner.float(f));
        }
    }
    Ok(interner.symbol(word))
}

/// Parse every top-level atom in `text`.
pub fn parse_all(interner: &Interner, text: &str) -> Result<Vec<Atom>, ParseError> {
    let tokens = tokenize(text)?;

    let mut top: Vec<Atom> = Vec::new();
    // Stack of (open-paren offset, children collected so far).
    let mut frames: Vec<(usize, Vec<Atom>)> = Vec::new();

    for token in tokens {
        let atom = match token {
            Token::Open(offset) => {
                frames.push((offset, Vec::new()));
                continue;
            }
            Token::Close(offset) => match frames.pop() {
                Some((_, children)) => interner.expression(children),
                None => return Err(ParseError::UnbalancedClose { offset }),
            },
            Token::Str(s) => interner.text(&s),
            Token::Word(word, offset) => word_to_atom(interner, &word, offset)?,
        };
        match frames.last_mut() {
            Some((_, children)) => children.push(atom),
            None => top.push(atom),
        }
    }

    if let Some((open, _)) = frames.pop() {
        return Err(ParseError::UnclosedParen { open });
    }

    Ok(top)
}

/// Parse exactly one atom.
pub fn parse_one(interner: &Interner, text: &str) -> Result<Atom, ParseError> {
    let mut atoms = parse_all(interner, text)?;
    match atoms.len() {
        0 => Err(ParseError::Empty),
        1 => Ok(atoms.remove(0)),
        // Offset is unknown after the fact; report the second atom's position
        // as "somewhere past the first" using the rendered length.
        _ => Err(ParseError::TrailingInput {
            offset: atoms[0].to_string().len(),
        }),
    }
}

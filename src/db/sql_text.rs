//! Lexical view of SQL text used by the statement renderer and the DDL
//! translator.
//!
//! The lexer only distinguishes what a rewriter must leave alone (quoted
//! literals, quoted identifiers, comments) from words, `?` placeholders,
//! whitespace and single symbols. It is not a parser.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Token<'a> {
    Word(&'a str),
    Placeholder,
    Quoted(&'a str),
    Comment(&'a str),
    Whitespace(&'a str),
    Symbol(&'a str),
}

impl<'a> Token<'a> {
    pub fn text(&self) -> &'a str {
        match self {
            Token::Placeholder => "?",
            Token::Word(s)
            | Token::Quoted(s)
            | Token::Comment(s)
            | Token::Whitespace(s)
            | Token::Symbol(s) => s,
        }
    }

    pub fn is_keyword(&self, keyword: &str) -> bool {
        matches!(self, Token::Word(w) if w.eq_ignore_ascii_case(keyword))
    }

    fn is_trivia(&self) -> bool {
        matches!(self, Token::Whitespace(_) | Token::Comment(_))
    }
}

pub fn tokenize(sql: &str) -> Vec<Token<'_>> {
    let bytes = sql.as_bytes();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        let start = i;
        let b = bytes[i];
        match b {
            b'\'' | b'"' | b'`' => {
                i = end_of_quoted(bytes, i, b);
                tokens.push(Token::Quoted(&sql[start..i]));
            }
            b'-' if bytes.get(i + 1) == Some(&b'-') => {
                while i < bytes.len() && bytes[i] != b'\n' {
                    i += 1;
                }
                tokens.push(Token::Comment(&sql[start..i]));
            }
            b'/' if bytes.get(i + 1) == Some(&b'*') => {
                i += 2;
                while i < bytes.len() && !(bytes[i] == b'*' && bytes.get(i + 1) == Some(&b'/')) {
                    i += 1;
                }
                i = (i + 2).min(bytes.len());
                tokens.push(Token::Comment(&sql[start..i]));
            }
            b'?' => {
                i += 1;
                tokens.push(Token::Placeholder);
            }
            _ if b.is_ascii_whitespace() => {
                while i < bytes.len() && bytes[i].is_ascii_whitespace() {
                    i += 1;
                }
                tokens.push(Token::Whitespace(&sql[start..i]));
            }
            _ if is_word_byte(b) => {
                while i < bytes.len() && is_word_byte(bytes[i]) {
                    i += 1;
                }
                tokens.push(Token::Word(&sql[start..i]));
            }
            _ => {
                i += 1;
                tokens.push(Token::Symbol(&sql[start..i]));
            }
        }
    }

    tokens
}

/// First keyword of the statement, upper-cased, skipping comments and
/// opening parentheses.
pub fn leading_keyword(sql: &str) -> Option<String> {
    tokenize(sql)
        .into_iter()
        .filter(|t| !t.is_trivia() && *t != Token::Symbol("("))
        .find_map(|t| match t {
            Token::Word(w) => Some(w.to_ascii_uppercase()),
            _ => None,
        })
}

pub fn contains_keyword(tokens: &[Token<'_>], keyword: &str) -> bool {
    tokens.iter().any(|t| t.is_keyword(keyword))
}

pub fn count_placeholders(sql: &str) -> usize {
    tokenize(sql)
        .iter()
        .filter(|t| matches!(t, Token::Placeholder))
        .count()
}

/// Drops trailing whitespace, comments and statement terminators.
pub fn trim_statement_end<'a>(tokens: &mut Vec<Token<'a>>) {
    while let Some(last) = tokens.last() {
        if last.is_trivia() || *last == Token::Symbol(";") {
            tokens.pop();
        } else {
            break;
        }
    }
}

pub fn next_word_after<'a>(tokens: &[Token<'a>], index: usize) -> Option<(usize, &'a str)> {
    tokens
        .iter()
        .enumerate()
        .skip(index + 1)
        .find(|(_, t)| !t.is_trivia())
        .and_then(|(i, t)| match t {
            Token::Word(w) => Some((i, *w)),
            _ => None,
        })
}

fn end_of_quoted(bytes: &[u8], start: usize, quote: u8) -> usize {
    let mut i = start + 1;
    while i < bytes.len() {
        if bytes[i] == quote {
            // doubled quote is an escaped quote character
            if bytes.get(i + 1) == Some(&quote) {
                i += 2;
                continue;
            }
            return i + 1;
        }
        i += 1;
    }
    bytes.len()
}

// Non-ASCII bytes are treated as word bytes so multi-byte characters are
// never split across tokens.
fn is_word_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_' || b == b'$' || b >= 0x80
}

//! Source text to [`Value`] trees: a tokenizer, a peek/pop token stream,
//! and a recursive-descent reader over it.

use nom::{
    IResult, Parser,
    branch::alt,
    bytes::complete::{tag, take_while1},
};

use crate::Error;
use crate::value::Value;

/// Commas count as whitespace between tokens.
fn skip_filler(input: &str) -> &str {
    input.trim_start_matches(|c: char| c.is_whitespace() || c == ',')
}

/// Parens and the quote shorthand are always their own tokens.
fn punct_token(input: &str) -> IResult<&str, &str> {
    alt((tag("("), tag(")"), tag("'"))).parse(input)
}

/// A string literal as a single token, returned as the raw source slice
/// including both quotes. Escape pairs are skipped here and decoded by the
/// atom classifier. Fails if the closing quote is missing.
fn string_token(input: &str) -> IResult<&str, &str> {
    let (rest, _) = nom::character::complete::char('"').parse(input)?;
    let mut chars = rest.char_indices();
    loop {
        match chars.next() {
            Some((i, '"')) => {
                let consumed = 1 + i + 1; // opening quote, content, closing quote
                return Ok((&input[consumed..], &input[..consumed]));
            }
            Some((_, '\\')) => {
                chars.next();
            }
            Some(_) => {}
            None => {
                return Err(nom::Err::Error(nom::error::Error::new(
                    input,
                    nom::error::ErrorKind::Char,
                )));
            }
        }
    }
}

/// A maximal run of characters that are not filler, punctuation, or a
/// string delimiter.
fn bare_token(input: &str) -> IResult<&str, &str> {
    take_while1(|c: char| {
        !c.is_whitespace() && !matches!(c, ',' | '(' | ')' | '\'' | '"')
    })
    .parse(input)
}

/// Short snippet of remaining input for error messages.
fn snippet(input: &str) -> String {
    input.chars().take(20).collect()
}

/// Split source text into tokens. The only way this fails is an
/// unterminated string literal.
pub(crate) fn tokenize(input: &str) -> Result<Vec<&str>, Error> {
    let mut tokens = Vec::new();
    let mut rest = skip_filler(input);
    while !rest.is_empty() {
        match alt((punct_token, string_token, bare_token)).parse(rest) {
            Ok((remaining, token)) => {
                tokens.push(token);
                rest = skip_filler(remaining);
            }
            Err(_) => return Err(Error::InvalidAtom(snippet(rest))),
        }
    }
    Ok(tokens)
}

/// Left-to-right view of a token sequence. Both operations report end of
/// stream as `None` once the tokens are drained.
pub struct TokenStream<'a> {
    tokens: &'a [&'a str],
    pos: usize,
}

impl<'a> TokenStream<'a> {
    pub fn new(tokens: &'a [&'a str]) -> Self {
        TokenStream { tokens, pos: 0 }
    }

    pub fn peek(&self) -> Option<&'a str> {
        self.tokens.get(self.pos).copied()
    }

    pub fn pop(&mut self) -> Option<&'a str> {
        let token = self.peek();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }
}

/// Decode the escape sequences permitted inside string literals.
fn unescape(raw: &str) -> Result<String, Error> {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(ch) = chars.next() {
        if ch != '\\' {
            out.push(ch);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some('\\') => out.push('\\'),
            Some('"') => out.push('"'),
            _ => return Err(Error::InvalidAtom(format!("\"{raw}\""))),
        }
    }
    Ok(out)
}

/// Classify a single non-punctuation token as an atom.
fn parse_atom(token: &str) -> Result<Value, Error> {
    match token {
        "true" => return Ok(Value::Bool(true)),
        "false" => return Ok(Value::Bool(false)),
        // Parens are reserved tokens, never symbols.
        "(" | ")" => return Err(Error::InvalidAtom(token.to_owned())),
        _ => {}
    }

    if let Ok(n) = token.parse::<i64>() {
        return Ok(Value::Int(n));
    }

    if token.len() > 1 && token.starts_with('"') && token.ends_with('"') {
        let inner = &token[1..token.len() - 1];
        return Ok(Value::Str(unescape(inner)?));
    }

    if let Some(name) = token.strip_prefix(':') {
        if name.is_empty() {
            return Err(Error::InvalidAtom(token.to_owned()));
        }
        return Ok(Value::Key(name.to_owned()));
    }

    if token.is_empty() {
        return Err(Error::InvalidAtom(token.to_owned()));
    }

    Ok(Value::Sym(token.to_owned()))
}

/// Parse one form from the stream: a list, a quoted form, or an atom.
fn parse_form(stream: &mut TokenStream<'_>) -> Result<Value, Error> {
    let Some(token) = stream.pop() else {
        return Err(Error::UnterminatedList);
    };

    match token {
        "(" => {
            let mut elements = Vec::new();
            loop {
                match stream.peek() {
                    None => return Err(Error::UnterminatedList),
                    Some(")") => {
                        stream.pop();
                        return Ok(Value::List(elements));
                    }
                    Some(_) => elements.push(parse_form(stream)?),
                }
            }
        }
        "'" => {
            if stream.peek().is_none() {
                return Err(Error::InvalidAtom("'".to_owned()));
            }
            let quoted = parse_form(stream)?;
            Ok(Value::List(vec![Value::Sym("quote".to_owned()), quoted]))
        }
        _ => parse_atom(token),
    }
}

/// Read every form in the input. `(println "hi") (+ 1 2)` yields two
/// values; an empty or all-whitespace input yields none.
pub fn read(input: &str) -> Result<Vec<Value>, Error> {
    let tokens = tokenize(input)?;
    let mut stream = TokenStream::new(&tokens);
    let mut forms = Vec::new();
    while stream.peek().is_some() {
        forms.push(parse_form(&mut stream)?);
    }
    Ok(forms)
}

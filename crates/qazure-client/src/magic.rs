//! Magic command parsing.
//!
//! Lines look like `%azure.submit Op shots=100 jobParams={"k": "v"}`.
//! Tokens are separated by whitespace outside quotes and outside `{...}` /
//! `[...]` groups, so JSON values may contain spaces.

use thiserror::Error;

/// Magic command syntax error.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MagicError {
    /// A quote was opened and never closed.
    #[error("Unterminated {0} quote")]
    UnterminatedQuote(char),

    /// Brackets or braces do not balance.
    #[error("Unbalanced '{0}'")]
    Unbalanced(char),

    /// The line does not start with a `%name` command.
    #[error("Expected a magic command such as %azure.connect, got: {0}")]
    NotAMagic(String),
}

/// Split an argument string into tokens.
pub fn tokenize(input: &str) -> Result<Vec<String>, MagicError> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut quote: Option<char> = None;
    let mut depth: Vec<char> = Vec::new();
    let mut in_token = false;

    for c in input.chars() {
        if let Some(q) = quote {
            current.push(c);
            if c == q {
                quote = None;
            }
            continue;
        }
        match c {
            '"' | '\'' => {
                quote = Some(c);
                current.push(c);
                in_token = true;
            }
            '{' | '[' => {
                depth.push(c);
                current.push(c);
                in_token = true;
            }
            '}' | ']' => {
                let open = if c == '}' { '{' } else { '[' };
                if depth.pop() != Some(open) {
                    return Err(MagicError::Unbalanced(c));
                }
                current.push(c);
            }
            c if c.is_whitespace() && depth.is_empty() => {
                if in_token {
                    tokens.push(std::mem::take(&mut current));
                    in_token = false;
                }
            }
            c => {
                current.push(c);
                in_token = true;
            }
        }
    }

    if let Some(q) = quote {
        return Err(MagicError::UnterminatedQuote(q));
    }
    if let Some(open) = depth.pop() {
        return Err(MagicError::Unbalanced(open));
    }
    if in_token {
        tokens.push(current);
    }
    Ok(tokens)
}

/// Remove one pair of matching surrounding quotes.
pub fn unquote(value: &str) -> &str {
    let bytes = value.as_bytes();
    if bytes.len() >= 2 {
        let (first, last) = (bytes[0], bytes[bytes.len() - 1]);
        if first == last && (first == b'"' || first == b'\'') {
            return &value[1..value.len() - 1];
        }
    }
    value
}

/// Positional and `key=value` arguments of a command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MagicArguments {
    /// Arguments without a key, in order.
    pub positional: Vec<String>,
    /// `key=value` arguments, in order, quotes removed from values.
    pub named: Vec<(String, String)>,
}

impl MagicArguments {
    /// Parse an argument string.
    pub fn parse(input: &str) -> Result<Self, MagicError> {
        let mut args = MagicArguments::default();
        for token in tokenize(input)? {
            match split_named(&token) {
                Some((key, value)) => args.named.push((key.to_string(), unquote(value).to_string())),
                None => args.positional.push(unquote(&token).to_string()),
            }
        }
        Ok(args)
    }

    /// Value of a named argument (case-insensitive key). The last occurrence
    /// wins.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.named
            .iter()
            .rev()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_str())
    }

    /// First positional argument.
    pub fn first(&self) -> Option<&str> {
        self.positional.first().map(String::as_str)
    }

    /// Whether no arguments were given.
    pub fn is_empty(&self) -> bool {
        self.positional.is_empty() && self.named.is_empty()
    }
}

/// `key=value` when the token starts with an identifier followed by `=`.
fn split_named(token: &str) -> Option<(&str, &str)> {
    let (key, value) = token.split_once('=')?;
    let valid = !key.is_empty()
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.' || c == '-');
    valid.then_some((key, value))
}

/// A full magic line: `%name args...`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MagicCommand {
    /// Command name without the leading `%` (e.g. `"azure.connect"`).
    pub name: String,
    /// Parsed arguments.
    pub args: MagicArguments,
    /// Raw argument text after the name.
    pub raw_args: String,
}

impl MagicCommand {
    /// Parse a line starting with `%`.
    pub fn parse(line: &str) -> Result<Self, MagicError> {
        let line = line.trim();
        let rest = line
            .strip_prefix('%')
            .ok_or_else(|| MagicError::NotAMagic(line.to_string()))?;
        let (name, raw_args) = match rest.split_once(char::is_whitespace) {
            Some((name, args)) => (name, args.trim()),
            None => (rest, ""),
        };
        if name.is_empty() {
            return Err(MagicError::NotAMagic(line.to_string()));
        }
        Ok(Self {
            name: name.to_ascii_lowercase(),
            args: MagicArguments::parse(raw_args)?,
            raw_args: raw_args.to_string(),
        })
    }
}

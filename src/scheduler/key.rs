//! Item Key Parser
//!
//! Item keys name a metric and optionally pass it parameters:
//!
//! ```text
//! agent.ping
//! system.localtime[utc]
//! vfs.fs.size["/var/lib", free]
//! ```
//!
//! Parameters are comma separated. A quoted parameter may contain commas and
//! `\"` escapes; unquoted parameters have surrounding spaces trimmed.

use std::fmt;
use thiserror::Error;

/// Errors that can occur while parsing an item key.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum KeyError {
    #[error("empty item key")]
    Empty,

    #[error("invalid character {0:?} in item key name")]
    InvalidName(char),

    #[error("missing closing bracket in item key")]
    UnterminatedParams,

    #[error("unterminated quoted parameter")]
    UnterminatedQuote,

    #[error("unexpected character {0:?} after quoted parameter")]
    UnexpectedCharacter(char),
}

/// A parsed item key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemKey {
    pub name: String,
    pub params: Vec<String>,
}

impl ItemKey {
    /// Returns the parameter at `index`, or `""` when absent.
    pub fn param(&self, index: usize) -> &str {
        self.params.get(index).map(String::as_str).unwrap_or("")
    }
}

impl fmt::Display for ItemKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)?;
        if !self.params.is_empty() {
            write!(f, "[{}]", self.params.join(","))?;
        }
        Ok(())
    }
}

fn is_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-')
}

/// Parses an item key into its name and parameters.
pub fn parse_item_key(key: &str) -> Result<ItemKey, KeyError> {
    let (name, rest) = match key.find('[') {
        Some(pos) => (&key[..pos], Some(&key[pos + 1..])),
        None => (key, None),
    };

    if name.is_empty() {
        return Err(KeyError::Empty);
    }
    if let Some(c) = name.chars().find(|&c| !is_name_char(c)) {
        return Err(KeyError::InvalidName(c));
    }

    let params = match rest {
        None => Vec::new(),
        Some(rest) => {
            let inner = rest
                .strip_suffix(']')
                .ok_or(KeyError::UnterminatedParams)?;
            parse_params(inner)?
        }
    };

    Ok(ItemKey {
        name: name.to_string(),
        params,
    })
}

fn parse_params(inner: &str) -> Result<Vec<String>, KeyError> {
    let mut params = Vec::new();
    let mut chars = inner.chars().peekable();

    loop {
        while chars.peek() == Some(&' ') {
            chars.next();
        }

        let mut param = String::new();

        if chars.peek() == Some(&'"') {
            chars.next();
            loop {
                match chars.next() {
                    None => return Err(KeyError::UnterminatedQuote),
                    Some('\\') if chars.peek() == Some(&'"') => {
                        chars.next();
                        param.push('"');
                    }
                    Some('"') => break,
                    Some(c) => param.push(c),
                }
            }
            while chars.peek() == Some(&' ') {
                chars.next();
            }
            params.push(param);

            match chars.next() {
                None => break,
                Some(',') => continue,
                Some(c) => return Err(KeyError::UnexpectedCharacter(c)),
            }
        } else {
            while let Some(&c) = chars.peek() {
                if c == ',' {
                    break;
                }
                param.push(c);
                chars.next();
            }
            params.push(param.trim_end().to_string());

            if chars.next().is_none() {
                break;
            }
        }
    }

    Ok(params)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_key() {
        let key = parse_item_key("agent.ping").unwrap();
        assert_eq!(key.name, "agent.ping");
        assert!(key.params.is_empty());
    }

    #[test]
    fn test_key_with_params() {
        let key = parse_item_key("vfs.fs.size[/, free]").unwrap();
        assert_eq!(key.name, "vfs.fs.size");
        assert_eq!(key.params, vec!["/", "free"]);
        assert_eq!(key.param(1), "free");
        assert_eq!(key.param(5), "");
    }

    #[test]
    fn test_quoted_params() {
        let key = parse_item_key(r#"log["/var/log/a,b.log" , "say \"hi\""]"#).unwrap();
        assert_eq!(key.params, vec!["/var/log/a,b.log", "say \"hi\""]);
    }

    #[test]
    fn test_empty_params() {
        assert_eq!(parse_item_key("a[]").unwrap().params, vec![""]);
        assert_eq!(parse_item_key("a[x,]").unwrap().params, vec!["x", ""]);
        assert_eq!(parse_item_key("a[,,]").unwrap().params, vec!["", "", ""]);
    }

    #[test]
    fn test_invalid_keys() {
        assert_eq!(parse_item_key(""), Err(KeyError::Empty));
        assert_eq!(parse_item_key("[x]"), Err(KeyError::Empty));
        assert_eq!(parse_item_key("agent ping"), Err(KeyError::InvalidName(' ')));
        assert_eq!(parse_item_key("a[x"), Err(KeyError::UnterminatedParams));
        assert_eq!(parse_item_key(r#"a["x]"#), Err(KeyError::UnterminatedQuote));
        assert_eq!(
            parse_item_key(r#"a["x"y]"#),
            Err(KeyError::UnexpectedCharacter('y'))
        );
    }

    #[test]
    fn test_display() {
        let key = parse_item_key("system.localtime[ utc ]").unwrap();
        assert_eq!(key.to_string(), "system.localtime[utc]");
    }
}

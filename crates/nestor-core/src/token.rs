//! Tokens exchanged between actors

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// A unit of data sent through a port
///
/// Tokens are plain owned values: sending one token to several receivers
/// hands the first receiver the original and every other receiver a deep
/// clone, so no two receivers ever share mutable state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub enum Token {
    /// Absent value (used as a pure "event happened" signal)
    #[default]
    Null,
    /// Boolean value
    Bool(bool),
    /// Integer value
    Int(i64),
    /// Floating point value
    Float(f64),
    /// String value
    String(String),
    /// Ordered collection of tokens
    Array(Vec<Token>),
    /// Named fields
    Record(TokenMap),
}

/// A map of field names to tokens
///
/// Uses IndexMap to preserve insertion order
pub type TokenMap = IndexMap<String, Token>;

impl Token {
    /// Check if this token is null
    pub fn is_null(&self) -> bool {
        matches!(self, Token::Null)
    }

    /// Try to get this token as a boolean
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Token::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Try to get this token as an integer
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Token::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Try to get this token as a float (integers are widened)
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Token::Float(f) => Some(*f),
            Token::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    /// Try to get this token as a string
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Token::String(s) => Some(s),
            _ => None,
        }
    }

    /// Try to get this token as an array
    pub fn as_array(&self) -> Option<&[Token]> {
        match self {
            Token::Array(items) => Some(items),
            _ => None,
        }
    }

    /// Mutable access to the array contents
    pub fn as_array_mut(&mut self) -> Option<&mut Vec<Token>> {
        match self {
            Token::Array(items) => Some(items),
            _ => None,
        }
    }

    /// Try to get this token as a record
    pub fn as_record(&self) -> Option<&TokenMap> {
        match self {
            Token::Record(map) => Some(map),
            _ => None,
        }
    }

    /// Get the type name of this token
    pub fn type_name(&self) -> &'static str {
        match self {
            Token::Null => "null",
            Token::Bool(_) => "bool",
            Token::Int(_) => "int",
            Token::Float(_) => "float",
            Token::String(_) => "string",
            Token::Array(_) => "array",
            Token::Record(_) => "record",
        }
    }

    /// Compare two tokens by value
    ///
    /// Numbers compare numerically across `Int` and `Float`, strings
    /// lexically, booleans with `false < true`. Every other pairing
    /// (including NaN) is incomparable and yields `None`.
    pub fn compare_value(&self, other: &Token) -> Option<Ordering> {
        match (self, other) {
            (Token::Int(a), Token::Int(b)) => Some(a.cmp(b)),
            (Token::Bool(a), Token::Bool(b)) => Some(a.cmp(b)),
            (Token::String(a), Token::String(b)) => Some(a.cmp(b)),
            (Token::Null, Token::Null) => Some(Ordering::Equal),
            (a, b) => match (a.as_float(), b.as_float()) {
                (Some(x), Some(y)) => x.partial_cmp(&y),
                _ => None,
            },
        }
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Null => write!(f, "null"),
            Token::Bool(b) => write!(f, "{}", b),
            Token::Int(i) => write!(f, "{}", i),
            Token::Float(x) => write!(f, "{}", x),
            Token::String(s) => write!(f, "\"{}\"", s),
            Token::Array(items) => {
                write!(f, "{{")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "}}")
            }
            Token::Record(map) => {
                write!(f, "{{")?;
                for (i, (k, v)) in map.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{} = {}", k, v)?;
                }
                write!(f, "}}")
            }
        }
    }
}

impl From<bool> for Token {
    fn from(b: bool) -> Self {
        Token::Bool(b)
    }
}

impl From<i64> for Token {
    fn from(i: i64) -> Self {
        Token::Int(i)
    }
}

impl From<i32> for Token {
    fn from(i: i32) -> Self {
        Token::Int(i as i64)
    }
}

impl From<f64> for Token {
    fn from(f: f64) -> Self {
        Token::Float(f)
    }
}

impl From<&str> for Token {
    fn from(s: &str) -> Self {
        Token::String(s.to_string())
    }
}

impl From<String> for Token {
    fn from(s: String) -> Self {
        Token::String(s)
    }
}

impl From<Vec<Token>> for Token {
    fn from(items: Vec<Token>) -> Self {
        Token::Array(items)
    }
}

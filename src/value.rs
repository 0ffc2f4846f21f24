use super::*;

use unicode_normalization::UnicodeNormalization;

/// A runtime value in the script language. Numbers are a single
/// numeric domain; there is no separate integer type.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Number(f64),
    Text(String),
    Part(PartId),
}

impl Value {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text(text.into())
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Numeric view of the value. Text that spells a number counts,
    /// matching the coercion the script language applies to literals
    /// read back out of fields and properties.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            Self::Text(s) => s.trim().parse::<f64>().ok(),
            _ => None,
        }
    }

    pub fn as_part(&self) -> Option<PartId> {
        match self {
            Self::Part(id) => Some(*id),
            _ => None,
        }
    }

    /// Condition semantics: only `true` (the boolean or the word) is true.
    pub fn is_truthy(&self) -> bool {
        match self {
            Self::Bool(b) => *b,
            Self::Text(s) => text_eq(s, "true"),
            _ => false,
        }
    }

    pub fn display_string(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => Ok(()),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Number(n) => {
                if n.is_finite() && n.fract() == 0.0 && n.abs() < 9_007_199_254_740_992.0 {
                    write!(f, "{}", *n as i64)
                } else {
                    write!(f, "{n}")
                }
            }
            Self::Text(s) => write!(f, "{s}"),
            Self::Part(id) => write!(f, "part {id}"),
        }
    }
}

/// Canonical form for user-authored identifiers: handler names,
/// property names and aliases, variable names. NFC first, so visually
/// identical names typed on different platforms collide as intended.
pub(crate) fn normalize_name(name: &str) -> String {
    name.trim().nfc().collect::<String>().to_ascii_lowercase()
}

/// Text equality as the `=` operator sees it.
pub(crate) fn text_eq(a: &str, b: &str) -> bool {
    normalize_name(a) == normalize_name(b)
}

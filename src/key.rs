//! Key-encoding helper.
//!
//! Heterogeneous key parts are represented by an explicit enum rather than
//! a variadic of trait objects, so key construction stays statically typed.

use std::fmt::Write as _;

/// One component of a composite cache key.
#[derive(Debug, Clone)]
pub enum KeyPart {
    Int(i64),
    Str(String),
}

impl From<i64> for KeyPart {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<i32> for KeyPart {
    fn from(v: i32) -> Self {
        Self::Int(i64::from(v))
    }
}

impl From<&str> for KeyPart {
    fn from(v: &str) -> Self {
        Self::Str(v.to_string())
    }
}

impl From<String> for KeyPart {
    fn from(v: String) -> Self {
        Self::Str(v)
    }
}

/// Joins heterogeneous key components with a literal `':'` separator.
///
/// `gen_key(&[KeyPart::Str("app".into()), KeyPart::Int(7), KeyPart::Str("user".into())])`
/// yields `"app:7:user"`.
pub fn gen_key(parts: &[KeyPart]) -> String {
    let mut out = String::new();
    for (i, part) in parts.iter().enumerate() {
        match part {
            KeyPart::Int(v) => {
                let _ = write!(out, "{v}");
            }
            KeyPart::Str(v) => out.push_str(v),
        }
        if i < parts.len() - 1 {
            out.push(':');
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn joins_mixed_parts_with_colon() {
        let key = gen_key(&[
            KeyPart::from("app"),
            KeyPart::from(7i64),
            KeyPart::from("user"),
        ]);
        assert_eq!(key, "app:7:user");
    }

    #[test]
    fn single_part_has_no_separator() {
        assert_eq!(gen_key(&[KeyPart::from("solo")]), "solo");
    }

    #[test]
    fn empty_parts_yields_empty_string() {
        assert_eq!(gen_key(&[]), "");
    }
}

//! Textual type expressions: `i32`, `string?`, `Point`, `list<Point>`,
//! `array<u8>`, `ilist<Order>`, `map<string, Point>`.
//!
//! Parsing cannot tell a record name from an enum name, so names come back as
//! `Record` and `?` is kept verbatim; `TypeRegistry::resolve` fixes both up.

use crate::descriptors::TypeDescriptor;
use crate::enums::{ScalarKind, SequenceKind};
use crate::error::CoreError;
use std::fmt;
use std::str::FromStr;

impl fmt::Display for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeDescriptor::Scalar(kind) => write!(f, "{kind}"),
            TypeDescriptor::Enum(name) | TypeDescriptor::Record(name) => f.write_str(name),
            TypeDescriptor::Optional(inner) => write!(f, "{inner}?"),
            TypeDescriptor::Sequence { element, kind } => write!(f, "{}<{element}>", kind.as_str()),
            TypeDescriptor::Mapping { key, value } => write!(f, "map<{key}, {value}>"),
        }
    }
}

impl FromStr for TypeDescriptor {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parser = ExprParser { input: s, pos: 0 };
        let ty = parser.parse_type()?;
        parser.skip_whitespace();
        if parser.pos != s.len() {
            return Err(parser.error("unexpected trailing input"));
        }
        Ok(ty)
    }
}

impl TryFrom<String> for TypeDescriptor {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<TypeDescriptor> for String {
    fn from(value: TypeDescriptor) -> Self {
        value.to_string()
    }
}

struct ExprParser<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> ExprParser<'a> {
    fn parse_type(&mut self) -> Result<TypeDescriptor, CoreError> {
        self.skip_whitespace();
        let name = self.identifier();
        if name.is_empty() {
            return Err(self.error("expected a type name"));
        }
        self.skip_whitespace();

        let mut ty = match (name, self.peek()) {
            ("map", Some('<')) => {
                self.expect('<')?;
                let key = self.parse_type()?;
                self.expect(',')?;
                let value = self.parse_type()?;
                self.expect('>')?;
                TypeDescriptor::mapping(key, value)
            }
            (sequence, Some('<')) if SequenceKind::from_name(sequence).is_some() => {
                let kind = SequenceKind::from_name(sequence)
                    .ok_or_else(|| self.error("unknown sequence kind"))?;
                self.expect('<')?;
                let element = self.parse_type()?;
                self.expect('>')?;
                TypeDescriptor::sequence(element, kind)
            }
            (_, Some('<')) => return Err(self.error("only list, array, ilist and map take parameters")),
            (scalar, _) => match ScalarKind::from_name(scalar) {
                Some(kind) => TypeDescriptor::Scalar(kind),
                None => TypeDescriptor::Record(scalar.to_string()),
            },
        };

        self.skip_whitespace();
        if self.peek() == Some('?') {
            self.pos += 1;
            ty = TypeDescriptor::Optional(Box::new(ty));
        }
        Ok(ty)
    }

    fn identifier(&mut self) -> &'a str {
        let input: &'a str = self.input;
        let start = self.pos;
        let rest = &input[start..];
        let len = rest
            .char_indices()
            .find(|(_, c)| !(c.is_alphanumeric() || *c == '_' || *c == '.' || *c == ':'))
            .map(|(i, _)| i)
            .unwrap_or(rest.len());
        self.pos += len;
        &input[start..start + len]
    }

    fn expect(&mut self, expected: char) -> Result<(), CoreError> {
        self.skip_whitespace();
        if self.peek() == Some(expected) {
            self.pos += expected.len_utf8();
            Ok(())
        } else {
            Err(self.error(&format!("expected '{expected}'")))
        }
    }

    fn peek(&self) -> Option<char> {
        self.input[self.pos..].chars().next()
    }

    fn skip_whitespace(&mut self) {
        while let Some(c) = self.peek() {
            if !c.is_whitespace() {
                break;
            }
            self.pos += c.len_utf8();
        }
    }

    fn error(&self, reason: &str) -> CoreError {
        CoreError::InvalidTypeExpression {
            expr: self.input.to_string(),
            reason: format!("{reason} at offset {}", self.pos),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(s: &str) -> TypeDescriptor {
        s.parse().unwrap()
    }

    #[test]
    fn test_parse_scalars_and_names() {
        assert_eq!(parse("i32"), TypeDescriptor::Scalar(ScalarKind::I32));
        assert_eq!(parse(" datetime "), TypeDescriptor::Scalar(ScalarKind::DateTime));
        assert_eq!(parse("Point"), TypeDescriptor::record("Point"));
    }

    #[test]
    fn test_parse_nested_generics() {
        let ty = parse("map<string, list<Point?>>");
        assert_eq!(
            ty,
            TypeDescriptor::mapping(
                TypeDescriptor::Scalar(ScalarKind::String),
                TypeDescriptor::list(TypeDescriptor::Optional(Box::new(TypeDescriptor::record(
                    "Point"
                )))),
            )
        );
        assert_eq!(ty.to_string(), "map<string, list<Point?>>");
    }

    #[test]
    fn test_parse_sequence_kinds() {
        assert_eq!(
            parse("ilist<u8>"),
            TypeDescriptor::list_interface(TypeDescriptor::Scalar(ScalarKind::U8))
        );
        assert_eq!(
            parse("array<Point>"),
            TypeDescriptor::array(TypeDescriptor::record("Point"))
        );
    }

    #[test]
    fn test_a_record_may_be_called_list() {
        assert_eq!(parse("list"), TypeDescriptor::record("list"));
    }

    #[test]
    fn test_parse_errors() {
        for bad in ["", "list<i32", "map<i32>", "Point<i32>", "i32 i64", "list<>"] {
            let err = bad.parse::<TypeDescriptor>().unwrap_err();
            assert!(
                matches!(err, CoreError::InvalidTypeExpression { .. }),
                "{bad:?} gave {err:?}"
            );
        }
    }
}

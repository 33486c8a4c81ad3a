//! Text form of descriptors, as written in service descriptions.
//!
//! ```text
//! bool  int8 int16 int32 int64  uint8 uint16 uint32 uint64  float string raw
//! object unit  nullable<T>  list<T>  map<K, V>  tuple<A, B, ...>  <record name>
//! ```
//!
//! IDL spellings are accepted as aliases (`int`, `long`, `double`, ...).
//! Records are declared as `entry{key: string, value: int32}`.

use std::collections::BTreeMap;
use std::str::FromStr;
use std::sync::Arc;

use mpcall_wire::DEFAULT_MAX_DEPTH;

use crate::descriptor::{IntWidth, TypeDescriptor};
use crate::error::ParseError;
use crate::record::RecordType;

/// Named record types available to the parser.
#[derive(Debug, Default, Clone)]
pub struct TypeRegistry {
    records: BTreeMap<String, Arc<RecordType>>,
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make a record type resolvable by name. Replaces any earlier record
    /// with the same name.
    pub fn register(&mut self, record: Arc<RecordType>) {
        self.records.insert(record.name().to_string(), record);
    }

    pub fn get(&self, name: &str) -> Option<&Arc<RecordType>> {
        self.records.get(name)
    }

    pub fn records(&self) -> impl Iterator<Item = &Arc<RecordType>> {
        self.records.values()
    }

    /// Parse a record declaration and register it.
    pub fn define(&mut self, declaration: &str) -> Result<Arc<RecordType>, ParseError> {
        let mut parser = Parser::new(declaration, self);
        let record = parser.record_declaration()?;
        parser.finish()?;
        let record = Arc::new(record);
        self.register(Arc::clone(&record));
        Ok(record)
    }

    /// Parse a descriptor, resolving record names against this registry.
    pub fn parse(&self, text: &str) -> Result<TypeDescriptor, ParseError> {
        let mut parser = Parser::new(text, self);
        let descriptor = parser.descriptor()?;
        parser.finish()?;
        Ok(descriptor)
    }
}

/// Parse a descriptor that references no records.
pub fn parse_descriptor(text: &str) -> Result<TypeDescriptor, ParseError> {
    TypeRegistry::new().parse(text)
}

impl FromStr for TypeDescriptor {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_descriptor(s)
    }
}

fn primitive(name: &str) -> Option<TypeDescriptor> {
    let descriptor = match name {
        "bool" | "boolean" => TypeDescriptor::bool(),
        "int8" | "byte" => TypeDescriptor::int(IntWidth::W8),
        "int16" | "short" => TypeDescriptor::int(IntWidth::W16),
        "int32" | "int" => TypeDescriptor::int(IntWidth::W32),
        "int64" | "long" => TypeDescriptor::int(IntWidth::W64),
        "uint8" | "ubyte" => TypeDescriptor::uint(IntWidth::W8),
        "uint16" | "ushort" => TypeDescriptor::uint(IntWidth::W16),
        "uint32" | "uint" => TypeDescriptor::uint(IntWidth::W32),
        "uint64" | "ulong" => TypeDescriptor::uint(IntWidth::W64),
        "float" | "double" => TypeDescriptor::float(),
        "string" => TypeDescriptor::string(),
        "raw" | "binary" => TypeDescriptor::raw(),
        "object" | "any" => TypeDescriptor::object(),
        "unit" | "void" => TypeDescriptor::unit(),
        _ => return None,
    };
    Some(descriptor)
}

struct Parser<'a> {
    src: &'a str,
    pos: usize,
    depth: usize,
    registry: &'a TypeRegistry,
}

impl<'a> Parser<'a> {
    fn new(src: &'a str, registry: &'a TypeRegistry) -> Self {
        Self {
            src,
            pos: 0,
            depth: 0,
            registry,
        }
    }

    fn rest(&self) -> &'a str {
        &self.src[self.pos..]
    }

    fn skip_ws(&mut self) {
        let rest = self.rest();
        self.pos += rest.len() - rest.trim_start().len();
    }

    fn peek(&mut self) -> Option<char> {
        self.skip_ws();
        self.rest().chars().next()
    }

    fn eat(&mut self, c: char) -> bool {
        if self.peek() == Some(c) {
            self.pos += c.len_utf8();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, c: char) -> Result<(), ParseError> {
        if self.eat(c) {
            Ok(())
        } else {
            Err(self.unexpected(&format!("expected '{c}'")))
        }
    }

    fn unexpected(&mut self, message: &str) -> ParseError {
        let found = match self.peek() {
            Some(c) => format!("found '{c}'"),
            None => "found end of input".to_string(),
        };
        ParseError::Syntax {
            offset: self.pos,
            message: format!("{message}, {found}"),
        }
    }

    fn ident(&mut self) -> Result<(usize, &'a str), ParseError> {
        self.skip_ws();
        let start = self.pos;
        let rest = self.rest();
        let len = rest
            .char_indices()
            .find(|&(i, c)| !(c == '_' || c.is_ascii_alphabetic() || (i > 0 && c.is_ascii_digit())))
            .map_or(rest.len(), |(i, _)| i);
        if len == 0 {
            return Err(self.unexpected("expected a type name"));
        }
        self.pos += len;
        Ok((start, &rest[..len]))
    }

    fn finish(&mut self) -> Result<(), ParseError> {
        match self.peek() {
            None => Ok(()),
            Some(_) => Err(self.unexpected("expected end of input")),
        }
    }

    fn descriptor(&mut self) -> Result<TypeDescriptor, ParseError> {
        let (offset, name) = self.ident()?;
        let params = if self.eat('<') {
            if self.depth >= DEFAULT_MAX_DEPTH {
                return Err(ParseError::TooDeep {
                    offset,
                    max: DEFAULT_MAX_DEPTH,
                });
            }
            self.depth += 1;
            let mut params = Vec::new();
            if !self.eat('>') {
                loop {
                    params.push(self.descriptor()?);
                    if self.eat('>') {
                        break;
                    }
                    self.expect(',')?;
                }
            }
            self.depth -= 1;
            Some(params)
        } else {
            None
        };

        let arity = |expected: usize| -> Result<Vec<TypeDescriptor>, ParseError> {
            let found = params.as_ref().map_or(0, Vec::len);
            match &params {
                Some(p) if p.len() == expected => Ok(p.clone()),
                _ => Err(ParseError::WrongParameterCount {
                    offset,
                    name: name.to_string(),
                    expected,
                    found,
                }),
            }
        };

        match name {
            "nullable" | "optional" => {
                let [inner] = take::<1>(arity(1)?);
                Ok(TypeDescriptor::nullable(inner))
            }
            "list" => {
                let [element] = take::<1>(arity(1)?);
                Ok(TypeDescriptor::list(element))
            }
            "map" => {
                let [key, value] = take::<2>(arity(2)?);
                Ok(TypeDescriptor::map(key, value))
            }
            "tuple" => match params {
                Some(children) => Ok(TypeDescriptor::Tuple(children)),
                None => Err(ParseError::Syntax {
                    offset: self.pos,
                    message: "tuple requires type parameters".to_string(),
                }),
            },
            _ => {
                let descriptor = primitive(name)
                    .or_else(|| self.registry.get(name).cloned().map(TypeDescriptor::UserDefined))
                    .ok_or_else(|| ParseError::UnknownType {
                        offset,
                        name: name.to_string(),
                    })?;
                if params.is_some() {
                    arity(0)?;
                }
                Ok(descriptor)
            }
        }
    }

    fn record_declaration(&mut self) -> Result<RecordType, ParseError> {
        let (_, name) = self.ident()?;
        self.expect('{')?;
        let mut fields: Vec<(String, TypeDescriptor)> = Vec::new();
        while !self.eat('}') {
            let (_, field) = self.ident()?;
            if fields.iter().any(|(f, _)| f == field) {
                return Err(ParseError::DuplicateField {
                    record: name.to_string(),
                    field: field.to_string(),
                });
            }
            self.expect(':')?;
            let descriptor = self.descriptor()?;
            fields.push((field.to_string(), descriptor));
            if !self.eat(',') {
                self.expect('}')?;
                break;
            }
        }
        Ok(RecordType::new(name, fields))
    }
}

fn take<const N: usize>(params: Vec<TypeDescriptor>) -> [TypeDescriptor; N] {
    // Callers check the length first.
    let mut params = params.into_iter();
    std::array::from_fn(|_| params.next().unwrap_or(TypeDescriptor::Unit))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn primitives_and_aliases() {
        assert_eq!(parse_descriptor("int32").unwrap(), TypeDescriptor::int32());
        assert_eq!(parse_descriptor("int").unwrap(), TypeDescriptor::int32());
        assert_eq!(parse_descriptor(" ulong ").unwrap(), TypeDescriptor::uint64());
        assert_eq!(parse_descriptor("double").unwrap(), TypeDescriptor::float());
        assert_eq!(parse_descriptor("void").unwrap(), TypeDescriptor::unit());
    }

    #[test]
    fn display_output_parses_back() {
        for text in [
            "map<string, list<nullable<tuple<uint8, raw>>>>",
            "tuple<>",
            "tuple<bool, float, object>",
            "list<map<int64, unit>>",
        ] {
            let desc: TypeDescriptor = text.parse().unwrap();
            assert_eq!(desc.to_string(), text);
        }
    }

    #[test]
    fn records_resolve_through_registry() {
        let mut registry = TypeRegistry::new();
        let entry = registry.define("entry{key: string, value: int}").unwrap();
        assert_eq!(entry.declaration(), "entry{key: string, value: int32}");

        let desc = registry.parse("list<entry>").unwrap();
        assert_eq!(desc, TypeDescriptor::list(TypeDescriptor::UserDefined(entry)));

        let nested = registry.define("bucket{name: string, entries: list<entry>,}").unwrap();
        assert_eq!(nested.fields(), ["name", "entries"]);
        assert!(registry.get("bucket").is_some());
    }

    #[test]
    fn unknown_type_reports_offset() {
        let err = parse_descriptor("list<entry>").unwrap_err();
        assert_eq!(
            err,
            ParseError::UnknownType {
                offset: 5,
                name: "entry".to_string()
            }
        );
    }

    #[test]
    fn parameter_count_is_checked() {
        assert!(matches!(
            parse_descriptor("map<string>"),
            Err(ParseError::WrongParameterCount { expected: 2, found: 1, .. })
        ));
        assert!(matches!(
            parse_descriptor("list"),
            Err(ParseError::WrongParameterCount { expected: 1, found: 0, .. })
        ));
        assert!(matches!(
            parse_descriptor("int32<bool>"),
            Err(ParseError::WrongParameterCount { expected: 0, found: 1, .. })
        ));
    }

    #[test]
    fn syntax_errors() {
        assert!(matches!(parse_descriptor(""), Err(ParseError::Syntax { offset: 0, .. })));
        assert!(matches!(parse_descriptor("list<int32"), Err(ParseError::Syntax { offset: 10, .. })));
        assert!(matches!(parse_descriptor("int32 bool"), Err(ParseError::Syntax { offset: 6, .. })));
        assert!(matches!(parse_descriptor("tuple"), Err(ParseError::Syntax { .. })));
    }

    #[test]
    fn deep_nesting_is_rejected() {
        let deep = format!("{}int32{}", "list<".repeat(10_000), ">".repeat(10_000));
        assert!(matches!(
            parse_descriptor(&deep),
            Err(ParseError::TooDeep { max: DEFAULT_MAX_DEPTH, .. })
        ));

        let depth = DEFAULT_MAX_DEPTH;
        let limit = format!("{}int32{}", "list<".repeat(depth), ">".repeat(depth));
        let mut expected = TypeDescriptor::int32();
        for _ in 0..depth {
            expected = TypeDescriptor::list(expected);
        }
        assert_eq!(parse_descriptor(&limit).unwrap(), expected);

        let mut registry = TypeRegistry::new();
        let field = format!("{}int32{}", "list<".repeat(depth + 1), ">".repeat(depth + 1));
        assert!(matches!(
            registry.define(&format!("deep{{f: {field}}}")),
            Err(ParseError::TooDeep { .. })
        ));
    }

    #[test]
    fn duplicate_field_is_rejected() {
        let mut registry = TypeRegistry::new();
        let err = registry.define("pair{a: int32, a: string}").unwrap_err();
        assert_eq!(
            err,
            ParseError::DuplicateField {
                record: "pair".to_string(),
                field: "a".to_string()
            }
        );
        assert!(registry.get("pair").is_none());
    }
}

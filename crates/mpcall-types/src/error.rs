use std::fmt;

use mpcall_wire::WireKind;

/// Where inside a composite value an error occurred.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathSegment {
    /// Tuple or list element.
    Index(usize),
    /// Named record field.
    Field(String),
    /// Key of the n-th map entry.
    Key(usize),
    /// Value of the n-th map entry.
    Value(usize),
}

impl fmt::Display for PathSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathSegment::Index(i) => write!(f, "[{i}]"),
            PathSegment::Field(name) => write!(f, ".{name}"),
            PathSegment::Key(i) => write!(f, "key #{i}"),
            PathSegment::Value(i) => write!(f, "value #{i}"),
        }
    }
}

/// A native value does not fit its descriptor.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EncodeError {
    /// The value has the wrong kind for the descriptor.
    #[error("expected {expected}, found {found}")]
    TypeMismatch {
        expected: String,
        found: &'static str,
    },

    /// A tuple or record has the wrong number of elements.
    #[error("expected {expected} elements, found {found}")]
    ArityMismatch { expected: usize, found: usize },

    /// An integer does not fit the declared width or signedness.
    #[error("{value} is out of range for {descriptor} ({min}..={max})")]
    OutOfRange {
        value: i128,
        descriptor: String,
        min: i128,
        max: i128,
    },

    /// A record of another record type was supplied.
    #[error("expected record {expected}, found record {found}")]
    RecordMismatch { expected: String, found: String },

    /// Failure inside a composite value.
    #[error("at {segment}: {source}")]
    Nested {
        segment: PathSegment,
        source: Box<EncodeError>,
    },
}

impl EncodeError {
    /// Wrap this error with the position it occurred at.
    pub fn at(self, segment: PathSegment) -> Self {
        EncodeError::Nested {
            segment,
            source: Box::new(self),
        }
    }

    /// The innermost error, without path information.
    pub fn root_cause(&self) -> &EncodeError {
        match self {
            EncodeError::Nested { source, .. } => source.root_cause(),
            other => other,
        }
    }

    /// Full path to the failing element, e.g. `[1].value`.
    pub fn path(&self) -> String {
        let mut path = String::new();
        let mut current = self;
        while let EncodeError::Nested { segment, source } = current {
            push_segment(&mut path, segment);
            current = source;
        }
        path
    }

    pub(crate) fn relabel_top(self, names: &[String]) -> Self {
        match self {
            EncodeError::Nested {
                segment: PathSegment::Index(i),
                source,
            } if i < names.len() => EncodeError::Nested {
                segment: PathSegment::Field(names[i].clone()),
                source,
            },
            other => other,
        }
    }
}

/// A wire value does not fit the expected descriptor.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DecodeError {
    /// The wire tag does not match the expected kind.
    #[error("expected {expected}, found {found}")]
    KindMismatch { expected: String, found: WireKind },

    /// A tuple or record arrived with the wrong number of elements.
    #[error("expected {expected} elements, found {found}")]
    ArityMismatch { expected: usize, found: usize },

    /// An integer does not fit the declared width or signedness.
    #[error("{value} is out of range for {descriptor}")]
    OutOfRange { value: i128, descriptor: String },

    /// A string payload is not valid UTF-8.
    #[error("string payload is not valid utf-8")]
    InvalidUtf8,

    /// A decoded native value does not convert to the requested Rust type.
    #[error("expected {expected}, found {found} value")]
    UnexpectedValue {
        expected: String,
        found: &'static str,
    },

    /// Failure inside a composite value.
    #[error("at {segment}: {source}")]
    Nested {
        segment: PathSegment,
        source: Box<DecodeError>,
    },
}

impl DecodeError {
    /// Wrap this error with the position it occurred at.
    pub fn at(self, segment: PathSegment) -> Self {
        DecodeError::Nested {
            segment,
            source: Box::new(self),
        }
    }

    /// The innermost error, without path information.
    pub fn root_cause(&self) -> &DecodeError {
        match self {
            DecodeError::Nested { source, .. } => source.root_cause(),
            other => other,
        }
    }

    /// Full path to the failing element, e.g. `[1].value`.
    pub fn path(&self) -> String {
        let mut path = String::new();
        let mut current = self;
        while let DecodeError::Nested { segment, source } = current {
            push_segment(&mut path, segment);
            current = source;
        }
        path
    }

    pub(crate) fn relabel_top(self, names: &[String]) -> Self {
        match self {
            DecodeError::Nested {
                segment: PathSegment::Index(i),
                source,
            } if i < names.len() => DecodeError::Nested {
                segment: PathSegment::Field(names[i].clone()),
                source,
            },
            other => other,
        }
    }
}

fn push_segment(path: &mut String, segment: &PathSegment) {
    match segment {
        PathSegment::Key(_) | PathSegment::Value(_) => {
            if !path.is_empty() {
                path.push(' ');
            }
            path.push_str(&segment.to_string());
        }
        _ => path.push_str(&segment.to_string()),
    }
}

/// A descriptor or record definition in text form could not be parsed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    /// Unexpected character or token.
    #[error("syntax error at offset {offset}: {message}")]
    Syntax { offset: usize, message: String },

    /// A type name that is neither built in nor a registered record.
    #[error("unknown type '{name}' at offset {offset}")]
    UnknownType { offset: usize, name: String },

    /// A generic type was given the wrong number of parameters.
    #[error("{name} takes {expected} type parameter(s), found {found} (offset {offset})")]
    WrongParameterCount {
        offset: usize,
        name: String,
        expected: usize,
        found: usize,
    },

    /// A record declares the same field twice.
    #[error("record {record} declares field '{field}' more than once")]
    DuplicateField { record: String, field: String },

    /// Type parameters are nested deeper than the codec would accept.
    #[error("type parameters nested deeper than {max} levels (offset {offset})")]
    TooDeep { offset: usize, max: usize },
}

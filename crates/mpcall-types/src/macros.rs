/// Declare a Rust struct as a record travelling as a positional tuple.
///
/// The record type is built once, on first use, and shared by every value.
/// The wire name defaults to the struct name; `as "entry"` overrides it.
///
/// ```
/// mpcall_types::record! {
///     pub struct Entry as "entry" {
///         pub key: String,
///         pub value: i32,
///     }
/// }
///
/// let entry = Entry::new("k".to_string(), 42);
/// assert_eq!(entry.to_string(), "entry{key: k, value: 42}");
/// assert_eq!(Entry::from_wire(entry.to_wire().unwrap()).unwrap(), entry);
/// ```
#[macro_export]
macro_rules! record {
    (
        @define $wire_name:expr;
        $(#[$meta:meta])*
        $vis:vis struct $name:ident {
            $( $(#[$fmeta:meta])* $fvis:vis $field:ident : $fty:ty ),* $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq)]
        $vis struct $name {
            $( $(#[$fmeta])* $fvis $field: $fty, )*
        }

        impl $name {
            #[allow(clippy::too_many_arguments)]
            pub fn new($($field: $fty),*) -> Self {
                Self { $($field),* }
            }

            /// Shared record type of every value of this struct.
            pub fn record_type() -> ::std::sync::Arc<$crate::RecordType> {
                static TYPE: ::std::sync::OnceLock<::std::sync::Arc<$crate::RecordType>> =
                    ::std::sync::OnceLock::new();
                ::std::sync::Arc::clone(TYPE.get_or_init(|| {
                    ::std::sync::Arc::new($crate::RecordType::new(
                        $wire_name,
                        [$( (stringify!($field), <$fty as $crate::Typed>::descriptor()) ),*],
                    ))
                }))
            }

            pub fn to_wire(&self) -> ::std::result::Result<$crate::WireValue, $crate::EncodeError> {
                <Self as $crate::Typed>::encode(::std::clone::Clone::clone(self))
            }

            pub fn from_wire(wire: $crate::WireValue) -> ::std::result::Result<Self, $crate::DecodeError> {
                <Self as $crate::Typed>::decode(wire)
            }
        }

        impl $crate::Typed for $name {
            fn descriptor() -> $crate::TypeDescriptor {
                $crate::TypeDescriptor::UserDefined(Self::record_type())
            }

            fn into_value(self) -> $crate::Value {
                $crate::Value::Record($crate::Record::from_parts(
                    Self::record_type(),
                    vec![$( $crate::Typed::into_value(self.$field) ),*],
                ))
            }

            fn from_value(value: $crate::Value) -> ::std::result::Result<Self, $crate::DecodeError> {
                let values = match value {
                    $crate::Value::Record(record) => record.into_values(),
                    $crate::Value::Seq(items) => items,
                    other => {
                        return Err($crate::DecodeError::UnexpectedValue {
                            expected: $wire_name.to_string(),
                            found: other.kind_name(),
                        })
                    }
                };
                let expected = [$(stringify!($field)),*].len();
                if values.len() != expected {
                    return Err($crate::DecodeError::ArityMismatch {
                        expected,
                        found: values.len(),
                    });
                }
                let mut values = values.into_iter();
                Ok(Self {
                    $(
                        $field: $crate::Typed::from_value(values.next().unwrap_or_default())
                            .map_err(|e| e.at($crate::PathSegment::Field(stringify!($field).to_string())))?,
                    )*
                })
            }
        }

        impl ::std::fmt::Display for $name {
            fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
                let value = $crate::Typed::into_value(::std::clone::Clone::clone(self));
                ::std::fmt::Display::fmt(&value, f)
            }
        }
    };
    (
        $(#[$meta:meta])*
        $vis:vis struct $name:ident as $wire_name:literal {
            $($body:tt)*
        }
    ) => {
        $crate::record! {
            @define $wire_name;
            $(#[$meta])*
            $vis struct $name {
                $($body)*
            }
        }
    };
    (
        $(#[$meta:meta])*
        $vis:vis struct $name:ident {
            $($body:tt)*
        }
    ) => {
        $crate::record! {
            @define stringify!($name);
            $(#[$meta])*
            $vis struct $name {
                $($body)*
            }
        }
    };
}

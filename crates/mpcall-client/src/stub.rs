/// Generate a typed client stub.
///
/// Each method becomes a `ClientBase::call` with a fixed method name, fixed
/// argument descriptors and a fixed result descriptor, all derived from the
/// Rust types through [`mpcall_types::Typed`]. The stub dereferences to its
/// [`ClientBase`](crate::ClientBase), so administrative calls are available
/// too.
///
/// ```no_run
/// use mpcall_client::{service, Endpoint};
///
/// service! {
///     pub struct Counter {
///         fn incr(key: String, by: i64) -> i64;
///         fn reset() -> ();
///     }
/// }
///
/// let counter = Counter::connect(Endpoint::new("127.0.0.1", 9199).with_name("c"));
/// let n = counter.incr("hits".to_string(), 1)?;
/// # Ok::<(), mpcall_client::CallError>(())
/// ```
#[macro_export]
macro_rules! service {
    (
        $(#[$meta:meta])*
        $vis:vis struct $name:ident {
            $(
                $(#[$mmeta:meta])*
                fn $method:ident ( $($arg:ident : $aty:ty),* $(,)? ) -> $ret:ty ;
            )*
        }
    ) => {
        $(#[$meta])*
        $vis struct $name<T: $crate::Transport = $crate::TcpTransport> {
            base: $crate::ClientBase<T>,
        }

        impl $name<$crate::TcpTransport> {
            /// Stub over TCP. Connects lazily on the first call.
            pub fn connect(endpoint: $crate::Endpoint) -> Self {
                Self::from_base($crate::ClientBase::connect(endpoint))
            }

            /// `(method, argument descriptors, result descriptor)` of every
            /// method, in declaration order.
            pub fn methods() -> ::std::vec::Vec<(
                &'static str,
                ::std::vec::Vec<$crate::__types::TypeDescriptor>,
                $crate::__types::TypeDescriptor,
            )> {
                vec![$(
                    (
                        stringify!($method),
                        vec![$( <$aty as $crate::__types::Typed>::descriptor() ),*],
                        <$ret as $crate::__types::Typed>::descriptor(),
                    ),
                )*]
            }
        }

        impl<T: $crate::Transport> $name<T> {
            pub fn from_base(base: $crate::ClientBase<T>) -> Self {
                Self { base }
            }

            pub fn into_base(self) -> $crate::ClientBase<T> {
                self.base
            }

            $(
                $(#[$mmeta])*
                pub fn $method(&self, $($arg: $aty),*) -> $crate::Result<$ret> {
                    self.base.call_as::<$ret>(
                        stringify!($method),
                        &[$( $crate::__types::Typed::into_value($arg) ),*],
                        &[$( <$aty as $crate::__types::Typed>::descriptor() ),*],
                    )
                }
            )*
        }

        impl<T: $crate::Transport> ::std::ops::Deref for $name<T> {
            type Target = $crate::ClientBase<T>;

            fn deref(&self) -> &Self::Target {
                &self.base
            }
        }

        impl<T: $crate::Transport> ::std::ops::DerefMut for $name<T> {
            fn deref_mut(&mut self) -> &mut Self::Target {
                &mut self.base
            }
        }
    };
}

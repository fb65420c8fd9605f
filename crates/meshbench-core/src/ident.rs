/// Declares an opaque, copyable index type wrapping `$inner`. Leading attributes, including doc
/// comments, are applied to the generated struct.
macro_rules! identifier {
    ($(#[$meta: meta])* $name: ident, $inner: ty) => {
        $(#[$meta])*
        #[derive(
            Debug,
            Default,
            Copy,
            Clone,
            PartialOrd,
            Ord,
            PartialEq,
            Eq,
            Hash,
            derive_more::Display,
            derive_more::FromStr,
            serde::Serialize,
            serde::Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name($inner);

        impl $name {
            pub const ZERO: $name = Self::new(0);
            pub const ONE: $name = Self::new(1);

            pub const fn new(val: $inner) -> Self {
                Self(val)
            }

            /// The wrapped index.
            pub const fn inner(self) -> $inner {
                self.0
            }
        }

        impl From<$name> for $inner {
            fn from(id: $name) -> $inner {
                id.0
            }
        }
    };
}

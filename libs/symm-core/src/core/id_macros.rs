use std::sync::atomic::{AtomicU64, Ordering};

/// Opaque string identifier, e.g. ids assigned by exchange or by users.
#[macro_export]
macro_rules! string_id {
    ($name:ident) => {
        #[derive(
            Default,
            Hash,
            Eq,
            PartialEq,
            Ord,
            PartialOrd,
            Clone,
            ::serde::Serialize,
            ::serde::Deserialize,
            Debug,
        )]
        pub struct $name(String);

        impl std::ops::Deref for $name {
            type Target = String;

            fn deref(&self) -> &Self::Target {
                &self.0
            }
        }

        impl $name {
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.into())
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }
    };
}

/// Internal identifier issued from [`IdSequence`].
///
/// The prefix is only used for display, so that logs tell which table the id
/// belongs to.
#[macro_export]
macro_rules! numeric_id {
    ($name:ident, $prefix:literal) => {
        #[derive(
            Default,
            Hash,
            Eq,
            PartialEq,
            Ord,
            PartialOrd,
            Clone,
            Copy,
            ::serde::Serialize,
            ::serde::Deserialize,
            Debug,
        )]
        pub struct $name(u64);

        impl $name {
            pub fn value(&self) -> u64 {
                self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}{}", $prefix, self.0)
            }
        }

        impl From<u64> for $name {
            fn from(value: u64) -> Self {
                Self(value)
            }
        }
    };
}

/// Monotonic source of 64-bit ids, first id is 1.
#[derive(Debug, Default)]
pub struct IdSequence {
    last_id: AtomicU64,
}

impl IdSequence {
    pub fn new() -> Self {
        Self {
            last_id: AtomicU64::new(0),
        }
    }

    pub fn next_id<T>(&self) -> T
    where
        T: From<u64>,
    {
        T::from(self.last_id.fetch_add(1, Ordering::Relaxed) + 1)
    }
}

mod keystore;

pub use keystore::CacheKeystore;

use std::fmt;

/// Cache namespaces tracked by `tracked(namespace)`. Grows with the read
/// API's query surface, not with `EntityTable` — kept distinct so a future
/// namespace covering a join or aggregate doesn't have to masquerade as a
/// table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Namespace {
    Users,
    Orders,
}

impl Namespace {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Users => "users",
            Self::Orders => "orders",
        }
    }

    fn tracked_set_key(self) -> String {
        format!("tracked:{}", self.as_str())
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

//! Key Contract
//!
//! Tree records are identified by an opaque, comparable key type, an integer
//! or a string in practice. The structural algorithms never inspect key
//! contents; they only compare keys, hash them into visited sets, and ask one
//! domain question: "does this value mean *no key*?"
//!
//! That question is the `is_nullish` predicate. A parent key that is nullish
//! means "no parent"; a primary key that is nullish means "not yet persisted"
//! (a fresh insert). For integers the nullish value is zero, for strings it
//! is the empty string.

use std::fmt::{Debug, Display};
use std::hash::Hash;
use uuid::Uuid;

/// Contract for node key types.
///
/// Implementations exist for `i32`, `i64`, `u64`, and `String`. Custom key
/// types only need `Default` to mark the nullish value and `generate` to
/// produce key material for rows inserted without one.
pub trait TreeKey:
    Clone + Eq + Ord + Hash + Debug + Display + Default + Send + Sync + 'static
{
    /// True when the value means "no key": the type's default/zero value,
    /// or the empty string for text keys.
    fn is_nullish(&self) -> bool {
        *self == Self::default()
    }

    /// Produce a key for a record inserted with a nullish key.
    ///
    /// `seq` is a store-provided sequence number, strictly increasing per
    /// insert. Integer keys use it directly (autoincrement semantics);
    /// string keys ignore it and mint a v4 UUID.
    fn generate(seq: u64) -> Self;
}

impl TreeKey for i32 {
    fn generate(seq: u64) -> Self {
        seq as i32
    }
}

impl TreeKey for i64 {
    fn generate(seq: u64) -> Self {
        seq as i64
    }
}

impl TreeKey for u64 {
    fn generate(seq: u64) -> Self {
        seq
    }
}

impl TreeKey for String {
    fn is_nullish(&self) -> bool {
        self.is_empty()
    }

    fn generate(_seq: u64) -> Self {
        Uuid::new_v4().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integer_zero_is_nullish() {
        assert!(0i64.is_nullish());
        assert!(!1i64.is_nullish());
        assert!(0i32.is_nullish());
        assert!(!(-1i32).is_nullish());
    }

    #[test]
    fn empty_string_is_nullish() {
        assert!(String::new().is_nullish());
        assert!(!"root".to_string().is_nullish());
    }

    #[test]
    fn integer_keys_generate_from_sequence() {
        assert_eq!(i64::generate(7), 7);
        assert_eq!(u64::generate(42), 42);
    }

    #[test]
    fn string_keys_generate_distinct_uuids() {
        let a = String::generate(1);
        let b = String::generate(1);
        assert_ne!(a, b);
        assert!(!a.is_nullish());
    }
}

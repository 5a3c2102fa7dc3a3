//! # patricia-set
//!
//! Persistent (immutable) sets over fixed-width integer and pointer keys,
//! backed by Patricia trees.
//!
//! ## Overview
//!
//! This library provides [`PatriciaTreeSet`], a set container organized as
//! a Patricia tree (a binary radix trie over the bit representation of the
//! encoded keys). Its defining property is structural sharing: operations
//! that do not change a subtree return that exact subtree rather than a
//! content-equal copy, which makes duplicating a whole set O(1) and lets
//! equality checks skip shared branches in O(1).
//!
//! - O(1) copy of a whole set
//! - O(min(n, W)) insert, remove and contains, where W is the key width
//! - O(n + m) union, intersection and difference with subtree reuse
//! - Canonical tree shape: equal content always yields equal structure
//!
//! Mutating operations rebind the handle's root reference and never write
//! through a shared node, so previously taken copies are unaffected:
//!
//! ```rust
//! use patricia_set::PatriciaTreeSet;
//!
//! let mut set: PatriciaTreeSet<u32> = PatriciaTreeSet::new();
//! set.insert(1).insert(2).insert(3);
//!
//! let snapshot = set.clone(); // O(1), shares the whole tree
//! set.remove(&2);
//!
//! assert!(!set.contains(&2));
//! assert!(snapshot.contains(&2)); // Original version unchanged
//! ```
//!
//! Keys are anything implementing [`PatriciaKey`], a pure and injective
//! encoding into a fixed-width unsigned integer. Implementations are
//! provided for the unsigned integer types and for raw pointers (pointer
//! identity as an address).
//!
//! ## Feature Flags
//!
//! - `arc`: use `Arc` instead of `Rc` for node sharing, allowing handles
//!   to be sent across threads
//! - `serde`: Serialize/Deserialize support for [`PatriciaTreeSet`]

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
// Note: Disabling redundant_closure_for_method_calls due to clippy 0.1.92 panic bug
#![allow(clippy::redundant_closure_for_method_calls)]

// =============================================================================
// Reference Counter Type Alias
// =============================================================================

/// Reference-counted smart pointer type.
///
/// When the `arc` feature is enabled, this is `std::sync::Arc`,
/// which is thread-safe but has slightly higher overhead.
///
/// When the `arc` feature is disabled (default), this is `std::rc::Rc`,
/// which is faster but not thread-safe.
#[cfg(feature = "arc")]
pub(crate) type ReferenceCounter<T> = std::sync::Arc<T>;

#[cfg(not(feature = "arc"))]
pub(crate) type ReferenceCounter<T> = std::rc::Rc<T>;

mod key;
mod set;

pub use key::PatriciaKey;
pub use set::PatriciaTreeSet;
pub use set::PatriciaTreeSetIntoIterator;
pub use set::PatriciaTreeSetIterator;

// =============================================================================
// Tests
// =============================================================================

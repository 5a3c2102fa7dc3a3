//! Persistent (immutable) set based on a Patricia tree.
//!
//! This module provides [`PatriciaTreeSet`], an immutable set over
//! fixed-width integer and pointer keys that uses structural sharing for
//! efficient operations.
//!
//! # Overview
//!
//! `PatriciaTreeSet` is based on a Patricia tree (a binary radix trie over
//! the bit representation of the encoded keys) with the branching bit
//! always chosen as the highest differing bit. This makes the tree shape
//! canonical: two sets with the same content always have structurally
//! identical trees, regardless of the operations that built them.
//!
//! - O(min(n, W)) contains, insert and remove, where W is the key width
//! - O(n + m) union, intersection and difference
//! - O(1) duplication of a whole set
//!
//! Operations that leave a subtree unchanged return that exact subtree
//! rather than a content-equal copy, so unchanged branches stay shared
//! between versions and can be compared in O(1).
//!
//! # Examples
//!
//! ```rust
//! use patricia_set::PatriciaTreeSet;
//!
//! let mut set: PatriciaTreeSet<u32> = PatriciaTreeSet::new();
//! set.insert(1).insert(2).insert(3);
//!
//! assert!(set.contains(&1));
//! assert!(!set.contains(&4));
//!
//! // Structural sharing: copies are O(1) and unaffected by later mutation
//! let snapshot = set.clone();
//! set.remove(&2);
//! assert!(!set.contains(&2));
//! assert!(snapshot.contains(&2));
//! ```
//!
//! # Internal Structure
//!
//! The tree maintains the following invariants:
//! 1. A branch never has an empty child (the empty set is a `None` root)
//! 2. A branch's branching bit is the highest bit at which its two
//!    subtrees' keys differ; its prefix holds the bits strictly above it
//! 3. Keys with a 0 at the branching bit go left, keys with a 1 go right
//! 4. Nodes are immutable after construction and shared via
//!    reference counting; mutation only ever rebinds a handle's root

use std::fmt;
use std::iter::FromIterator;

use smallvec::SmallVec;

use crate::ReferenceCounter;
use crate::key::PatriciaKey;

// =============================================================================
// Branching-Bit Arithmetic
// =============================================================================

/// Inline capacity of the traversal work list. Trees deeper than this
/// (possible only for adversarially spread keys) spill to the heap.
const TRAVERSAL_STACK_CAPACITY: usize = 16;

/// Returns `true` if `bits` has a 0 at the branching bit.
#[inline]
const fn is_zero_bit(bits: u64, branching_bit: u64) -> bool {
    bits & branching_bit == 0
}

/// Returns the highest set bit of `bits` as a one-bit mask.
#[inline]
const fn highest_bit(bits: u64) -> u64 {
    debug_assert!(bits != 0);
    1u64 << (63 - bits.leading_zeros())
}

/// Keeps only the bits of `bits` strictly above the branching bit.
#[inline]
const fn mask_above(bits: u64, branching_bit: u64) -> u64 {
    bits & !(branching_bit | (branching_bit - 1))
}

/// Returns `true` if `bits` agrees with `prefix` on every bit strictly
/// above the branching bit.
#[inline]
const fn matches_prefix(bits: u64, prefix: u64, branching_bit: u64) -> bool {
    mask_above(bits, branching_bit) == prefix
}

// =============================================================================
// Node Definition
// =============================================================================

/// Internal node structure for the Patricia tree.
///
/// The empty set has no node at all; a one-element set is a single leaf.
/// Leaves store the key's encoding next to the key so descents never
/// re-encode.
enum Node<T> {
    /// A single element.
    Leaf { bits: u64, key: T },
    /// Two non-empty subtrees diverging at `branching_bit`.
    Branch {
        prefix: u64,
        branching_bit: u64,
        left: ReferenceCounter<Node<T>>,
        right: ReferenceCounter<Node<T>>,
    },
}

// =============================================================================
// PatriciaTreeSet Definition
// =============================================================================

/// A persistent (immutable) set based on a Patricia tree.
///
/// `PatriciaTreeSet` is a value-semantics handle over an immutable,
/// reference-counted tree. Cloning a handle copies one reference; the
/// mutating operations (`insert`, `remove`, `union_with`, ...) rebind the
/// handle's own root and never write through a shared node, so clones
/// taken earlier keep observing their version.
///
/// Elements are keyed by their [`PatriciaKey`] encoding: two elements are
/// the same element exactly when their encodings are equal.
///
/// # Time Complexity
///
/// | Operation             | Complexity        |
/// |-----------------------|-------------------|
/// | `new`                 | O(1)              |
/// | `clone`               | O(1)              |
/// | `contains`            | O(min(n, W))      |
/// | `insert`              | O(min(n, W))      |
/// | `remove`              | O(min(n, W))      |
/// | `union_with`          | O(n + m)          |
/// | `intersection_with`   | O(n + m)          |
/// | `difference_with`     | O(n + m)          |
/// | `is_subset`           | O(min(n, m))      |
/// | `len`                 | O(n)              |
/// | `is_empty`            | O(1)              |
/// | `clear`               | O(1)              |
///
/// W is the key width (64). The merge bounds are worst cases; shared
/// subtrees are compared in O(1) and skipped, so merging overlapping
/// versions of the same family of sets is typically far cheaper.
///
/// # Examples
///
/// ```rust
/// use patricia_set::PatriciaTreeSet;
///
/// let set = PatriciaTreeSet::singleton(42u32);
/// assert!(set.contains(&42));
/// assert!(!set.contains(&0));
/// ```
pub struct PatriciaTreeSet<T> {
    /// Root node of the tree; `None` is the empty set.
    root: Option<ReferenceCounter<Node<T>>>,
}

impl<T> PatriciaTreeSet<T> {
    /// Creates a new empty set.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use patricia_set::PatriciaTreeSet;
    ///
    /// let set: PatriciaTreeSet<u32> = PatriciaTreeSet::new();
    /// assert!(set.is_empty());
    /// ```
    #[inline]
    #[must_use]
    pub const fn new() -> Self {
        Self { root: None }
    }

    /// Returns the number of elements in the set.
    ///
    /// # Complexity
    ///
    /// O(n): the count is taken by a traversal; the handle does not
    /// cache a length.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use patricia_set::PatriciaTreeSet;
    ///
    /// let mut set: PatriciaTreeSet<u32> = PatriciaTreeSet::new();
    /// set.insert(1).insert(2);
    /// assert_eq!(set.len(), 2);
    /// ```
    #[must_use]
    pub fn len(&self) -> usize {
        self.root.as_ref().map_or(0, |root| Self::node_len(root))
    }

    /// Returns `true` if the set contains no elements.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use patricia_set::PatriciaTreeSet;
    ///
    /// let empty: PatriciaTreeSet<u32> = PatriciaTreeSet::new();
    /// assert!(empty.is_empty());
    /// ```
    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.root.is_none()
    }

    /// Removes all elements from the set.
    ///
    /// Only this handle's root reference is dropped; nodes shared with
    /// other handles remain alive and unchanged.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use patricia_set::PatriciaTreeSet;
    ///
    /// let mut set: PatriciaTreeSet<u32> = PatriciaTreeSet::new();
    /// set.insert(1).insert(2);
    /// let snapshot = set.clone();
    ///
    /// set.clear();
    /// assert!(set.is_empty());
    /// assert_eq!(snapshot.len(), 2);
    /// ```
    #[inline]
    pub fn clear(&mut self) {
        self.root = None;
    }

    /// Returns an iterator over the elements of the set.
    ///
    /// Elements are yielded in a deterministic depth-first order tied to
    /// the tree shape, not sorted by value. The traversal uses an
    /// explicit work list, so adversarially deep trees cannot overflow
    /// the call stack.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use patricia_set::PatriciaTreeSet;
    ///
    /// let set: PatriciaTreeSet<u32> = [3, 1, 2].into_iter().collect();
    /// let mut elements: Vec<u32> = set.iter().copied().collect();
    /// elements.sort_unstable();
    /// assert_eq!(elements, vec![1, 2, 3]);
    /// ```
    #[must_use]
    pub fn iter(&self) -> PatriciaTreeSetIterator<'_, T> {
        let mut work_list = SmallVec::new();
        if let Some(root) = &self.root {
            work_list.push(&**root);
        }
        PatriciaTreeSetIterator { work_list }
    }

    /// Returns the identity of the root node as an opaque pointer.
    ///
    /// Two handles returning the same non-null pointer share their entire
    /// tree. This accessor exists for structural-sharing verification in
    /// tests and tooling; it has no other use, and the pointer must not
    /// be interpreted.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use patricia_set::PatriciaTreeSet;
    ///
    /// let mut set: PatriciaTreeSet<u32> = (0..10).collect();
    /// let before = set.root_ptr();
    /// set.insert(5); // already present: nothing is rebuilt
    /// assert_eq!(set.root_ptr(), before);
    /// ```
    #[must_use]
    pub fn root_ptr(&self) -> *const () {
        self.root
            .as_ref()
            .map_or(std::ptr::null(), |root| {
                ReferenceCounter::as_ptr(root).cast()
            })
    }

    /// Returns `true` if `self` is a subset of `other`.
    ///
    /// Descends both trees in lockstep and answers without constructing
    /// any result tree; shared subtrees are accepted in O(1).
    ///
    /// # Complexity
    ///
    /// O(min(n, m))
    ///
    /// # Examples
    ///
    /// ```rust
    /// use patricia_set::PatriciaTreeSet;
    ///
    /// let subset: PatriciaTreeSet<u32> = [1, 2].into_iter().collect();
    /// let superset: PatriciaTreeSet<u32> = [1, 2, 3].into_iter().collect();
    ///
    /// assert!(subset.is_subset(&superset));
    /// assert!(!superset.is_subset(&subset));
    /// ```
    #[must_use]
    pub fn is_subset(&self, other: &Self) -> bool {
        match (&self.root, &other.root) {
            (None, _) => true,
            (Some(_), None) => false,
            (Some(a), Some(b)) => Self::node_is_subset(a, b),
        }
    }

    /// Returns `true` if `self` is a superset of `other`.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use patricia_set::PatriciaTreeSet;
    ///
    /// let superset: PatriciaTreeSet<u32> = [1, 2, 3].into_iter().collect();
    /// let subset: PatriciaTreeSet<u32> = [1, 2].into_iter().collect();
    ///
    /// assert!(superset.is_superset(&subset));
    /// ```
    #[inline]
    #[must_use]
    pub fn is_superset(&self, other: &Self) -> bool {
        other.is_subset(self)
    }

    /// Returns `true` if `self` and `other` have no elements in common.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use patricia_set::PatriciaTreeSet;
    ///
    /// let set_a: PatriciaTreeSet<u32> = [1, 2].into_iter().collect();
    /// let set_b: PatriciaTreeSet<u32> = [3, 4].into_iter().collect();
    ///
    /// assert!(set_a.is_disjoint(&set_b));
    /// ```
    #[must_use]
    pub fn is_disjoint(&self, other: &Self) -> bool {
        match (&self.root, &other.root) {
            (None, _) | (_, None) => true,
            (Some(a), Some(b)) => Self::nodes_disjoint(a, b),
        }
    }

    /// Retains only the elements satisfying the predicate.
    ///
    /// Subtrees in which every element survives are kept as-is, so a
    /// predicate that rejects nothing leaves the root reference
    /// untouched.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use patricia_set::PatriciaTreeSet;
    ///
    /// let mut set: PatriciaTreeSet<u32> = (0..10).collect();
    /// set.retain(|element| element % 2 == 0);
    /// assert_eq!(set.len(), 5);
    /// assert!(set.contains(&4));
    /// assert!(!set.contains(&5));
    /// ```
    pub fn retain<F>(&mut self, mut predicate: F)
    where
        F: FnMut(&T) -> bool,
    {
        let new_root = match &self.root {
            None => return,
            Some(root) => Self::filter_node(root, &mut predicate),
        };
        self.root = new_root;
    }

    /// Counting traversal.
    fn node_len(node: &Node<T>) -> usize {
        match node {
            Node::Leaf { .. } => 1,
            Node::Branch { left, right, .. } => Self::node_len(left) + Self::node_len(right),
        }
    }

    /// Membership descent. Iterative: one step per branch level.
    fn node_contains(node: &Node<T>, bits: u64) -> bool {
        let mut current = node;
        loop {
            match current {
                Node::Leaf {
                    bits: leaf_bits, ..
                } => return *leaf_bits == bits,
                Node::Branch {
                    prefix,
                    branching_bit,
                    left,
                    right,
                } => {
                    if !matches_prefix(bits, *prefix, *branching_bit) {
                        return false;
                    }
                    current = if is_zero_bit(bits, *branching_bit) {
                        left
                    } else {
                        right
                    };
                }
            }
        }
    }

    /// Structural equality. Canonical shape makes this equivalent to
    /// content equality; shared subtrees compare in O(1).
    fn nodes_equal(a: &ReferenceCounter<Node<T>>, b: &ReferenceCounter<Node<T>>) -> bool {
        if ReferenceCounter::ptr_eq(a, b) {
            return true;
        }
        match (&**a, &**b) {
            (
                Node::Leaf { bits: a_bits, .. },
                Node::Leaf { bits: b_bits, .. },
            ) => a_bits == b_bits,
            (
                Node::Branch {
                    prefix: a_prefix,
                    branching_bit: a_bit,
                    left: a_left,
                    right: a_right,
                },
                Node::Branch {
                    prefix: b_prefix,
                    branching_bit: b_bit,
                    left: b_left,
                    right: b_right,
                },
            ) => {
                a_bit == b_bit
                    && a_prefix == b_prefix
                    && Self::nodes_equal(a_left, b_left)
                    && Self::nodes_equal(a_right, b_right)
            }
            _ => false,
        }
    }

    /// Subset descent; constructs nothing and fails fast as soon as some
    /// key of `a` falls outside `b`'s coverage.
    fn node_is_subset(a: &ReferenceCounter<Node<T>>, b: &ReferenceCounter<Node<T>>) -> bool {
        if ReferenceCounter::ptr_eq(a, b) {
            return true;
        }
        match (&**a, &**b) {
            (Node::Leaf { bits, .. }, _) => Self::node_contains(b, *bits),
            // A branch holds at least two elements; a leaf holds one.
            (Node::Branch { .. }, Node::Leaf { .. }) => false,
            (
                Node::Branch {
                    prefix: a_prefix,
                    branching_bit: a_bit,
                    left: a_left,
                    right: a_right,
                },
                Node::Branch {
                    prefix: b_prefix,
                    branching_bit: b_bit,
                    left: b_left,
                    right: b_right,
                },
            ) => {
                if a_bit == b_bit && a_prefix == b_prefix {
                    Self::node_is_subset(a_left, b_left) && Self::node_is_subset(a_right, b_right)
                } else if *a_bit < *b_bit && matches_prefix(*a_prefix, *b_prefix, *b_bit) {
                    // All of a's keys fall under one child of the coarser b.
                    let selected = if is_zero_bit(*a_prefix, *b_bit) {
                        b_left
                    } else {
                        b_right
                    };
                    Self::node_is_subset(a, selected)
                } else {
                    false
                }
            }
        }
    }

    /// Disjointness descent; constructs nothing.
    fn nodes_disjoint(a: &ReferenceCounter<Node<T>>, b: &ReferenceCounter<Node<T>>) -> bool {
        if ReferenceCounter::ptr_eq(a, b) {
            return false;
        }
        match (&**a, &**b) {
            (Node::Leaf { bits, .. }, _) => !Self::node_contains(b, *bits),
            (_, Node::Leaf { bits, .. }) => !Self::node_contains(a, *bits),
            (
                Node::Branch {
                    prefix: a_prefix,
                    branching_bit: a_bit,
                    left: a_left,
                    right: a_right,
                },
                Node::Branch {
                    prefix: b_prefix,
                    branching_bit: b_bit,
                    left: b_left,
                    right: b_right,
                },
            ) => {
                if a_bit == b_bit && a_prefix == b_prefix {
                    Self::nodes_disjoint(a_left, b_left) && Self::nodes_disjoint(a_right, b_right)
                } else if *a_bit > *b_bit && matches_prefix(*b_prefix, *a_prefix, *a_bit) {
                    let selected = if is_zero_bit(*b_prefix, *a_bit) {
                        a_left
                    } else {
                        a_right
                    };
                    Self::nodes_disjoint(selected, b)
                } else if *b_bit > *a_bit && matches_prefix(*a_prefix, *b_prefix, *b_bit) {
                    let selected = if is_zero_bit(*a_prefix, *b_bit) {
                        b_left
                    } else {
                        b_right
                    };
                    Self::nodes_disjoint(a, selected)
                } else {
                    true
                }
            }
        }
    }

    /// Combines two subtrees whose key ranges diverge. The branching bit
    /// is the highest bit at which the representatives differ, which
    /// keeps the shape canonical.
    fn join(
        a_bits: u64,
        a: ReferenceCounter<Node<T>>,
        b_bits: u64,
        b: ReferenceCounter<Node<T>>,
    ) -> ReferenceCounter<Node<T>> {
        let branching_bit = highest_bit(a_bits ^ b_bits);
        let prefix = mask_above(a_bits, branching_bit);
        let (left, right) = if is_zero_bit(a_bits, branching_bit) {
            (a, b)
        } else {
            (b, a)
        };
        ReferenceCounter::new(Node::Branch {
            prefix,
            branching_bit,
            left,
            right,
        })
    }

    /// Rebuilds a branch from possibly-shrunk children, collapsing to the
    /// sole child when the other side emptied out.
    fn make_branch(
        prefix: u64,
        branching_bit: u64,
        left: Option<ReferenceCounter<Node<T>>>,
        right: Option<ReferenceCounter<Node<T>>>,
    ) -> Option<ReferenceCounter<Node<T>>> {
        match (left, right) {
            (Some(left), Some(right)) => Some(ReferenceCounter::new(Node::Branch {
                prefix,
                branching_bit,
                left,
                right,
            })),
            (None, child) | (child, None) => child,
        }
    }

    /// Filtering recursion behind [`PatriciaTreeSet::retain`]. A subtree
    /// whose elements all survive is returned as-is.
    fn filter_node<F>(
        node: &ReferenceCounter<Node<T>>,
        predicate: &mut F,
    ) -> Option<ReferenceCounter<Node<T>>>
    where
        F: FnMut(&T) -> bool,
    {
        match &**node {
            Node::Leaf { key, .. } => predicate(key).then(|| node.clone()),
            Node::Branch {
                prefix,
                branching_bit,
                left,
                right,
            } => {
                let new_left = Self::filter_node(left, predicate);
                let new_right = Self::filter_node(right, predicate);
                match (&new_left, &new_right) {
                    (Some(l), Some(r))
                        if ReferenceCounter::ptr_eq(l, left)
                            && ReferenceCounter::ptr_eq(r, right) =>
                    {
                        Some(node.clone())
                    }
                    _ => Self::make_branch(*prefix, *branching_bit, new_left, new_right),
                }
            }
        }
    }
}

impl<T: PatriciaKey + Clone> PatriciaTreeSet<T> {
    /// Creates a set containing a single element.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use patricia_set::PatriciaTreeSet;
    ///
    /// let set = PatriciaTreeSet::singleton(42u32);
    /// assert_eq!(set.len(), 1);
    /// assert!(set.contains(&42));
    /// ```
    #[must_use]
    pub fn singleton(element: T) -> Self {
        let bits = element.encode();
        Self {
            root: Some(ReferenceCounter::new(Node::Leaf { bits, key: element })),
        }
    }

    /// Returns `true` if the set contains the specified element.
    ///
    /// # Complexity
    ///
    /// O(min(n, W))
    ///
    /// # Examples
    ///
    /// ```rust
    /// use patricia_set::PatriciaTreeSet;
    ///
    /// let set: PatriciaTreeSet<u32> = [1, 2, 3].into_iter().collect();
    ///
    /// assert!(set.contains(&2));
    /// assert!(!set.contains(&4));
    /// ```
    #[must_use]
    pub fn contains(&self, element: &T) -> bool {
        self.root
            .as_ref()
            .is_some_and(|root| Self::node_contains(root, element.encode()))
    }

    /// Inserts an element into the set.
    ///
    /// Inserting an element that is already present is a no-op that keeps
    /// the root reference identical. Returns `&mut Self` so insertions
    /// can be chained.
    ///
    /// # Complexity
    ///
    /// O(min(n, W))
    ///
    /// # Examples
    ///
    /// ```rust
    /// use patricia_set::PatriciaTreeSet;
    ///
    /// let mut set: PatriciaTreeSet<u32> = PatriciaTreeSet::new();
    /// set.insert(1).insert(2).insert(2);
    /// assert_eq!(set.len(), 2);
    /// ```
    pub fn insert(&mut self, element: T) -> &mut Self {
        let bits = element.encode();
        let new_root = match &self.root {
            None => ReferenceCounter::new(Node::Leaf { bits, key: element }),
            Some(root) => Self::insert_into_node(root, bits, &element),
        };
        self.root = Some(new_root);
        self
    }

    /// Removes an element from the set.
    ///
    /// Removing an element that is absent is a no-op that keeps the root
    /// reference identical. Returns `&mut Self` so removals can be
    /// chained.
    ///
    /// # Complexity
    ///
    /// O(min(n, W))
    ///
    /// # Examples
    ///
    /// ```rust
    /// use patricia_set::PatriciaTreeSet;
    ///
    /// let mut set: PatriciaTreeSet<u32> = [1, 2, 3].into_iter().collect();
    /// set.remove(&1).remove(&3);
    /// assert_eq!(set.len(), 1);
    /// assert!(set.contains(&2));
    /// ```
    pub fn remove(&mut self, element: &T) -> &mut Self {
        let new_root = match &self.root {
            None => return self,
            Some(root) => Self::remove_from_node(root, element.encode()),
        };
        self.root = new_root;
        self
    }

    /// Adds every element of `other` to this set.
    ///
    /// Subtrees already equal on both sides are shared, not copied; if
    /// `other` is a subset of `self`, the root reference stays identical.
    ///
    /// # Complexity
    ///
    /// O(n + m) worst case, O(1) for shared subtrees
    ///
    /// # Examples
    ///
    /// ```rust
    /// use patricia_set::PatriciaTreeSet;
    ///
    /// let mut set: PatriciaTreeSet<u32> = [1, 2].into_iter().collect();
    /// let other: PatriciaTreeSet<u32> = [2, 3].into_iter().collect();
    ///
    /// set.union_with(&other);
    /// assert_eq!(set.len(), 3);
    /// ```
    pub fn union_with(&mut self, other: &Self) -> &mut Self {
        let new_root = match (&self.root, &other.root) {
            (None, _) => other.root.clone(),
            (_, None) => return self,
            (Some(a), Some(b)) => Some(Self::union_nodes(a, b)),
        };
        self.root = new_root;
        self
    }

    /// Keeps only the elements of this set that are also in `other`.
    ///
    /// # Complexity
    ///
    /// O(n + m) worst case, O(1) for shared subtrees
    ///
    /// # Examples
    ///
    /// ```rust
    /// use patricia_set::PatriciaTreeSet;
    ///
    /// let mut set: PatriciaTreeSet<u32> = [1, 2, 3].into_iter().collect();
    /// let other: PatriciaTreeSet<u32> = [2, 3, 4].into_iter().collect();
    ///
    /// set.intersection_with(&other);
    /// assert_eq!(set.len(), 2);
    /// assert!(set.contains(&2));
    /// assert!(set.contains(&3));
    /// ```
    pub fn intersection_with(&mut self, other: &Self) -> &mut Self {
        let new_root = match (&self.root, &other.root) {
            (None, _) => return self,
            (_, None) => None,
            (Some(a), Some(b)) => Self::intersect_nodes(a, b),
        };
        self.root = new_root;
        self
    }

    /// Removes every element of `other` from this set.
    ///
    /// Subtracting a disjoint set keeps the root reference identical.
    ///
    /// # Complexity
    ///
    /// O(n + m) worst case, O(1) for shared subtrees
    ///
    /// # Examples
    ///
    /// ```rust
    /// use patricia_set::PatriciaTreeSet;
    ///
    /// let mut set: PatriciaTreeSet<u32> = [1, 2, 3].into_iter().collect();
    /// let other: PatriciaTreeSet<u32> = [2, 3, 4].into_iter().collect();
    ///
    /// set.difference_with(&other);
    /// assert_eq!(set.len(), 1);
    /// assert!(set.contains(&1));
    /// ```
    pub fn difference_with(&mut self, other: &Self) -> &mut Self {
        let new_root = match (&self.root, &other.root) {
            (None, _) | (_, None) => return self,
            (Some(a), Some(b)) => Self::difference_nodes(a, b),
        };
        self.root = new_root;
        self
    }

    /// Returns the union of two sets, leaving both operands unchanged.
    ///
    /// The result shares structure with both operands.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use patricia_set::PatriciaTreeSet;
    ///
    /// let set_a: PatriciaTreeSet<u32> = [1, 2].into_iter().collect();
    /// let set_b: PatriciaTreeSet<u32> = [2, 3].into_iter().collect();
    ///
    /// let union = set_a.get_union_with(&set_b);
    /// assert_eq!(union.len(), 3);
    /// assert_eq!(set_a.len(), 2);
    /// ```
    #[must_use]
    pub fn get_union_with(&self, other: &Self) -> Self {
        let mut result = self.clone();
        result.union_with(other);
        result
    }

    /// Returns the intersection of two sets, leaving both operands
    /// unchanged.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use patricia_set::PatriciaTreeSet;
    ///
    /// let set_a: PatriciaTreeSet<u32> = [1, 2, 3].into_iter().collect();
    /// let set_b: PatriciaTreeSet<u32> = [2, 3, 4].into_iter().collect();
    ///
    /// let intersection = set_a.get_intersection_with(&set_b);
    /// assert_eq!(intersection.len(), 2);
    /// ```
    #[must_use]
    pub fn get_intersection_with(&self, other: &Self) -> Self {
        let mut result = self.clone();
        result.intersection_with(other);
        result
    }

    /// Returns the difference of two sets (elements of `self` not in
    /// `other`), leaving both operands unchanged.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use patricia_set::PatriciaTreeSet;
    ///
    /// let set_a: PatriciaTreeSet<u32> = [1, 2, 3].into_iter().collect();
    /// let set_b: PatriciaTreeSet<u32> = [2, 3, 4].into_iter().collect();
    ///
    /// let difference = set_a.get_difference_with(&set_b);
    /// assert_eq!(difference.len(), 1);
    /// assert!(difference.contains(&1));
    /// ```
    #[must_use]
    pub fn get_difference_with(&self, other: &Self) -> Self {
        let mut result = self.clone();
        result.difference_with(other);
        result
    }

    /// Insertion recursion. Returns the original node untouched whenever
    /// the key was already present below it.
    fn insert_into_node(
        node: &ReferenceCounter<Node<T>>,
        bits: u64,
        element: &T,
    ) -> ReferenceCounter<Node<T>> {
        match &**node {
            Node::Leaf {
                bits: leaf_bits, ..
            } => {
                if *leaf_bits == bits {
                    node.clone()
                } else {
                    Self::join(
                        bits,
                        ReferenceCounter::new(Node::Leaf {
                            bits,
                            key: element.clone(),
                        }),
                        *leaf_bits,
                        node.clone(),
                    )
                }
            }
            Node::Branch {
                prefix,
                branching_bit,
                left,
                right,
            } => {
                if matches_prefix(bits, *prefix, *branching_bit) {
                    if is_zero_bit(bits, *branching_bit) {
                        let new_left = Self::insert_into_node(left, bits, element);
                        if ReferenceCounter::ptr_eq(&new_left, left) {
                            node.clone()
                        } else {
                            ReferenceCounter::new(Node::Branch {
                                prefix: *prefix,
                                branching_bit: *branching_bit,
                                left: new_left,
                                right: right.clone(),
                            })
                        }
                    } else {
                        let new_right = Self::insert_into_node(right, bits, element);
                        if ReferenceCounter::ptr_eq(&new_right, right) {
                            node.clone()
                        } else {
                            ReferenceCounter::new(Node::Branch {
                                prefix: *prefix,
                                branching_bit: *branching_bit,
                                left: left.clone(),
                                right: new_right,
                            })
                        }
                    }
                } else {
                    // The key diverges above this whole branch.
                    Self::join(
                        bits,
                        ReferenceCounter::new(Node::Leaf {
                            bits,
                            key: element.clone(),
                        }),
                        *prefix,
                        node.clone(),
                    )
                }
            }
        }
    }

    /// Removal recursion. `None` means the subtree emptied out; removing
    /// an absent key returns the original node untouched.
    fn remove_from_node(
        node: &ReferenceCounter<Node<T>>,
        bits: u64,
    ) -> Option<ReferenceCounter<Node<T>>> {
        match &**node {
            Node::Leaf {
                bits: leaf_bits, ..
            } => {
                if *leaf_bits == bits {
                    None
                } else {
                    Some(node.clone())
                }
            }
            Node::Branch {
                prefix,
                branching_bit,
                left,
                right,
            } => {
                if !matches_prefix(bits, *prefix, *branching_bit) {
                    // The key cannot be in this subtree.
                    Some(node.clone())
                } else if is_zero_bit(bits, *branching_bit) {
                    let new_left = Self::remove_from_node(left, bits);
                    match new_left {
                        Some(ref l) if ReferenceCounter::ptr_eq(l, left) => Some(node.clone()),
                        new_left => Self::make_branch(
                            *prefix,
                            *branching_bit,
                            new_left,
                            Some(right.clone()),
                        ),
                    }
                } else {
                    let new_right = Self::remove_from_node(right, bits);
                    match new_right {
                        Some(ref r) if ReferenceCounter::ptr_eq(r, right) => Some(node.clone()),
                        new_right => Self::make_branch(
                            *prefix,
                            *branching_bit,
                            Some(left.clone()),
                            new_right,
                        ),
                    }
                }
            }
        }
    }

    /// Union merge. Returns one of the operand nodes untouched whenever
    /// the union adds nothing to it.
    fn union_nodes(
        a: &ReferenceCounter<Node<T>>,
        b: &ReferenceCounter<Node<T>>,
    ) -> ReferenceCounter<Node<T>> {
        if ReferenceCounter::ptr_eq(a, b) {
            return a.clone();
        }
        match (&**a, &**b) {
            // b-leaf before a-leaf: inserting into a returns a untouched
            // whenever b adds nothing.
            (_, Node::Leaf { bits, key }) => Self::insert_into_node(a, *bits, key),
            (Node::Leaf { bits, key }, _) => Self::insert_into_node(b, *bits, key),
            (
                Node::Branch {
                    prefix: a_prefix,
                    branching_bit: a_bit,
                    left: a_left,
                    right: a_right,
                },
                Node::Branch {
                    prefix: b_prefix,
                    branching_bit: b_bit,
                    left: b_left,
                    right: b_right,
                },
            ) => {
                if a_bit == b_bit && a_prefix == b_prefix {
                    // Same split point: merge children pairwise.
                    let new_left = Self::union_nodes(a_left, b_left);
                    let new_right = Self::union_nodes(a_right, b_right);
                    if ReferenceCounter::ptr_eq(&new_left, a_left)
                        && ReferenceCounter::ptr_eq(&new_right, a_right)
                    {
                        a.clone()
                    } else if ReferenceCounter::ptr_eq(&new_left, b_left)
                        && ReferenceCounter::ptr_eq(&new_right, b_right)
                    {
                        b.clone()
                    } else {
                        ReferenceCounter::new(Node::Branch {
                            prefix: *a_prefix,
                            branching_bit: *a_bit,
                            left: new_left,
                            right: new_right,
                        })
                    }
                } else if *a_bit > *b_bit && matches_prefix(*b_prefix, *a_prefix, *a_bit) {
                    // b's whole range falls under one child of the coarser a.
                    if is_zero_bit(*b_prefix, *a_bit) {
                        let new_left = Self::union_nodes(a_left, b);
                        if ReferenceCounter::ptr_eq(&new_left, a_left) {
                            a.clone()
                        } else {
                            ReferenceCounter::new(Node::Branch {
                                prefix: *a_prefix,
                                branching_bit: *a_bit,
                                left: new_left,
                                right: a_right.clone(),
                            })
                        }
                    } else {
                        let new_right = Self::union_nodes(a_right, b);
                        if ReferenceCounter::ptr_eq(&new_right, a_right) {
                            a.clone()
                        } else {
                            ReferenceCounter::new(Node::Branch {
                                prefix: *a_prefix,
                                branching_bit: *a_bit,
                                left: a_left.clone(),
                                right: new_right,
                            })
                        }
                    }
                } else if *b_bit > *a_bit && matches_prefix(*a_prefix, *b_prefix, *b_bit) {
                    // a's whole range falls under one child of the coarser b.
                    if is_zero_bit(*a_prefix, *b_bit) {
                        let new_left = Self::union_nodes(a, b_left);
                        if ReferenceCounter::ptr_eq(&new_left, b_left) {
                            b.clone()
                        } else {
                            ReferenceCounter::new(Node::Branch {
                                prefix: *b_prefix,
                                branching_bit: *b_bit,
                                left: new_left,
                                right: b_right.clone(),
                            })
                        }
                    } else {
                        let new_right = Self::union_nodes(a, b_right);
                        if ReferenceCounter::ptr_eq(&new_right, b_right) {
                            b.clone()
                        } else {
                            ReferenceCounter::new(Node::Branch {
                                prefix: *b_prefix,
                                branching_bit: *b_bit,
                                left: b_left.clone(),
                                right: new_right,
                            })
                        }
                    }
                } else {
                    // Disjoint ranges: combine both trees as opaque subtrees.
                    Self::join(*a_prefix, a.clone(), *b_prefix, b.clone())
                }
            }
        }
    }

    /// Intersection merge. `None` means the intersection is empty.
    fn intersect_nodes(
        a: &ReferenceCounter<Node<T>>,
        b: &ReferenceCounter<Node<T>>,
    ) -> Option<ReferenceCounter<Node<T>>> {
        if ReferenceCounter::ptr_eq(a, b) {
            return Some(a.clone());
        }
        match (&**a, &**b) {
            (Node::Leaf { bits, .. }, _) => {
                Self::node_contains(b, *bits).then(|| a.clone())
            }
            (_, Node::Leaf { bits, .. }) => {
                Self::node_contains(a, *bits).then(|| b.clone())
            }
            (
                Node::Branch {
                    prefix: a_prefix,
                    branching_bit: a_bit,
                    left: a_left,
                    right: a_right,
                },
                Node::Branch {
                    prefix: b_prefix,
                    branching_bit: b_bit,
                    left: b_left,
                    right: b_right,
                },
            ) => {
                if a_bit == b_bit && a_prefix == b_prefix {
                    let new_left = Self::intersect_nodes(a_left, b_left);
                    let new_right = Self::intersect_nodes(a_right, b_right);
                    match (&new_left, &new_right) {
                        (Some(l), Some(r))
                            if ReferenceCounter::ptr_eq(l, a_left)
                                && ReferenceCounter::ptr_eq(r, a_right) =>
                        {
                            Some(a.clone())
                        }
                        (Some(l), Some(r))
                            if ReferenceCounter::ptr_eq(l, b_left)
                                && ReferenceCounter::ptr_eq(r, b_right) =>
                        {
                            Some(b.clone())
                        }
                        _ => Self::make_branch(*a_prefix, *a_bit, new_left, new_right),
                    }
                } else if *a_bit > *b_bit && matches_prefix(*b_prefix, *a_prefix, *a_bit) {
                    // Only the overlapping child of the coarser a can
                    // contribute; its sibling is pruned implicitly.
                    let selected = if is_zero_bit(*b_prefix, *a_bit) {
                        a_left
                    } else {
                        a_right
                    };
                    Self::intersect_nodes(selected, b)
                } else if *b_bit > *a_bit && matches_prefix(*a_prefix, *b_prefix, *b_bit) {
                    let selected = if is_zero_bit(*a_prefix, *b_bit) {
                        b_left
                    } else {
                        b_right
                    };
                    Self::intersect_nodes(a, selected)
                } else {
                    None
                }
            }
        }
    }

    /// Difference merge. `None` means nothing of `a` survived; removing
    /// a disjoint set returns `a` untouched.
    fn difference_nodes(
        a: &ReferenceCounter<Node<T>>,
        b: &ReferenceCounter<Node<T>>,
    ) -> Option<ReferenceCounter<Node<T>>> {
        if ReferenceCounter::ptr_eq(a, b) {
            return None;
        }
        match (&**a, &**b) {
            (Node::Leaf { bits, .. }, _) => {
                if Self::node_contains(b, *bits) {
                    None
                } else {
                    Some(a.clone())
                }
            }
            (_, Node::Leaf { bits, .. }) => Self::remove_from_node(a, *bits),
            (
                Node::Branch {
                    prefix: a_prefix,
                    branching_bit: a_bit,
                    left: a_left,
                    right: a_right,
                },
                Node::Branch {
                    prefix: b_prefix,
                    branching_bit: b_bit,
                    left: b_left,
                    right: b_right,
                },
            ) => {
                if a_bit == b_bit && a_prefix == b_prefix {
                    let new_left = Self::difference_nodes(a_left, b_left);
                    let new_right = Self::difference_nodes(a_right, b_right);
                    match (&new_left, &new_right) {
                        (Some(l), Some(r))
                            if ReferenceCounter::ptr_eq(l, a_left)
                                && ReferenceCounter::ptr_eq(r, a_right) =>
                        {
                            Some(a.clone())
                        }
                        _ => Self::make_branch(*a_prefix, *a_bit, new_left, new_right),
                    }
                } else if *a_bit > *b_bit && matches_prefix(*b_prefix, *a_prefix, *a_bit) {
                    // b can only reach one child of the coarser a.
                    if is_zero_bit(*b_prefix, *a_bit) {
                        let new_left = Self::difference_nodes(a_left, b);
                        match new_left {
                            Some(ref l) if ReferenceCounter::ptr_eq(l, a_left) => Some(a.clone()),
                            new_left => Self::make_branch(
                                *a_prefix,
                                *a_bit,
                                new_left,
                                Some(a_right.clone()),
                            ),
                        }
                    } else {
                        let new_right = Self::difference_nodes(a_right, b);
                        match new_right {
                            Some(ref r) if ReferenceCounter::ptr_eq(r, a_right) => Some(a.clone()),
                            new_right => Self::make_branch(
                                *a_prefix,
                                *a_bit,
                                Some(a_left.clone()),
                                new_right,
                            ),
                        }
                    }
                } else if *b_bit > *a_bit && matches_prefix(*a_prefix, *b_prefix, *b_bit) {
                    // Only one child of the coarser b overlaps a.
                    let selected = if is_zero_bit(*a_prefix, *b_bit) {
                        b_left
                    } else {
                        b_right
                    };
                    Self::difference_nodes(a, selected)
                } else {
                    Some(a.clone())
                }
            }
        }
    }
}

// =============================================================================
// Iterator Implementation
// =============================================================================

/// An iterator over the elements of a [`PatriciaTreeSet`].
///
/// Lazy depth-first traversal over an explicit work list; elements appear
/// in a deterministic order tied to the tree shape, not sorted by value.
pub struct PatriciaTreeSetIterator<'a, T> {
    work_list: SmallVec<[&'a Node<T>; TRAVERSAL_STACK_CAPACITY]>,
}

impl<'a, T> Iterator for PatriciaTreeSetIterator<'a, T> {
    type Item = &'a T;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            match self.work_list.pop()? {
                Node::Leaf { key, .. } => return Some(key),
                Node::Branch { left, right, .. } => {
                    // Right below left so the left subtree is yielded first.
                    self.work_list.push(right);
                    self.work_list.push(left);
                }
            }
        }
    }
}

/// An owning iterator over the elements of a [`PatriciaTreeSet`].
pub struct PatriciaTreeSetIntoIterator<T> {
    work_list: SmallVec<[ReferenceCounter<Node<T>>; TRAVERSAL_STACK_CAPACITY]>,
}

impl<T: Clone> Iterator for PatriciaTreeSetIntoIterator<T> {
    type Item = T;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let node = self.work_list.pop()?;
            match &*node {
                Node::Leaf { key, .. } => return Some(key.clone()),
                Node::Branch { left, right, .. } => {
                    self.work_list.push(right.clone());
                    self.work_list.push(left.clone());
                }
            }
        }
    }
}

// =============================================================================
// Standard Trait Implementations
// =============================================================================

impl<T> Clone for PatriciaTreeSet<T> {
    // Copies the handle, not the tree: O(1), shares all nodes.
    #[inline]
    fn clone(&self) -> Self {
        Self {
            root: self.root.clone(),
        }
    }
}

impl<T> Default for PatriciaTreeSet<T> {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

impl<T: PatriciaKey + Clone> FromIterator<T> for PatriciaTreeSet<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iterable: I) -> Self {
        let mut set = Self::new();
        set.extend(iterable);
        set
    }
}

impl<T: PatriciaKey + Clone> Extend<T> for PatriciaTreeSet<T> {
    fn extend<I: IntoIterator<Item = T>>(&mut self, iterable: I) {
        for element in iterable {
            self.insert(element);
        }
    }
}

impl<T: Clone> IntoIterator for PatriciaTreeSet<T> {
    type Item = T;
    type IntoIter = PatriciaTreeSetIntoIterator<T>;

    fn into_iter(self) -> Self::IntoIter {
        let mut work_list = SmallVec::new();
        if let Some(root) = self.root {
            work_list.push(root);
        }
        PatriciaTreeSetIntoIterator { work_list }
    }
}

impl<'a, T> IntoIterator for &'a PatriciaTreeSet<T> {
    type Item = &'a T;
    type IntoIter = PatriciaTreeSetIterator<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<T> PartialEq for PatriciaTreeSet<T> {
    // Content equality. Identical roots answer in O(1); otherwise the
    // canonical shape reduces this to a structural comparison that skips
    // shared subtrees.
    fn eq(&self, other: &Self) -> bool {
        match (&self.root, &other.root) {
            (None, None) => true,
            (Some(a), Some(b)) => Self::nodes_equal(a, b),
            _ => false,
        }
    }
}

impl<T> Eq for PatriciaTreeSet<T> {}

impl<T: fmt::Debug> fmt::Debug for PatriciaTreeSet<T> {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.debug_set().entries(self.iter()).finish()
    }
}

impl<T: fmt::Display> fmt::Display for PatriciaTreeSet<T> {
    // Renders `{k1, k2, ..., kn}` in traversal order; `{}` when empty.
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "{{")?;
        let mut first = true;
        for element in self {
            if first {
                first = false;
            } else {
                write!(formatter, ", ")?;
            }
            write!(formatter, "{element}")?;
        }
        write!(formatter, "}}")
    }
}

// =============================================================================
// Serde Support
// =============================================================================

#[cfg(feature = "serde")]
impl<T: serde::Serialize> serde::Serialize for PatriciaTreeSet<T> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use serde::ser::SerializeSeq;
        let mut seq = serializer.serialize_seq(Some(self.len()))?;
        for element in self {
            seq.serialize_element(element)?;
        }
        seq.end()
    }
}

#[cfg(feature = "serde")]
struct PatriciaTreeSetVisitor<T> {
    marker: std::marker::PhantomData<T>,
}

#[cfg(feature = "serde")]
impl<T> PatriciaTreeSetVisitor<T> {
    const fn new() -> Self {
        Self {
            marker: std::marker::PhantomData,
        }
    }
}

#[cfg(feature = "serde")]
impl<'de, T> serde::de::Visitor<'de> for PatriciaTreeSetVisitor<T>
where
    T: serde::Deserialize<'de> + PatriciaKey + Clone,
{
    type Value = PatriciaTreeSet<T>;

    fn expecting(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
        formatter.write_str("a sequence")
    }

    fn visit_seq<A>(self, mut seq: A) -> Result<Self::Value, A::Error>
    where
        A: serde::de::SeqAccess<'de>,
    {
        let mut set = PatriciaTreeSet::new();
        while let Some(element) = seq.next_element()? {
            set.insert(element);
        }
        Ok(set)
    }
}

#[cfg(feature = "serde")]
impl<'de, T> serde::Deserialize<'de> for PatriciaTreeSet<T>
where
    T: serde::Deserialize<'de> + PatriciaKey + Clone,
{
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        deserializer.deserialize_seq(PatriciaTreeSetVisitor::new())
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn set_of(elements: &[u32]) -> PatriciaTreeSet<u32> {
        elements.iter().copied().collect()
    }

    fn sorted_elements(set: &PatriciaTreeSet<u32>) -> Vec<u32> {
        let mut elements: Vec<u32> = set.iter().copied().collect();
        elements.sort_unstable();
        elements
    }

    // =========================================================================
    // Display Tests
    // =========================================================================

    #[rstest]
    fn test_display_empty_set() {
        let set: PatriciaTreeSet<u32> = PatriciaTreeSet::new();
        assert_eq!(format!("{set}"), "{}");
    }

    #[rstest]
    fn test_display_single_element_set() {
        let set = PatriciaTreeSet::singleton(42u32);
        assert_eq!(format!("{set}"), "{42}");
    }

    #[rstest]
    fn test_display_renders_traversal_order() {
        // The canonical tree for {0, 2, 3, 1023} lists its elements in
        // exactly this depth-first order.
        let set = set_of(&[1023, 3, 0, 2]);
        assert_eq!(format!("{set}"), "{0, 2, 3, 1023}");
    }

    // =========================================================================
    // Basic Operations
    // =========================================================================

    #[rstest]
    fn test_new_creates_empty() {
        let set: PatriciaTreeSet<u32> = PatriciaTreeSet::new();
        assert!(set.is_empty());
        assert_eq!(set.len(), 0);
    }

    #[rstest]
    fn test_singleton() {
        let set = PatriciaTreeSet::singleton(42u32);
        assert_eq!(set.len(), 1);
        assert!(set.contains(&42));
    }

    #[rstest]
    fn test_insert_and_contains() {
        let mut set: PatriciaTreeSet<u32> = PatriciaTreeSet::new();
        set.insert(1).insert(2).insert(3);

        assert_eq!(set.len(), 3);
        assert!(set.contains(&1));
        assert!(set.contains(&2));
        assert!(set.contains(&3));
        assert!(!set.contains(&4));
    }

    #[rstest]
    fn test_insert_duplicate_is_noop() {
        let mut set = set_of(&[1, 2, 3]);
        set.insert(2);
        assert_eq!(set.len(), 3);
    }

    #[rstest]
    fn test_remove() {
        let mut set = set_of(&[1, 2]);
        set.remove(&1);

        assert_eq!(set.len(), 1);
        assert!(!set.contains(&1));
        assert!(set.contains(&2));
    }

    #[rstest]
    fn test_remove_absent_is_noop() {
        let mut set = set_of(&[1, 2]);
        set.remove(&17);
        assert_eq!(sorted_elements(&set), vec![1, 2]);
    }

    #[rstest]
    fn test_remove_last_element_leaves_empty_set() {
        let mut set = PatriciaTreeSet::singleton(7u32);
        set.remove(&7);
        assert!(set.is_empty());
        assert_eq!(set.root_ptr(), std::ptr::null());
    }

    #[rstest]
    fn test_clear() {
        let mut set = set_of(&[1, 2, 3]);
        set.clear();
        assert!(set.is_empty());
        assert_eq!(set.len(), 0);
    }

    #[rstest]
    fn test_extreme_keys() {
        let mut set: PatriciaTreeSet<u64> = PatriciaTreeSet::new();
        set.insert(0).insert(u64::MAX).insert(1u64 << 63);

        assert_eq!(set.len(), 3);
        assert!(set.contains(&0));
        assert!(set.contains(&u64::MAX));
        assert!(set.contains(&(1u64 << 63)));
    }

    // =========================================================================
    // Set Operations
    // =========================================================================

    #[rstest]
    fn test_union_with() {
        let mut set = set_of(&[1, 2]);
        set.union_with(&set_of(&[2, 3]));
        assert_eq!(sorted_elements(&set), vec![1, 2, 3]);
    }

    #[rstest]
    fn test_intersection_with() {
        let mut set = set_of(&[1, 2, 3]);
        set.intersection_with(&set_of(&[2, 3, 4]));
        assert_eq!(sorted_elements(&set), vec![2, 3]);
    }

    #[rstest]
    fn test_difference_with() {
        let mut set = set_of(&[1, 2, 3]);
        set.difference_with(&set_of(&[2, 3, 4]));
        assert_eq!(sorted_elements(&set), vec![1]);
    }

    #[rstest]
    fn test_intersection_of_disjoint_sets_is_empty() {
        let set = set_of(&[1, 2]).get_intersection_with(&set_of(&[3, 4]));
        assert!(set.is_empty());
    }

    #[rstest]
    fn test_get_variants_leave_operands_unchanged() {
        let set_a = set_of(&[1, 2]);
        let set_b = set_of(&[2, 3]);

        let union = set_a.get_union_with(&set_b);
        let intersection = set_a.get_intersection_with(&set_b);
        let difference = set_a.get_difference_with(&set_b);

        assert_eq!(sorted_elements(&union), vec![1, 2, 3]);
        assert_eq!(sorted_elements(&intersection), vec![2]);
        assert_eq!(sorted_elements(&difference), vec![1]);
        assert_eq!(sorted_elements(&set_a), vec![1, 2]);
        assert_eq!(sorted_elements(&set_b), vec![2, 3]);
    }

    #[rstest]
    fn test_subset_superset_disjoint() {
        let small = set_of(&[1, 2]);
        let large = set_of(&[1, 2, 3]);
        let other = set_of(&[10, 11]);

        assert!(small.is_subset(&large));
        assert!(!large.is_subset(&small));
        assert!(large.is_superset(&small));
        assert!(small.is_disjoint(&other));
        assert!(!small.is_disjoint(&large));
    }

    #[rstest]
    fn test_retain() {
        let mut set: PatriciaTreeSet<u32> = (0..100).collect();
        set.retain(|element| element % 10 == 0);
        assert_eq!(
            sorted_elements(&set),
            vec![0, 10, 20, 30, 40, 50, 60, 70, 80, 90]
        );
    }

    // =========================================================================
    // Structural Sharing
    // =========================================================================

    #[rstest]
    fn test_clone_shares_root() {
        let set = set_of(&[1, 2, 3]);
        let copy = set.clone();
        assert_eq!(set.root_ptr(), copy.root_ptr());
    }

    #[rstest]
    fn test_reinsert_present_key_keeps_root_identity() {
        let mut set = set_of(&[1, 2, 3]);
        let before = set.root_ptr();
        set.insert(2);
        assert_eq!(set.root_ptr(), before);
    }

    #[rstest]
    fn test_remove_absent_key_keeps_root_identity() {
        let mut set = set_of(&[1, 2, 3]);
        let before = set.root_ptr();
        set.remove(&157);
        assert_eq!(set.root_ptr(), before);
    }

    #[rstest]
    fn test_self_union_and_intersection_keep_root_identity() {
        let set = set_of(&[5, 17, 23, 99, 1024]);
        assert_eq!(set.get_union_with(&set).root_ptr(), set.root_ptr());
        assert_eq!(set.get_intersection_with(&set).root_ptr(), set.root_ptr());
    }

    #[rstest]
    fn test_union_with_subset_keeps_root_identity() {
        let mut set = set_of(&[1, 2, 3, 4]);
        let before = set.root_ptr();
        set.union_with(&set_of(&[2, 4]));
        assert_eq!(set.root_ptr(), before);
    }

    #[rstest]
    fn test_difference_with_disjoint_set_keeps_root_identity() {
        let mut set = set_of(&[1, 2, 3]);
        let before = set.root_ptr();
        set.difference_with(&set_of(&[64, 65]));
        assert_eq!(set.root_ptr(), before);
    }

    #[rstest]
    fn test_retain_all_keeps_root_identity() {
        let mut set = set_of(&[1, 2, 3]);
        let before = set.root_ptr();
        set.retain(|_| true);
        assert_eq!(set.root_ptr(), before);
    }

    // =========================================================================
    // Persistence
    // =========================================================================

    #[rstest]
    fn test_mutating_a_copy_leaves_the_original_untouched() {
        let original = set_of(&[0, 1, 2, 3, 4, 1023, u32::MAX]);
        let mut copy = original.clone();
        copy.remove(&1).remove(&4).remove(&u32::MAX);

        assert_eq!(
            sorted_elements(&original),
            vec![0, 1, 2, 3, 4, 1023, u32::MAX]
        );
        assert_eq!(sorted_elements(&copy), vec![0, 2, 3, 1023]);
        assert_eq!(format!("{copy}"), "{0, 2, 3, 1023}");
    }

    // =========================================================================
    // Equality
    // =========================================================================

    #[rstest]
    fn test_equality_is_content_based() {
        // Same content built in different orders yields equal (and
        // structurally identical) trees.
        let forward: PatriciaTreeSet<u32> = (0..50).collect();
        let backward: PatriciaTreeSet<u32> = (0..50).rev().collect();
        assert_eq!(forward, backward);
    }

    #[rstest]
    fn test_equality_distinguishes_content() {
        assert_ne!(set_of(&[1, 2]), set_of(&[1, 3]));
        assert_ne!(set_of(&[1, 2]), set_of(&[1]));
        assert_ne!(set_of(&[]), set_of(&[1]));
        assert_eq!(set_of(&[]), set_of(&[]));
    }

    // =========================================================================
    // Iteration
    // =========================================================================

    #[rstest]
    fn test_iteration_is_deterministic_and_restartable() {
        let set: PatriciaTreeSet<u32> = (0..100).collect();
        let first_pass: Vec<u32> = set.iter().copied().collect();
        let second_pass: Vec<u32> = set.iter().copied().collect();
        assert_eq!(first_pass, second_pass);
        assert_eq!(first_pass.len(), 100);
    }

    #[rstest]
    fn test_into_iterator_yields_owned_elements() {
        let set = set_of(&[1, 2, 3]);
        let mut elements: Vec<u32> = set.into_iter().collect();
        elements.sort_unstable();
        assert_eq!(elements, vec![1, 2, 3]);
    }

    #[rstest]
    fn test_deep_tree_iteration_does_not_recurse() {
        // Keys chosen one bit apart produce the deepest possible spine.
        let set: PatriciaTreeSet<u64> = (0..64).map(|shift| 1u64 << shift).collect();
        assert_eq!(set.len(), 64);
        assert_eq!(set.iter().count(), 64);
    }
}

//! Ordered, duplicate-free groupings of topology entities.
//!
//! A [`Collection`] is homogeneous in two dimensions: it holds exactly one
//! entity type, and every member belongs to the same resource. Violating
//! either is a programming error in the test and fails fast with a panic.

use std::ops::Range;

use crate::topology::Entity;
use crate::Result;

#[derive(Debug, Clone)]
pub struct Collection<T: Entity> {
    members: Vec<T>,
}

impl<T: Entity> Collection<T> {
    pub fn new() -> Self {
        Self { members: Vec::new() }
    }

    /// Build a collection from the given members, deduplicating while
    /// preserving first-seen order.
    pub fn from_members<I: IntoIterator<Item = T>>(members: I) -> Self {
        let mut collection = Self::new();
        collection.extend(members);
        collection
    }

    fn assert_same_resource(&self, member: T) {
        if let Some(first) = self.members.first() {
            assert_eq!(
                first.resource(),
                member.resource(),
                "collection members must belong to the same resource"
            );
        }
    }

    /// Add one member. Duplicates are ignored, so adding twice leaves the
    /// size unchanged.
    pub fn add(&mut self, member: T) -> &mut Self {
        self.assert_same_resource(member);
        if !self.members.contains(&member) {
            self.members.push(member);
        }
        self
    }

    /// Remove one member if present.
    pub fn remove(&mut self, member: T) -> &mut Self {
        self.assert_same_resource(member);
        self.members.retain(|m| *m != member);
        self
    }

    /// Bulk add. The whole batch is validated against the resource
    /// invariant before any member is inserted.
    pub fn extend<I: IntoIterator<Item = T>>(&mut self, members: I) -> &mut Self {
        let batch: Vec<T> = members.into_iter().collect();
        if let Some(reference) = self.members.first().or_else(|| batch.first()) {
            for member in &batch {
                assert_eq!(
                    reference.resource(),
                    member.resource(),
                    "collection members must belong to the same resource"
                );
            }
        }
        for member in batch {
            if !self.members.contains(&member) {
                self.members.push(member);
            }
        }
        self
    }

    /// A new collection without the given members. The original is left
    /// unmodified.
    pub fn difference<I: IntoIterator<Item = T>>(&self, members: I) -> Self {
        let removed: Vec<T> = members.into_iter().collect();
        Self {
            members: self
                .members
                .iter()
                .filter(|m| !removed.contains(m))
                .copied()
                .collect(),
        }
    }

    pub fn contains(&self, member: T) -> bool {
        self.members.contains(&member)
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = T> + '_ {
        self.members.iter().copied()
    }

    pub fn get(&self, index: usize) -> Option<T> {
        self.members.get(index).copied()
    }

    pub fn first(&self) -> Option<T> {
        self.members.first().copied()
    }

    pub fn slice(&self, range: Range<usize>) -> Self {
        Self {
            members: self.members[range].to_vec(),
        }
    }

    /// Remove and return the first member.
    pub fn pop(&mut self) -> Option<T> {
        if self.members.is_empty() {
            return None;
        }
        Some(self.members.remove(0))
    }

    /// Keep only the members the predicate accepts, as a new collection.
    pub fn filtered(&self, mut predicate: impl FnMut(T) -> bool) -> Self {
        Self {
            members: self.members.iter().copied().filter(|m| predicate(*m)).collect(),
        }
    }

    /// The "property union": flatten a per-member sub-collection into one
    /// derived collection, deduplicated in first-seen order. This is how
    /// nodes-to-volumes and similar derivations are expressed.
    pub fn union_map<U: Entity>(&self, mut f: impl FnMut(T) -> Collection<U>) -> Collection<U> {
        let mut result = Collection::new();
        for member in self.iter() {
            result.extend(f(member).iter());
        }
        result
    }

    /// Run a fallible operation over every member in iteration order,
    /// short-circuiting on the first error. The explicit replacement for
    /// per-entity batch dispatch.
    pub fn for_each_try(&self, mut f: impl FnMut(T) -> Result<()>) -> Result<()> {
        for member in self.iter() {
            f(member)?;
        }
        Ok(())
    }
}

impl<T: Entity> Default for Collection<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Entity> FromIterator<T> for Collection<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Self::from_members(iter)
    }
}

impl<'a, T: Entity> IntoIterator for &'a Collection<T> {
    type Item = T;
    type IntoIter = std::iter::Copied<std::slice::Iter<'a, T>>;

    fn into_iter(self) -> Self::IntoIter {
        self.members.iter().copied()
    }
}

impl<T: Entity> PartialEq for Collection<T> {
    fn eq(&self, other: &Self) -> bool {
        self.members == other.members
    }
}

impl<T: Entity> std::fmt::Display for Collection<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut sep = "";
        for member in &self.members {
            write!(f, "{}{}", sep, member)?;
            sep = " ";
        }
        Ok(())
    }
}

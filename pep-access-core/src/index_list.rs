// SPDX-License-Identifier: MIT OR Apache-2.0

use serde::{Deserialize, Serialize};

/// Ordered set of positions into a flattened result array.
///
/// Used to describe which entries of a ticket's column or participant list belong to a certain
/// group. Positions keep their insertion order and appear at most once.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IndexList {
    indices: Vec<u32>,
}

impl IndexList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a position, returns `false` if it was already part of the list.
    pub fn insert(&mut self, index: u32) -> bool {
        if self.indices.contains(&index) {
            return false;
        }
        self.indices.push(index);
        true
    }

    pub fn contains(&self, index: u32) -> bool {
        self.indices.contains(&index)
    }

    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = u32> + '_ {
        self.indices.iter().copied()
    }

    pub fn as_slice(&self) -> &[u32] {
        &self.indices
    }
}

impl FromIterator<u32> for IndexList {
    fn from_iter<T: IntoIterator<Item = u32>>(iter: T) -> Self {
        let mut list = IndexList::new();
        for index in iter {
            list.insert(index);
        }
        list
    }
}

impl From<IndexList> for Vec<u32> {
    fn from(value: IndexList) -> Self {
        value.indices
    }
}

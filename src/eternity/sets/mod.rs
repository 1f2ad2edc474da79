mod wordset;

pub use wordset::WordSet;

/// Membership set over the piece indices of one puzzle.
pub type PieceSet = WordSet;

/// Membership set over (piece, rotation) candidate ids.
pub type CandSet = WordSet;

pub trait SetOps {
    /// Determines whether the given element is in this set.
    fn contains(&self, value: usize) -> bool;

    /// Returns the length of the set.
    ///
    /// WARNING: it is highly recommended that this operation
    /// is constant time, as it backs the MRV cell ordering.
    fn len(&self) -> usize;

    /// Determines whether the set is empty.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Iterates over the elements in the set, ascending.
    fn iter(&self) -> impl Iterator<Item = usize>;

    /// Inserts a value into the set; reports whether the set changed.
    fn insert(&mut self, value: usize) -> bool;

    /// Removes a value from the set; reports whether the set changed.
    fn remove(&mut self, value: usize) -> bool;

    /// Removes all elements from self that are not also in the other set.
    fn intersect_inplace(&mut self, other: &Self) -> &mut Self;

    /// Inserts all elements in other into self.
    fn union_inplace(&mut self, other: &Self) -> &mut Self;

    /// Removes all elements in other from self.
    fn difference_inplace(&mut self, other: &Self) -> &mut Self;
}

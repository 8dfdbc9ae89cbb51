//! Distance-bounded transitions.
//!
//! A [`DistanceGuard`] holds a matrix of pairwise atom distances (global atom
//! indices, as used by [`Event::formed_bonds`]) and vetoes events that form a
//! bond between atoms further apart than a threshold.

use std::collections::VecDeque;

use ndarray::Array2;

use crate::chem::{State, TransitionGuard};
use crate::engine::Event;

/// Largest permitted bond-forming distance unless configured otherwise.
pub const DEFAULT_DISPLACEMENT_THRESHOLD: f64 = 3.0;

/// Hop distances between all atom pairs of an undirected bond graph.
///
/// # Arguments
/// * `n_atoms` - Number of atoms; valid indices are `0..n_atoms`
/// * `bonds` - Undirected bonds; pairs outside the range are ignored
///
/// # Returns
/// `(n_atoms, n_atoms)` matrix with `f64::INFINITY` for disconnected pairs
pub fn hop_distance_matrix(n_atoms: usize, bonds: &[(usize, usize)]) -> Array2<f64> {
    let mut neighbours = vec![Vec::new(); n_atoms];
    for &(a, b) in bonds {
        if a < n_atoms && b < n_atoms {
            neighbours[a].push(b);
            neighbours[b].push(a);
        }
    }

    let mut matrix = Array2::from_elem((n_atoms, n_atoms), f64::INFINITY);
    for start in 0..n_atoms {
        matrix[[start, start]] = 0.0;
        let mut queue = VecDeque::from([start]);
        while let Some(v) = queue.pop_front() {
            let next = matrix[[start, v]] + 1.0;
            for &w in &neighbours[v] {
                if matrix[[start, w]].is_infinite() {
                    matrix[[start, w]] = next;
                    queue.push_back(w);
                }
            }
        }
    }
    matrix
}

/// Rejects events whose formed bonds span more than `threshold`.
///
/// Events are judged in their forward orientation, so the same edge is
/// rejected whether forward or inverse expansion discovers it.
#[derive(Clone, Debug)]
pub struct DistanceGuard {
    distances: Array2<f64>,
    threshold: f64,
}

impl DistanceGuard {
    pub fn new(distances: Array2<f64>, threshold: f64) -> Self {
        Self { distances, threshold }
    }

    /// Guard over hop distances of a bond graph.
    pub fn from_bonds(n_atoms: usize, bonds: &[(usize, usize)], threshold: f64) -> Self {
        Self::new(hop_distance_matrix(n_atoms, bonds), threshold)
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn distances(&self) -> &Array2<f64> {
        &self.distances
    }

    /// Largest distance between the atoms of a formed bond of `event`.
    ///
    /// Bonds with an atom outside the matrix are not measured. An event that
    /// forms no measurable bond has displacement `0`.
    pub fn max_displacement(&self, event: &Event) -> f64 {
        let (rows, cols) = self.distances.dim();
        event
            .formed_bonds()
            .iter()
            .filter(|(a, b)| *a < rows && *b < cols)
            .map(|&(a, b)| self.distances[[a, b]])
            .fold(0.0, f64::max)
    }
}

impl TransitionGuard for DistanceGuard {
    fn permits(&self, _source: &State, event: &Event, _inverse: bool) -> bool {
        let displacement = self.max_displacement(event);
        if displacement > self.threshold {
            tracing::debug!(event = event.id(), displacement, "transition exceeds displacement threshold");
            return false;
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chem::StateMultiset;

    fn bond_event(bonds: Vec<(usize, usize)>) -> Event {
        Event::with_formed_bonds(0, StateMultiset::new(), StateMultiset::new(), vec![0], bonds)
    }

    #[test]
    fn test_hop_distances() {
        // 0 - 1 - 2 - 3, 4 isolated
        let matrix = hop_distance_matrix(5, &[(0, 1), (1, 2), (2, 3), (9, 0)]);
        assert_eq!(matrix[[0, 3]], 3.0);
        assert_eq!(matrix[[3, 0]], 3.0);
        assert_eq!(matrix[[1, 1]], 0.0);
        assert!(matrix[[0, 4]].is_infinite());
    }

    #[test]
    fn test_threshold() {
        let guard = DistanceGuard::from_bonds(6, &[(0, 1), (1, 2), (2, 3), (3, 4), (4, 5)], DEFAULT_DISPLACEMENT_THRESHOLD);
        let state = State::default();

        let near = bond_event(vec![(0, 3)]);
        assert_eq!(guard.max_displacement(&near), 3.0);
        assert!(guard.permits(&state, &near, false));

        let far = bond_event(vec![(0, 1), (0, 5)]);
        assert_eq!(guard.max_displacement(&far), 5.0);
        assert!(!guard.permits(&state, &far, false));
        assert!(!guard.permits(&state, &far, true));
    }

    #[test]
    fn test_unmeasured_bonds() {
        let guard = DistanceGuard::new(Array2::zeros((2, 2)), 1.0);
        let event = bond_event(vec![(0, 7)]);
        assert_eq!(guard.max_displacement(&event), 0.0);
        assert!(guard.permits(&State::default(), &event, false));
    }
}

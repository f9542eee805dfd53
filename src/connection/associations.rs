//! Receiver ↔ transmitter association relation.
//!
//! Stored as two id maps: each receiver's serving transmitter and, inversely,
//! the set of receivers each transmitter serves. Neither side holds a
//! reference to the other entity.

use std::collections::{BTreeMap, BTreeSet};

use crate::propagation::types::{ReceiverId, TransmitterId};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Associations {
    serving: BTreeMap<ReceiverId, TransmitterId>,
    served: BTreeMap<TransmitterId, BTreeSet<ReceiverId>>,
}

impl Associations {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serving transmitter of `receiver`, if any.
    pub fn serving(&self, receiver: ReceiverId) -> Option<TransmitterId> {
        self.serving.get(&receiver).copied()
    }

    /// Receivers currently served by `transmitter`, in id order.
    pub fn served_by(&self, transmitter: TransmitterId) -> impl Iterator<Item = ReceiverId> + '_ {
        self.served.get(&transmitter).into_iter().flat_map(|set| set.iter().copied())
    }

    pub fn load(&self, transmitter: TransmitterId) -> usize {
        self.served.get(&transmitter).map_or(0, BTreeSet::len)
    }

    pub fn connected_count(&self) -> usize {
        self.serving.len()
    }

    /// Make `transmitter` the primary server of `receiver`.
    ///
    /// Returns `false` when the association already existed (no-op).
    pub fn connect(&mut self, receiver: ReceiverId, transmitter: TransmitterId) -> bool {
        match self.serving.insert(receiver, transmitter) {
            Some(previous) if previous == transmitter => false,
            Some(previous) => {
                self.release(previous, receiver);
                self.served.entry(transmitter).or_default().insert(receiver);
                true
            }
            None => {
                self.served.entry(transmitter).or_default().insert(receiver);
                true
            }
        }
    }

    /// Tell `transmitter` it no longer serves `receiver`.
    ///
    /// Returns `true` when the transmitter had been serving the receiver.
    pub fn release(&mut self, transmitter: TransmitterId, receiver: ReceiverId) -> bool {
        let removed = match self.served.get_mut(&transmitter) {
            Some(set) => {
                let removed = set.remove(&receiver);
                if set.is_empty() {
                    self.served.remove(&transmitter);
                }
                removed
            }
            None => false,
        };
        if self.serving.get(&receiver) == Some(&transmitter) {
            self.serving.remove(&receiver);
        }
        removed
    }

    /// Release `receiver` from every transmitter in `transmitters` except `keep`.
    ///
    /// Every non-selected transmitter is visited, whether or not it was
    /// serving. Returns how many actually dropped the receiver.
    pub fn release_all_except<I>(&mut self, receiver: ReceiverId, keep: Option<TransmitterId>, transmitters: I) -> usize
    where
        I: IntoIterator<Item = TransmitterId>,
    {
        transmitters.into_iter().filter(|tx| Some(*tx) != keep).filter(|tx| self.release(*tx, receiver)).count()
    }

    /// Forget a receiver entirely.
    pub fn remove_receiver(&mut self, receiver: ReceiverId) {
        if let Some(tx) = self.serving.remove(&receiver) {
            self.release(tx, receiver);
        }
    }

    /// Forget a transmitter; returns the receivers it was serving.
    pub fn remove_transmitter(&mut self, transmitter: TransmitterId) -> Vec<ReceiverId> {
        let orphans: Vec<ReceiverId> = self.served.remove(&transmitter).map(|set| set.into_iter().collect()).unwrap_or_default();
        for rx in &orphans {
            self.serving.remove(rx);
        }
        orphans
    }

    /// `(receiver, transmitter)` pairs in receiver id order.
    pub fn iter(&self) -> impl Iterator<Item = (ReceiverId, TransmitterId)> + '_ {
        self.serving.iter().map(|(rx, tx)| (*rx, *tx))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connect_is_idempotent_and_moves_between_servers() {
        let mut a = Associations::new();
        assert!(a.connect(10, 1));
        assert!(!a.connect(10, 1));
        assert_eq!(a.load(1), 1);

        assert!(a.connect(10, 2));
        assert_eq!(a.serving(10), Some(2));
        assert_eq!(a.load(1), 0);
        assert_eq!(a.served_by(2).collect::<Vec<_>>(), vec![10]);
    }

    #[test]
    fn release_all_except_visits_every_other_transmitter() {
        let mut a = Associations::new();
        a.connect(10, 1);
        assert_eq!(a.release_all_except(10, Some(1), [1, 2, 3]), 0);
        assert_eq!(a.serving(10), Some(1));
        assert_eq!(a.release_all_except(10, None, [1, 2, 3]), 1);
        assert_eq!(a.serving(10), None);
        assert_eq!(a.connected_count(), 0);
    }

    #[test]
    fn inverse_map_stays_consistent() {
        let mut a = Associations::new();
        a.connect(10, 1);
        a.connect(11, 1);
        a.connect(12, 2);
        assert_eq!(a.remove_transmitter(1), vec![10, 11]);
        assert_eq!(a.serving(10), None);
        a.remove_receiver(12);
        assert_eq!(a.load(2), 0);
        assert_eq!(a.iter().count(), 0);
    }
}

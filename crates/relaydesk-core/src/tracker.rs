//! Reply context tracker — which client each operator is answering next

use dashmap::DashMap;

use crate::types::{ClientId, OperatorId};

/// At most one pending reply per operator; a new selection overwrites.
#[derive(Default)]
pub struct Tracker {
    pending: DashMap<OperatorId, ClientId>,
}

impl Tracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the selection this one replaced, if any
    pub fn set_pending(&self, operator: OperatorId, client_id: ClientId) -> Option<ClientId> {
        self.pending.insert(operator, client_id)
    }

    /// Read and clear the operator's pending target in one step
    pub fn take_pending(&self, operator: OperatorId) -> Option<ClientId> {
        self.pending.remove(&operator).map(|(_, client_id)| client_id)
    }

    pub fn peek(&self, operator: OperatorId) -> Option<ClientId> {
        self.pending.get(&operator).map(|c| c.value().clone())
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_take_consumes() {
        let tracker = Tracker::new();
        tracker.set_pending(OperatorId(7), ClientId::from("c1"));
        assert_eq!(tracker.take_pending(OperatorId(7)), Some(ClientId::from("c1")));
        assert_eq!(tracker.take_pending(OperatorId(7)), None);
        assert!(tracker.is_empty());
    }

    #[test]
    fn test_new_selection_overwrites() {
        let tracker = Tracker::new();
        assert!(tracker.set_pending(OperatorId(7), ClientId::from("c1")).is_none());
        let replaced = tracker.set_pending(OperatorId(7), ClientId::from("c2"));
        assert_eq!(replaced, Some(ClientId::from("c1")));
        assert_eq!(tracker.len(), 1);
        assert_eq!(tracker.peek(OperatorId(7)), Some(ClientId::from("c2")));
    }

    #[test]
    fn test_operators_are_independent() {
        let tracker = Tracker::new();
        tracker.set_pending(OperatorId(1), ClientId::from("a"));
        tracker.set_pending(OperatorId(2), ClientId::from("b"));
        assert_eq!(tracker.take_pending(OperatorId(2)), Some(ClientId::from("b")));
        assert_eq!(tracker.peek(OperatorId(1)), Some(ClientId::from("a")));
    }
}

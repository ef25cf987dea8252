/// An emitted event, stamped with its position in the bus.
#[derive(Debug, Clone, PartialEq)]
pub struct Event<E> {
    /// 0-based, strictly increasing across the bus lifetime (not reset by `drain`).
    pub seq: u64,
    pub payload: E,
}

/// Ordered outbox for state-machine notifications.
///
/// State machines push events synchronously while handling input; the host
/// drains them once per input and reacts (re-render, persist, notify).
#[derive(Debug)]
pub struct EventBus<E> {
    next_seq: u64,
    events: Vec<Event<E>>,
}

impl<E> Default for EventBus<E> {
    fn default() -> Self {
        Self {
            next_seq: 0,
            events: Vec::new(),
        }
    }
}

impl<E> EventBus<E> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `payload`, returning its sequence number.
    pub fn emit(&mut self, payload: E) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.events.push(Event { seq, payload });
        seq
    }

    pub fn events(&self) -> &[Event<E>] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Takes every pending payload in emission order.
    pub fn drain(&mut self) -> Vec<E> {
        std::mem::take(&mut self.events)
            .into_iter()
            .map(|e| e.payload)
            .collect()
    }
}

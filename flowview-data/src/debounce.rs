/// Trailing-edge debouncer driven by an adapter-supplied clock.
///
/// Each `schedule` replaces the pending value and restarts the delay; `poll` hands the value
/// out once the delay has elapsed with no newer `schedule`.
#[derive(Clone, Debug)]
pub struct Debouncer<V> {
    delay_ms: u64,
    pending: Option<(V, u64)>,
}

impl<V> Debouncer<V> {
    pub fn new(delay_ms: u64) -> Self {
        Self {
            delay_ms,
            pending: None,
        }
    }

    pub fn delay_ms(&self) -> u64 {
        self.delay_ms
    }

    /// Applies to values scheduled from now on.
    pub fn set_delay(&mut self, delay_ms: u64) {
        self.delay_ms = delay_ms;
    }

    pub fn schedule(&mut self, value: V, now_ms: u64) {
        self.pending = Some((value, now_ms.saturating_add(self.delay_ms)));
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// When the pending value becomes due.
    pub fn due_at(&self) -> Option<u64> {
        self.pending.as_ref().map(|(_, due)| *due)
    }

    pub fn poll(&mut self, now_ms: u64) -> Option<V> {
        match &self.pending {
            Some((_, due)) if *due <= now_ms => self.pending.take().map(|(v, _)| v),
            _ => None,
        }
    }

    pub fn cancel(&mut self) {
        self.pending = None;
    }
}

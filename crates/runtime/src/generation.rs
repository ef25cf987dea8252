/// Token identifying one asynchronous request epoch.
///
/// Async completions carry the generation they were issued under; a result
/// whose generation is no longer current belongs to an abandoned request
/// and must be dropped.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Generation(pub u64);

#[derive(Debug, Default)]
pub struct GenerationCounter {
    current: u64,
}

impl GenerationCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> Generation {
        Generation(self.current)
    }

    /// Invalidates every previously issued token and returns a fresh one.
    pub fn advance(&mut self) -> Generation {
        self.current += 1;
        Generation(self.current)
    }

    pub fn is_current(&self, generation: Generation) -> bool {
        generation.0 == self.current
    }
}

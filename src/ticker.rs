use std::time::Duration;

/// Display refresh interval in milliseconds
pub const REFRESH_INTERVAL_MS: u64 = 1000;

/// Get refresh interval
pub fn refresh_interval() -> Duration {
    Duration::from_millis(REFRESH_INTERVAL_MS)
}

/// Handle for one duration refresh loop. It goes stale when the active
/// archive changes, which is how a loop tied to the old archive stops.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefreshToken {
    generation: u64,
}

/// Issues refresh tokens and invalidates them
#[derive(Debug, Default)]
pub struct RefreshGate {
    generation: u64,
}

impl RefreshGate {
    pub fn token(&self) -> RefreshToken {
        RefreshToken {
            generation: self.generation,
        }
    }

    /// Invalidate every token handed out so far
    pub fn supersede(&mut self) {
        self.generation += 1;
    }

    pub fn is_current(&self, token: RefreshToken) -> bool {
        token.generation == self.generation
    }
}

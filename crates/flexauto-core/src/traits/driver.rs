//! OS drivers used by actions: input simulation and process control.

use async_trait::async_trait;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crate::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MouseButton {
    Left,
    Right,
}

/// Simulated mouse and keyboard input.
#[async_trait]
pub trait InputDriver: Send + Sync {
    async fn click(&self, x: i32, y: i32, button: MouseButton) -> Result<()>;

    /// Type text, either one character at a time or in one burst.
    async fn type_text(&self, text: &str, char_by_char: bool) -> Result<()>;

    /// Put text on the clipboard and paste it.
    async fn paste(&self, text: &str) -> Result<()>;
}

/// OS key events can arrive this long after the simulation that posted them.
pub const SYNTHETIC_TAIL: Duration = Duration::from_millis(150);

#[derive(Debug, Default)]
struct SyntheticState {
    depth: AtomicUsize,
    ended_at: Mutex<Option<Instant>>,
}

/// Tracks input simulation in progress. Shared by the input driver, which
/// enters it around every simulated event, and the key hook, which drops
/// key events while it is active.
#[derive(Debug, Clone, Default)]
pub struct SyntheticInput {
    state: Arc<SyntheticState>,
}

impl SyntheticInput {
    /// Mark a simulation as running until the guard is dropped.
    pub fn enter(&self) -> SyntheticGuard {
        self.state.depth.fetch_add(1, Ordering::SeqCst);
        SyntheticGuard {
            state: Arc::clone(&self.state),
        }
    }

    /// True while a simulation runs and for [`SYNTHETIC_TAIL`] after the last one ended.
    pub fn is_active(&self) -> bool {
        if self.state.depth.load(Ordering::SeqCst) > 0 {
            return true;
        }
        let ended_at = self
            .state
            .ended_at
            .lock()
            .map(|at| *at)
            .unwrap_or_default();
        ended_at.is_some_and(|at| at.elapsed() < SYNTHETIC_TAIL)
    }
}

/// Keeps [`SyntheticInput`] active while alive.
#[derive(Debug)]
pub struct SyntheticGuard {
    state: Arc<SyntheticState>,
}

impl Drop for SyntheticGuard {
    fn drop(&mut self) {
        if let Ok(mut at) = self.state.ended_at.lock() {
            *at = Some(Instant::now());
        }
        self.state.depth.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Launching and terminating processes.
#[async_trait]
pub trait ProcessControl: Send + Sync {
    /// Open a file or program with the OS default handler.
    async fn open(&self, path: &Path) -> Result<()>;

    /// Kill every process with the given name. Returns how many were killed.
    async fn close(&self, name: &str) -> Result<usize>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_synthetic_input_nesting_and_tail() {
        let synthetic = SyntheticInput::default();
        assert!(!synthetic.is_active());

        let outer = synthetic.enter();
        let inner = synthetic.clone().enter();
        drop(inner);
        assert!(synthetic.is_active());
        drop(outer);
        // Still inside the tail right after the last guard ends.
        assert!(synthetic.is_active());

        std::thread::sleep(SYNTHETIC_TAIL + Duration::from_millis(50));
        assert!(!synthetic.is_active());
    }
}

//! Global key hook.
//!
//! Key-down events become [`KeyCombo`]s and are handed to the scheduler over
//! an unbounded channel. Events seen while the shared [`SyntheticInput`] is
//! active were typed by the input driver and are dropped. The OS listener
//! needs the `desktop` feature; without it only [`KeyHook::inject`] delivers
//! events.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::mpsc;

use flexauto_core::error::Result;
use flexauto_core::traits::SyntheticInput;
use flexauto_core::types::KeyCombo;

/// Currently held modifier keys.
#[derive(Debug, Default, Clone)]
pub struct ModifierState {
    held: BTreeSet<&'static str>,
}

impl ModifierState {
    pub fn press(&mut self, modifier: &'static str) {
        self.held.insert(modifier);
    }

    pub fn release(&mut self, modifier: &'static str) {
        self.held.remove(modifier);
    }

    /// Combo for a non-modifier key pressed with the held modifiers.
    pub fn combo(&self, key: &str) -> KeyCombo {
        let modifiers: Vec<&str> = self.held.iter().copied().collect();
        KeyCombo::new(key, &modifiers.join("+"))
    }
}

/// Owned global keyboard hook.
pub struct KeyHook {
    tx: mpsc::UnboundedSender<KeyCombo>,
    active: Arc<AtomicBool>,
    synthetic: SyntheticInput,
    listener_spawned: AtomicBool,
}

impl KeyHook {
    /// Create the hook and the receiving end handed to the scheduler.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<KeyCombo>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let hook = Self {
            tx,
            active: Arc::new(AtomicBool::new(false)),
            synthetic: SyntheticInput::default(),
            listener_spawned: AtomicBool::new(false),
        };
        (hook, rx)
    }

    /// Begin delivering key events.
    pub fn start(&self) -> Result<()> {
        self.active.store(true, Ordering::SeqCst);
        if self.listener_spawned.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        self.spawn_listener()
    }

    /// Stop delivering key events. The OS listener thread stays parked.
    pub fn stop(&self) {
        if self.active.swap(false, Ordering::SeqCst) {
            tracing::info!("⌨️ Key hook stopped");
        }
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    /// Handle to give the input driver.
    pub fn synthetic(&self) -> SyntheticInput {
        self.synthetic.clone()
    }

    /// Deliver a combo as if it had been pressed. Dropped while stopped or
    /// while input is being simulated.
    pub fn inject(&self, combo: KeyCombo) -> bool {
        deliver(&self.active, &self.synthetic, &self.tx, combo)
    }

    #[cfg(feature = "desktop")]
    fn spawn_listener(&self) -> Result<()> {
        let active = Arc::clone(&self.active);
        let synthetic = self.synthetic.clone();
        let tx = self.tx.clone();
        std::thread::Builder::new()
            .name("flexauto-keyhook".into())
            .spawn(move || {
                let mut modifiers = ModifierState::default();
                let callback = move |event: rdev::Event| match event.event_type {
                    rdev::EventType::KeyPress(key) => match os::classify(key) {
                        Some(os::KeyInput::Modifier(m)) => modifiers.press(m),
                        Some(os::KeyInput::Key(name)) => {
                            deliver(&active, &synthetic, &tx, modifiers.combo(&name));
                        }
                        None => {}
                    },
                    rdev::EventType::KeyRelease(key) => {
                        if let Some(os::KeyInput::Modifier(m)) = os::classify(key) {
                            modifiers.release(m);
                        }
                    }
                    _ => {}
                };
                if let Err(e) = rdev::listen(callback) {
                    tracing::error!("❌ Key hook listener failed: {e:?}");
                }
            })
            .map_err(|e| flexauto_core::FlexError::Hook(format!("listener thread: {e}")))?;
        tracing::info!("⌨️ Key hook started");
        Ok(())
    }

    #[cfg(not(feature = "desktop"))]
    fn spawn_listener(&self) -> Result<()> {
        tracing::warn!("⚠️ Built without the desktop feature: only injected key events are delivered");
        Ok(())
    }
}

fn deliver(
    active: &AtomicBool,
    synthetic: &SyntheticInput,
    tx: &mpsc::UnboundedSender<KeyCombo>,
    combo: KeyCombo,
) -> bool {
    if !active.load(Ordering::SeqCst) {
        return false;
    }
    if synthetic.is_active() {
        tracing::debug!("Ignoring simulated key {combo}");
        return false;
    }
    tracing::debug!("Key combo {combo}");
    tx.send(combo).is_ok()
}

#[cfg(feature = "desktop")]
mod os {
    use rdev::Key;

    pub enum KeyInput {
        Modifier(&'static str),
        Key(String),
    }

    /// Map an OS key to a modifier or a key name (`a`, `d1`, `f9`, `space`).
    pub fn classify(key: Key) -> Option<KeyInput> {
        use KeyInput::{Key as K, Modifier as M};
        let name = match key {
            Key::ControlLeft | Key::ControlRight => return Some(M("ctrl")),
            Key::ShiftLeft | Key::ShiftRight => return Some(M("shift")),
            Key::Alt | Key::AltGr => return Some(M("alt")),
            Key::KeyA => "a", Key::KeyB => "b", Key::KeyC => "c", Key::KeyD => "d",
            Key::KeyE => "e", Key::KeyF => "f", Key::KeyG => "g", Key::KeyH => "h",
            Key::KeyI => "i", Key::KeyJ => "j", Key::KeyK => "k", Key::KeyL => "l",
            Key::KeyM => "m", Key::KeyN => "n", Key::KeyO => "o", Key::KeyP => "p",
            Key::KeyQ => "q", Key::KeyR => "r", Key::KeyS => "s", Key::KeyT => "t",
            Key::KeyU => "u", Key::KeyV => "v", Key::KeyW => "w", Key::KeyX => "x",
            Key::KeyY => "y", Key::KeyZ => "z",
            Key::Num0 => "d0", Key::Num1 => "d1", Key::Num2 => "d2", Key::Num3 => "d3",
            Key::Num4 => "d4", Key::Num5 => "d5", Key::Num6 => "d6", Key::Num7 => "d7",
            Key::Num8 => "d8", Key::Num9 => "d9",
            Key::F1 => "f1", Key::F2 => "f2", Key::F3 => "f3", Key::F4 => "f4",
            Key::F5 => "f5", Key::F6 => "f6", Key::F7 => "f7", Key::F8 => "f8",
            Key::F9 => "f9", Key::F10 => "f10", Key::F11 => "f11", Key::F12 => "f12",
            Key::Space => "space",
            Key::Return | Key::KpReturn => "enter",
            Key::Escape => "escape",
            Key::Tab => "tab",
            Key::Backspace => "back",
            Key::Delete => "delete",
            Key::Insert => "insert",
            Key::Home => "home",
            Key::End => "end",
            Key::PageUp => "pageup",
            Key::PageDown => "pagedown",
            Key::UpArrow => "up",
            Key::DownArrow => "down",
            Key::LeftArrow => "left",
            Key::RightArrow => "right",
            Key::PrintScreen => "printscreen",
            Key::Pause => "pause",
            _ => return None,
        };
        Some(K(name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flexauto_core::traits::driver::SYNTHETIC_TAIL;

    #[test]
    fn test_modifier_state_builds_sorted_combo() {
        let mut state = ModifierState::default();
        state.press("shift");
        state.press("ctrl");
        assert_eq!(state.combo("F9"), KeyCombo::new("f9", "Ctrl+Shift"));

        state.release("shift");
        assert_eq!(state.combo("a").to_string(), "ctrl+a");
        state.release("ctrl");
        assert_eq!(state.combo("a").modifiers, "");
    }

    #[tokio::test]
    async fn test_inject_only_while_started() {
        let (hook, mut rx) = KeyHook::new();
        assert!(!hook.inject(KeyCombo::new("f1", "")));

        hook.start().unwrap();
        assert!(hook.is_active());
        assert!(hook.inject(KeyCombo::new("F2", "alt")));
        assert_eq!(rx.recv().await, Some(KeyCombo::new("f2", "alt")));

        hook.stop();
        assert!(!hook.inject(KeyCombo::new("f3", "")));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_simulated_keys_are_dropped() {
        let (hook, mut rx) = KeyHook::new();
        hook.start().unwrap();
        let synthetic = hook.synthetic();

        let guard = synthetic.enter();
        assert!(!hook.inject(KeyCombo::new("f9", "ctrl")));
        drop(guard);
        assert!(rx.try_recv().is_err());

        tokio::time::sleep(SYNTHETIC_TAIL + std::time::Duration::from_millis(50)).await;
        assert!(hook.inject(KeyCombo::new("f9", "ctrl")));
        assert_eq!(rx.recv().await, Some(KeyCombo::new("f9", "ctrl")));
    }

    #[test]
    fn test_restart_reuses_listener() {
        let (hook, _rx) = KeyHook::new();
        hook.start().unwrap();
        hook.stop();
        hook.start().unwrap();
        assert!(hook.is_active());
    }
}

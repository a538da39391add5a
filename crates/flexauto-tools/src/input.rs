//! Keyboard and mouse simulation.

use std::sync::Arc;

use async_trait::async_trait;

use flexauto_core::error::{FlexError, Result};
use flexauto_core::traits::{InputDriver, MouseButton, SyntheticInput};

/// Driver for hosts without a desktop session.
#[derive(Debug, Default)]
pub struct NullInputDriver;

#[async_trait]
impl InputDriver for NullInputDriver {
    async fn click(&self, _x: i32, _y: i32, _button: MouseButton) -> Result<()> {
        Err(unavailable())
    }

    async fn type_text(&self, _text: &str, _char_by_char: bool) -> Result<()> {
        Err(unavailable())
    }

    async fn paste(&self, _text: &str) -> Result<()> {
        Err(unavailable())
    }
}

fn unavailable() -> FlexError {
    FlexError::Driver("input simulation unavailable".into())
}

/// The best driver this build supports. `synthetic` is raised around every
/// simulated event so a key hook sharing it can ignore them.
pub fn default_input_driver(synthetic: SyntheticInput) -> Arc<dyn InputDriver> {
    #[cfg(feature = "desktop")]
    {
        Arc::new(EnigoDriver::new(synthetic))
    }
    #[cfg(not(feature = "desktop"))]
    {
        let _ = synthetic;
        Arc::new(NullInputDriver)
    }
}

#[cfg(feature = "desktop")]
pub use desktop::EnigoDriver;

#[cfg(feature = "desktop")]
mod desktop {
    use std::time::Duration;

    use async_trait::async_trait;
    use enigo::{Button, Coordinate, Direction, Enigo, Key, Keyboard, Mouse, Settings};

    use flexauto_core::error::{FlexError, Result};
    use flexauto_core::traits::{InputDriver, MouseButton, SyntheticInput};

    const CHAR_DELAY: Duration = Duration::from_millis(15);

    #[cfg(target_os = "macos")]
    const PASTE_MODIFIER: Key = Key::Meta;
    #[cfg(not(target_os = "macos"))]
    const PASTE_MODIFIER: Key = Key::Control;

    /// Real input through `enigo`, clipboard through `arboard`.
    #[derive(Debug, Default)]
    pub struct EnigoDriver {
        synthetic: SyntheticInput,
    }

    impl EnigoDriver {
        pub fn new(synthetic: SyntheticInput) -> Self {
            Self { synthetic }
        }

        /// Run `f` with a fresh `Enigo` on the blocking pool, marked synthetic.
        async fn with_enigo<F>(&self, f: F) -> Result<()>
        where
            F: FnOnce(&mut Enigo) -> Result<()> + Send + 'static,
        {
            let guard = self.synthetic.enter();
            tokio::task::spawn_blocking(move || {
                let _guard = guard;
                let mut enigo = Enigo::new(&Settings::default()).map_err(driver_err)?;
                f(&mut enigo)
            })
            .await
            .map_err(driver_err)?
        }
    }

    fn driver_err(e: impl std::fmt::Display) -> FlexError {
        FlexError::Driver(e.to_string())
    }

    #[async_trait]
    impl InputDriver for EnigoDriver {
        async fn click(&self, x: i32, y: i32, button: MouseButton) -> Result<()> {
            let button = match button {
                MouseButton::Left => Button::Left,
                MouseButton::Right => Button::Right,
            };
            self.with_enigo(move |enigo| {
                enigo.move_mouse(x, y, Coordinate::Abs).map_err(driver_err)?;
                enigo.button(button, Direction::Click).map_err(driver_err)
            })
            .await
        }

        async fn type_text(&self, text: &str, char_by_char: bool) -> Result<()> {
            let text = text.to_string();
            self.with_enigo(move |enigo| {
                if !char_by_char {
                    return enigo.text(&text).map_err(driver_err);
                }
                let mut buf = [0u8; 4];
                for c in text.chars() {
                    enigo.text(c.encode_utf8(&mut buf)).map_err(driver_err)?;
                    std::thread::sleep(CHAR_DELAY);
                }
                Ok(())
            })
            .await
        }

        async fn paste(&self, text: &str) -> Result<()> {
            let text = text.to_string();
            self.with_enigo(move |enigo| {
                let mut clipboard = arboard::Clipboard::new().map_err(driver_err)?;
                clipboard.set_text(text).map_err(driver_err)?;
                enigo.key(PASTE_MODIFIER, Direction::Press).map_err(driver_err)?;
                let pasted = enigo.key(Key::Unicode('v'), Direction::Click);
                enigo.key(PASTE_MODIFIER, Direction::Release).map_err(driver_err)?;
                pasted.map_err(driver_err)
            })
            .await
        }
    }
}

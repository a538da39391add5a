//! Collaborator traits. The scheduler only talks to the outside world
//! through these seams.

pub mod chat;
pub mod checks;
pub mod driver;
pub mod store;

pub use chat::ChatTransport;
pub use checks::{CatalogCheck, VideoCheck};
pub use driver::{InputDriver, MouseButton, ProcessControl, SyntheticInput};
pub use store::ScenarioStore;

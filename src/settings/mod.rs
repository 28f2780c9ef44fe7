//! Settings module: user-editable feature settings and their persistence

mod handle;
mod model;
mod store;

pub use handle::SettingsHandle;
pub use model::{Bounds, CircleParams, Settings, SettingsError};
pub use store::FileStore;
#[cfg(test)]
pub use store::MemoryStore;

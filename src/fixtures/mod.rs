pub mod reshaper;
pub mod store;

pub use reshaper::{apply_update, build_snapshot};
pub use store::{FixtureStore, StoreError};

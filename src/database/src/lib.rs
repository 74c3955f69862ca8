pub mod store;

pub use store::{LocalStore, StoreKey};

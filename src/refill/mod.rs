//! Client-side queue refill loop.
//!
//! Watches the depth of a locally held queue and pulls more items from the
//! sample endpoint when it runs low, backing off on failure.

pub mod controller;
pub mod fetcher;
pub mod machine;

pub use controller::{RefillController, RefillEvent, RefillHandle, RefillSettings};
pub use fetcher::{HttpItemFetcher, ItemFetcher};
pub use machine::{RefillAction, RefillMachine, RefillState};

//! avatar-store — Persistence for checked avatar items.
//!
//! One JSON document per line; every mutation rewrites the file through a
//! temporary sibling and an atomic rename, so readers never see a torn file.

pub mod item;
pub mod jsonl;

pub use item::{Item, ItemSource};
pub use jsonl::{JsonLineStore, Keyed, StoreError};

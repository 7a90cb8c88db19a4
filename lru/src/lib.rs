#![forbid(unsafe_code)]
#![deny(clippy::all, missing_docs)]

//! A bounded, per-entry-TTL LRU [`Storage`](readthrough::Storage) backend —
//! the reference in-process storage for `readthrough`, kept as a sibling
//! crate rather than folded into `readthrough` itself so that pulling in a
//! cache backend is opt-in.

mod list;
mod storage;

pub use crate::storage::{Error, LruStorage, LruStorageBuilder};

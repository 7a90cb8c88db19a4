#![forbid(unsafe_code)]
#![deny(clippy::all, missing_docs)]

//! A read-through cache coordinator: given a request key, produce a value by
//! first consulting a pluggable [`Storage`] backend and, on miss or expiry,
//! invoking a pluggable [`Querier`]. The coordinator's reason to exist is
//! concurrency coordination around that pattern — suppressing cache
//! "stampedes" so that many concurrent callers asking for the same missing
//! key result in exactly one upstream query, with every caller observing the
//! same answer.
//!
//! # Pieces
//!
//! | Type | Role |
//! |------|------|
//! | [`Coordinator`] | read-through + single-flight + stale-on-error orchestration |
//! | [`Sentinel`] | one-producer/many-consumer rendezvous for a single in-flight query |
//! | [`Storage`] | pluggable backend; [`DeletableStorage`], [`SetWithTtlStorage`], [`ClearableStorage`] are opt-in capabilities |
//! | [`NopStorage`] | a storage that never hits, useful for building a pure single-flight dedupe layer |
//! | [`Cancel`] | a cheap, cloneable cancellation/deadline handle threaded through every blocking call |
//!
//! An LRU reference storage lives in the sibling `readthrough-lru` crate.

mod cancel;
mod coordinator;
mod error;
mod key;
mod querier;
mod registry;
mod sentinel;
mod storage;

pub use crate::{
    cancel::{Cancel, Cancelled},
    coordinator::{Coordinator, CoordinatorBuilder, GetOptions, GetOptionsBuilder},
    error::{Error, ExpiredKind, NotFoundKind},
    key::CacheKey,
    querier::{NotFoundQuery, Querier},
    storage::{
        ClearFn, ClearableStorage, DelFn, DeletableStorage, Miss, NopStorage, SetWithTtlFn, SetWithTtlStorage, Storage,
    },
};

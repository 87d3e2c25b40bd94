//! Host-side [`MutexProvider`](ringsync::MutexProvider) for `ringsync`.
//!
//! On a real target the provider wraps the RTOS mutex API. This crate is
//! the hosted stand-in used by tests, benchmarks and simulations: the same
//! install-at-boot flow, backed by `std` primitives.
//!
//! [`HostMutex`] is a binary semaphore rather than a `std::sync::Mutex`
//! guard, because the ring's acquire and release happen in separate calls
//! and an RTOS port may legitimately release from a different context than
//! the one that acquired.

mod provider;

pub use provider::{HostMutex, StdMutexProvider};

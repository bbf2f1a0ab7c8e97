//! Host-local claim manager for mediated devices.
//!
//! A mediated device is an independently allocatable slice of a larger
//! physical device (e.g. a vGPU cut out of one physical GPU), exposed by the
//! host driver as a distinct, individually ownable device. This library
//! tracks the mediated devices of one physical host: which exist, which are
//! free, which are owned by a workload, and under which allocation class.
//!
//! The pool rebuilds its registry from driver ground truth at process start
//! and performs atomic multi-device claims: either every requested device
//! ends up owned, or ownership is rolled back entirely and the claim fails.
//! The actual hardware operations live behind the [`HostDriver`] trait;
//! workload metadata resolution lives behind [`ConsumerStore`].
//!
//! Cross-host placement is a higher-level scheduler's job; exactly one pool
//! instance exists per host for the process lifetime.

pub mod config;
pub mod consumer;
pub mod driver;
pub mod error;
pub mod logging;
pub mod mock;
pub mod pool;
pub mod unit;

pub use config::PoolConfig;
pub use consumer::ConsumerStore;
pub use driver::HostDriver;
pub use error::PoolError;
pub use pool::MdevPool;
pub use unit::MdevUnit;
pub use unit::UnitClaim;

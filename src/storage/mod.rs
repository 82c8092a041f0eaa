//! Shift Accounting Storage
//!
//! Persistence for shift accumulations and cycle records. The engine talks
//! to the `PersistenceGateway` trait; `SledGateway` is the durable backend
//! used by the binary, `InMemoryGateway` backs tests.

pub mod persistence;
pub mod sled_store;

pub use persistence::{InMemoryGateway, PersistenceError, PersistenceGateway};
pub use sled_store::SledGateway;

#![doc = include_str!("../README.md")]

mod client;
mod error;
mod transport;

pub mod hostgroup;
pub mod model;
pub mod srvview;

pub use client::{Client, ClientConfig, Credentials};
pub use error::KscError;
pub use transport::Typed;

// re-export the per-call cancellation handle used across the API
pub use tokio_util::sync::CancellationToken;

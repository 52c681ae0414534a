//! Core library for the `zipcast` CLI.
//!
//! This crate defines:
//! - Configuration & credentials handling
//! - The OpenWeatherMap geocoding/forecast client
//! - The durable saved-locations store
//! - The lookup orchestrator composing the two
//!
//! It is used by `zipcast-cli`, but can also be reused by other binaries or services.

pub mod client;
pub mod config;
pub mod error;
pub mod lookup;
pub mod model;
pub mod store;

pub use client::{OwmClient, WeatherApi};
pub use config::Config;
pub use error::LookupError;
pub use lookup::{LookupResult, WeatherLookup};
pub use model::{Location, Lookup, WeatherSnapshot};
pub use store::LocationStore;

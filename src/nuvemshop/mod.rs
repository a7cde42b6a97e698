pub mod client;

pub use client::{NuvemshopClient, NuvemshopError, PlatformTransaction};

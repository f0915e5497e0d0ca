//! Configuration types shared between crates.

mod admin;

pub use admin::AdminConfig;

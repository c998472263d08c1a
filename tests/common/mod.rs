//! Common test infrastructure
//!
//! Tests should only import from this module, not from internal submodules.
//!
//! # Example
//!
//! ```no_run
//! mod common;
//! use common::{TestCatalog, CLIMB_TRACK_TITLE};
//!
//! #[tokio::test]
//! async fn test_builds() {
//!     let catalog = TestCatalog::standard().unwrap();
//!     // ...
//! }
//! ```

#![allow(dead_code)]

mod constants;
mod fixtures;

#[allow(unused_imports)]
pub use constants::*;
#[allow(unused_imports)]
pub use fixtures::{
    stub, CountingGapFiller, FailingGapFiller, ScriptedProvider, TestCatalog, TrackSeed,
    UnavailableCatalog,
};

//! # Ledgerlink Testkit
//!
//! Testing utilities for the ledgerlink sync layer.
//!
//! ## Overview
//!
//! This crate provides:
//!
//! - **Fixtures**: a client wired to the in-memory hub with a recording
//!   notifier, plus builders for server-shaped events
//! - **Generators**: proptest strategies for property-based testing
//!
//! ## Test Fixtures
//!
//! Quickly set up an end-to-end scenario:
//!
//! ```rust
//! use ledgerlink_core::{BookId, UserId};
//! use ledgerlink_testkit::fixtures::TestFixture;
//!
//! # async fn example() {
//! let fixture = TestFixture::new();
//! fixture.connect_as(UserId(1), BookId(100)).await.unwrap();
//! # }
//! ```
//!
//! ## Property Testing
//!
//! Use the generators with proptest:
//!
//! ```rust,ignore
//! use proptest::prelude::*;
//! use ledgerlink_testkit::generators::{event_from_params, EventParams};
//!
//! proptest! {
//!     #[test]
//!     fn ids_are_stable(params: EventParams) {
//!         let e1 = event_from_params(&params);
//!         let e2 = event_from_params(&params);
//!         prop_assert_eq!(e1.id, e2.id);
//!     }
//! }
//! ```

pub mod fixtures;
pub mod generators;

pub use fixtures::{init_tracing, ledger_created, member_joined, TestFixture};
pub use generators::{event_from_params, EventParams};

//! # TinySeed Test Suite
//!
//! Unified test crate for scenarios that span the address book, the PEX
//! engine and the switch.
//!
//! ## Structure
//!
//! ```text
//! tests/
//! ├── benches/          # Address book throughput (criterion)
//! └── src/integration/
//!     ├── fixtures.rs   # Scripted peers, switch builders
//!     ├── seed_crawl.rs # Bootstrap from seeds, book contents
//!     ├── churn.rs      # Grace-period churn, failure accounting
//!     └── tcp.rs        # Two switches over loopback TCP
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! # All tests
//! cargo test -p seed-tests
//!
//! # Benchmarks
//! cargo bench -p seed-tests
//! ```

#![allow(dead_code)]

pub mod integration;

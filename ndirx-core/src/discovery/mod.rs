//! # Discovery
//!
//! | Module     | Purpose                                                  |
//! |------------|----------------------------------------------------------|
//! | `registry` | One discovery handle per network context, plus snapshots |
//! | `resolver` | Name/address matching over a snapshot                    |

pub mod registry;
pub mod resolver;

pub use registry::{Snapshot, SourceRegistry};
pub use resolver::{matches, resolve, strip_port};

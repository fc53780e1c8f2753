// SPDX-License-Identifier: MIT OR Apache-2.0
#![doc = include_str!("../README.md")]
#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod options;
pub mod process;
pub mod stream;

pub use error::{SpawnError, StreamKind};
pub use options::SpawnOptions;
pub use process::{LineMap, OutputLine, spawn, spawn_tagged};
pub use stream::LineStream;

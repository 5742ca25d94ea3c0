//! Shared walker engine: worker-slot pool, path scratch buffer, output sinks.
//!
//! The three tools build different per-entry bodies on top of the same three
//! pieces: a fixed pool of worker slots (the fan-out bound), a per-worker
//! path buffer mutated in place during descent, and a serialized record
//! stream next to an unserialized diagnostic stream.

pub mod output;
pub mod pool;
pub mod scratch;

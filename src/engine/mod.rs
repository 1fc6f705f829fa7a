//! Core engine: the poll → synthesize → aggregate → publish loop.

pub mod aggregator;
pub mod monitor;
pub mod publisher;
pub mod synthesizer;

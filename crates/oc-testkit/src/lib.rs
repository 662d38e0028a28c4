//! Test tooling: in-memory fakes for every external dependency named in
//! spec §4, plus a scenario harness that drives the §8 end-to-end
//! scenarios against the real engine crates.

pub mod fakes;
pub mod harness;

pub use fakes::{InMemoryDirectory, InMemoryPersistence, RecordingSink, ScriptedDistanceOracle};
pub use harness::ScenarioHarness;

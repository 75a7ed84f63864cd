pub mod rewind;

pub use rewind::{ResolvedTarget, RewindConfig, SeedConfig, SnapshotOverrides, TargetConfig};

// ggen-artifact: content-addressed artifact generation
// Render, hash, write atomically, and record the inputs needed to rebuild
// the artifact byte-for-byte in a `.attest.json` sidecar.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

pub mod attestation;
pub mod cancel;
pub mod clock;
pub mod error;
pub mod generator;
pub mod inject;
pub mod lockfile;
pub mod plan;

pub use attestation::{Attestation, VerifyOutcome};
pub use cancel::CancellationToken;
pub use clock::{FixedTime, SystemClock, TimeSource};
pub use error::{ArtifactError, ArtifactResult};
pub use generator::{
    Artifact, ArtifactGenerator, GenerateOutcome, GeneratorConfig, VariablesPolicy,
};
pub use lockfile::{LockEntry, Lockfile};
pub use plan::{PlanDriver, PlanEntry, RunReport};

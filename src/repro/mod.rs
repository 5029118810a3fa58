//! Environment snapshots ("run records") and portable repro bundles.
//!
//! A snapshot is a directory of plain artifacts written before a model run:
//! - `run_record.json` describing host, tools, git, conda and file hashes
//! - the commit text file and conda export
//! - timestamped copies of the workflow scripts
//!
//! Bundles pack such a directory into a single zip file that can be
//! scrubbed of credentials and shared.

pub mod bundle;
pub mod compare;
pub mod manifest;
pub mod record;
pub mod recorder;
pub mod scripts;
pub mod scrub;

pub use bundle::{ReproBundle, ReproBundleMeta, ReproBundleOpen, ReproExportMode};
pub use compare::RecordComparison;
pub use manifest::{FileManifest, ManifestOptions, ManifestScan};
pub use record::{RecordError, RunRecord};
pub use recorder::{validate_step, RecordOptions, RecordOutcome, Recorder, StepNameError};
pub use scrub::ScrubConfig;

//! Cross-survey variable star characterization.
//!
//! `starweave` correlates three views of one star into a single composite
//! figure: a combined high-resolution spectrum (APOGEE), a space-photometry
//! light curve (TESS) and a population-level stellar parameter catalog. The
//! pipeline runs four stages strictly forward:
//!
//! 1. **Archive query** - resolve an identifier or sky cone to observation
//!    metadata ([`archive`])
//! 2. **Resolution** - narrow product listings to the canonical files and
//!    pick the closest-matching time-series observation ([`resolve`])
//! 3. **Download** - fetch products into an idempotent local cache
//!    ([`download`])
//! 4. **Correlate and plot** - load the FITS datasets, assemble panel data
//!    and render the artifact ([`dataset`], [`figure`])
//!
//! The [`workflow::VariableStarWorkflow`] entry point strings the stages
//! together; the `characterize` binary wraps it for the command line.

pub mod archive;
pub mod config;
pub mod coords;
pub mod dataset;
pub mod download;
pub mod figure;
pub mod resolve;
pub mod workflow;

pub use archive::{ArchiveClient, ArchiveSession, MastClient};
pub use config::WorkflowConfig;
pub use workflow::{Artifact, VariableStarWorkflow, WorkflowError};

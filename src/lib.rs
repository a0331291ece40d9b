//! crossforge - uniform adapters over the GitHub and GitLab REST APIs
//!
//! crossforge exposes one async contract, [`forge::PlatformAdapter`], for
//! projects, issues, merge requests, branches, tags, commits, forks and
//! diffs. Each backend translates filters into its native query
//! parameters, normalizes responses into the shared resource model and
//! reduces failures to a small set of error kinds.
//!
//! # Architecture
//!
//! - [`core`] - Resource model and configuration
//! - [`forge`] - The adapter trait, filters, branch references and the
//!   GitHub and GitLab backends
//! - [`logging`] - `tracing` subscriber setup
//!
//! # Invariants
//!
//! 1. Every adapter authenticates at most once, even under concurrent use
//! 2. Listings never return more items than the requested limit
//! 3. Native payloads are preserved in resource metadata
//! 4. Tokens never appear in logs or `Debug` output

pub mod core;
pub mod forge;
pub mod logging;

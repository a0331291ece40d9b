//! forge
//!
//! Uniform adapters over hosting platforms (GitHub, GitLab).
//!
//! # Architecture
//!
//! The [`PlatformAdapter`] trait defines every operation in
//! platform-neutral terms. Callers obtain an adapter from
//! [`create_adapter`] and never touch native payloads; each resource keeps
//! the native JSON in its `metadata` map for anything the common model
//! does not cover.
//!
//! # Modules
//!
//! - `traits`: the adapter trait, request types and [`ForgeError`]
//! - `filters`: query filter structs shared by both backends
//! - `branch`: `owner:branch` reference parsing
//! - [`github`]: GitHub REST v3
//! - [`gitlab`]: GitLab REST v4
//! - `factory`: platform detection and adapter construction
//!
//! # Example
//!
//! ```ignore
//! use crossforge::core::config::Config;
//! use crossforge::forge::{create_adapter, NewMergeRequest};
//!
//! let config = Config::load()?.config;
//! let adapter = create_adapter(&config.platform("github")?)?;
//!
//! let mr = adapter
//!     .create_merge_request(
//!         "octo/hello",
//!         &NewMergeRequest {
//!             source_branch: "forkuser:feature".into(),
//!             target_branch: "main".into(),
//!             title: "Add feature".into(),
//!             ..Default::default()
//!         },
//!     )
//!     .await?;
//! println!("{} {}", mr.id, mr.url);
//! ```

mod branch;
mod factory;
mod filters;
pub mod github;
pub mod gitlab;
pub(crate) mod http;
mod traits;

pub use branch::{parse_branch_reference, BranchRef, BranchRefError};
pub use factory::{create_adapter, resolve_kind, valid_platform_names, PlatformKind};
pub use filters::{
    BranchFilters, CommitFilters, IssueFilters, Labels, MergeRequestFilters, ProjectFilters,
    SortField, SortOrder, StateFilter, TagFilters, Visibility,
};
pub use traits::*;

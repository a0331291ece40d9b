//! forge::branch
//!
//! Branch reference parsing for cross-repository merge requests.
//!
//! A reference is either a bare branch name (`feature-x`), naming a branch
//! in the repository the request is opened against, or a qualified
//! reference (`owner:feature-x` on GitHub, `project:feature-x` on GitLab)
//! naming a branch in another repository, typically a fork.
//!
//! Only the first `:` separates the two halves. Neither half is validated
//! beyond being non-empty: branch names that contain a colon after the
//! first one are passed through untouched.

use std::fmt;

use thiserror::Error;
use tracing::warn;

use super::traits::ForgeError;

/// Errors from branch reference parsing.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BranchRefError {
    #[error("Branch reference cannot be empty")]
    Empty,

    #[error("Invalid branch reference format: {0}")]
    InvalidFormat(String),
}

/// A parsed branch reference.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BranchRef {
    /// Repository owner (GitHub) or project (GitLab) of a qualified reference
    pub owner: Option<String>,
    /// Branch name
    pub branch: String,
    /// Whether the reference names a branch in another repository
    pub is_cross_repo: bool,
}

impl BranchRef {
    /// Reference to a branch in the current repository.
    pub fn local(branch: impl Into<String>) -> Self {
        Self {
            owner: None,
            branch: branch.into(),
            is_cross_repo: false,
        }
    }

    /// Reference to a branch in another repository.
    pub fn remote(owner: impl Into<String>, branch: impl Into<String>) -> Self {
        Self {
            owner: Some(owner.into()),
            branch: branch.into(),
            is_cross_repo: true,
        }
    }
}

impl fmt::Display for BranchRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.owner {
            Some(owner) => write!(f, "{}:{}", owner, self.branch),
            None => f.write_str(&self.branch),
        }
    }
}

/// Parse `branch` or `owner:branch`.
///
/// # Errors
///
/// Returns [`BranchRefError::Empty`] for an empty string and
/// [`BranchRefError::InvalidFormat`] when either half of a qualified
/// reference is empty.
///
/// # Example
///
/// ```
/// use crossforge::forge::parse_branch_reference;
///
/// let r = parse_branch_reference("forkuser:feature").unwrap();
/// assert_eq!(r.owner.as_deref(), Some("forkuser"));
/// assert_eq!(r.branch, "feature");
/// assert!(r.is_cross_repo);
///
/// assert!(!parse_branch_reference("main").unwrap().is_cross_repo);
/// assert!(parse_branch_reference(":main").is_err());
/// ```
pub fn parse_branch_reference(reference: &str) -> Result<BranchRef, BranchRefError> {
    if reference.is_empty() {
        return Err(BranchRefError::Empty);
    }

    match reference.split_once(':') {
        None => Ok(BranchRef::local(reference)),
        Some((owner, branch)) if !owner.is_empty() && !branch.is_empty() => {
            Ok(BranchRef::remote(owner, branch))
        }
        Some(_) => Err(BranchRefError::InvalidFormat(reference.to_string())),
    }
}

/// Outcome of probing for a branch before opening a merge request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum BranchCheck {
    Present,
    Missing,
    /// The probe itself failed; the reason is logged.
    Unverified(String),
}

/// Which end of a merge request a branch sits on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum BranchRole {
    Source,
    Target,
}

/// Turn a probe outcome into a go/no-go decision.
///
/// `location` names where the branch was looked for, e.g.
/// `repository octo/hello`.
pub(crate) fn require_branch(
    check: BranchCheck,
    role: BranchRole,
    branch: &str,
    location: &str,
    platform: &str,
) -> Result<(), ForgeError> {
    match check {
        BranchCheck::Present => Ok(()),
        BranchCheck::Missing => {
            let message = match role {
                BranchRole::Source => format!(
                    "Source branch '{}' not found in {}. Make sure the branch is pushed to the remote repository.",
                    branch, location
                ),
                BranchRole::Target => {
                    format!("Target branch '{}' not found in {}.", branch, location)
                }
            };
            Err(ForgeError::platform(platform, message))
        }
        BranchCheck::Unverified(reason) => {
            warn!(
                branch,
                location,
                %reason,
                "could not verify branch exists, continuing"
            );
            Ok(())
        }
    }
}

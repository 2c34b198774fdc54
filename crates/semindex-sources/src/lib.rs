//! Concrete `Source` adapters and the source factory. `semindex-core`
//! defines the `Source` contract; this crate supplies the five
//! variants: local filesystem, GitHub, GitLab, Bitbucket, and a website crawler.

pub mod factory;
pub mod hosted_git;
pub mod localfs;

#[cfg(feature = "web")]
pub mod web;

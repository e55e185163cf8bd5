//! Version control adapters.

mod git;

pub use git::GitVersionControl;

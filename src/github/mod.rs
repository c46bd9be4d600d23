pub mod auth;
pub mod branches;
pub mod checks;
pub mod client;
pub mod comments;
pub mod errors;
pub mod issues;
pub mod pulls;
pub mod repos;
pub mod retry;
pub mod types;

pub use client::{ClientOptions, GitHubClient};
pub use errors::{ApiError, ForgeError};
pub use retry::RetryPolicy;
pub use types::{
    CheckAggregate, CheckRun, IssueComment, MergeMethod, MergeableState, PrState, PrView,
    Reaction, ReactionKind, ReactionTarget, Review,
};

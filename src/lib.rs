// Smyklot Library - pull request bot driven by comments, reactions and CI state
// This exposes the core components for testing and integration

pub mod cli;
pub mod codeowners;
pub mod commands;
pub mod config;
pub mod controller;
pub mod error;
pub mod executor;
pub mod feedback;
pub mod github;
pub mod labels;
pub mod permissions;
pub mod summary;
pub mod telemetry;

// Re-export key types for easy access
pub use codeowners::{Codeowners, Owner, OwnershipEntry};
pub use commands::{Command, CommandKind, Grammar, Modifiers};
pub use config::{BotConfig, ConfigOverrides};
pub use controller::{DeferredMergeController, PendingMergeState, PollReport};
pub use error::{ErrorKind, SmyklotError};
pub use executor::{CommentAction, CommentEvent, Executor};
pub use feedback::{Feedback, FeedbackType, Outcome};
pub use github::{ForgeError, GitHubClient};
pub use labels::PendingMarker;
pub use permissions::{PermissionResolver, TeamMembership};
pub use telemetry::{generate_correlation_id, init_telemetry};

pub mod collection;
pub mod grant;
pub mod seed;
pub mod submission;

pub use collection::{CollectionCommands, handle_collection_command};
pub use grant::{GrantCommands, handle_grant_command};
pub use seed::seed_command;
pub use submission::{SubmissionCommands, handle_submission_command};

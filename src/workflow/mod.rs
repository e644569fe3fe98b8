/// The quote, select and submit workflow, stage by stage.
pub mod file_pool;
pub mod generator;
pub mod picker;
pub mod quote;
pub mod round;
pub mod selector;
pub mod submission;

pub use file_pool::{FileLease, FilePool};
pub use generator::RequestGenerator;
pub use picker::{pick_winner, MAX_PRICE_TEXT_LEN};
pub use quote::{ConsumerPool, QuoteClient, Quoted};
pub use round::{RoundOutcome, RoundPlan, RoundRunner};
pub use selector::{ProviderSelector, RingWalk};
pub use submission::{OrderMark, SubmissionClient, SubmissionOutcome};

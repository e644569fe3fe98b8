/// Data model shared by the workflow stages.
pub mod job;
pub mod quote;

pub use job::{FormatSpec, Job, JobId, PageRange, PrintRequest, ProviderId, ProviderSet};
pub use quote::{Price, Quote, QuoteResponse, SelectedQuote, PAYMENT_METHOD};

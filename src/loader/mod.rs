/// Loading embedding files into the search cluster
///
/// Validate, upload in batches, then verify.
mod bulk;
mod validator;
mod verifier;

pub use bulk::{BatchOutcome, BulkLoader, BulkSettings, UploadResult, MAX_ERROR_SAMPLES};
pub use validator::{Rejection, Validator};
pub use verifier::{similarity_query, IndexHealth, SmokeQuery, VerificationReport, Verifier};

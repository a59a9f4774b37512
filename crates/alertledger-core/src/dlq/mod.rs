//! Dead-letter quarantine for messages that could not be converted.
//!
//! Each entry carries one code from the closed failure taxonomy and a
//! snapshot of the message (subject, sender, both bodies) so it can be
//! triaged, and replayed, without re-fetching mail. At most one entry exists
//! per message, and never alongside a ledger entry for the same message.

mod model;
mod repository;

pub use model::{DeadLetter, NewDeadLetter, QuarantineOutcome};
pub use repository::DlqRepository;

//! External provider clients and their trait seams.

pub mod email;
pub mod records;

pub use email::{EmailSender, OutboundEmail, SendGridClient, SendGridConfig};
pub use records::{QuickbaseClient, QuickbaseConfig, RecordStore};

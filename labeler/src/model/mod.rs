pub mod labels;
pub mod message;

pub use labels::LabelVocabulary;
pub use message::MailMessage;

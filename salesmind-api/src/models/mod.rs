//! Domain models

pub mod feedback;
pub mod recording;
pub mod tenant;

pub use feedback::{Feedback, FeedbackResponse, NewFeedback, SentimentCategory};
pub use recording::{InvalidTransition, NewRecording, ProcessingStatus, Recording, SaleStatus};
pub use tenant::{Client, Role, User};

//! HTTP API handlers for salesmind-api

pub mod feedback;
pub mod health;
pub mod recordings;

pub use feedback::feedback_routes;
pub use health::health_routes;
pub use recordings::recording_routes;

//! Chat Service Layer
//!
//! Direct and room messaging, real-time presence, and the websocket
//! gateway that ties them together.

pub mod dispatch;
pub mod events;
pub mod handlers;
pub mod messages;
pub mod models;
pub mod presence;
pub mod requests;

pub use handlers::router;
pub use messages::MessageStore;
pub use presence::PresenceRegistry;

pub mod brevo;
pub mod gateway;
pub mod recording;
pub mod templates;

pub use brevo::{BrevoConfig, BrevoGateway};
pub use gateway::{Attachment, GatewayError, NotificationGateway, OutboundEmail};
pub use recording::RecordingGateway;

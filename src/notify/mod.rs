//! Notification fan-out: message templates, in-app rows and push delivery.

pub mod dispatcher;
pub mod push;
pub mod templates;

pub use dispatcher::Dispatcher;
pub use push::{ExpoPush, PushError, PushRecord, PushTransport, SimulatedPush};
pub use templates::{render, RenderedMessage, TemplateData, TemplateKey};

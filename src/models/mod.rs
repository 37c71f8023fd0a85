pub mod chat;
pub mod clinician;
pub mod enums;
pub mod filters;
pub mod notification;
pub mod request;
pub mod user;

pub use chat::*;
pub use clinician::*;
pub use filters::*;
pub use notification::*;
pub use request::*;
pub use user::*;

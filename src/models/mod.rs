pub mod job;
pub mod notification;
pub mod session;
pub mod video;

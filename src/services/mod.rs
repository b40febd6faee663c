pub mod analysis;
pub mod intake;
pub mod notify;
pub mod poller;
pub mod upload;

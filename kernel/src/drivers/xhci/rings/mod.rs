pub mod command;
pub mod event;
pub mod transfer;
pub mod trbs;

pub use command::XHCICommandRing;
pub use event::XHCIEventRing;

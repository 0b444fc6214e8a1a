#![forbid(unsafe_code)]

mod protocol;
mod server;

pub use protocol::{Request, Response};
pub use server::IpcServer;

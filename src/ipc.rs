pub mod dispatch;
pub mod runtime;
pub mod server;

pub use server::{IpcServer, client_request};

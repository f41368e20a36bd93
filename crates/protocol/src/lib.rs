//! XML-over-NUL-terminated-stream protocol server (component C11): request
//! parsing, response serialization, command dispatch, and the `UnixListener`
//! accept loop that ties them to an [`fsal_manager::FsDbManager`].

mod dispatch;
mod request;
mod response;
mod server;
mod xml;

pub use dispatch::dispatch;
pub use request::ParsedRequest;
pub use response::Response;
pub use server::serve;

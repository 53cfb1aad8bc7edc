pub mod common;
pub mod error;
pub mod loading;
pub mod routing;
pub mod server;

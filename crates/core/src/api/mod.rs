pub mod client;
pub mod retry;
pub mod transport;

pub use client::*;
pub use retry::*;
pub use transport::*;

pub mod progress;
pub mod request;
pub mod status;

pub use progress::*;
pub use request::*;
pub use status::*;

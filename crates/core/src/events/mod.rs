pub mod channel;
pub mod event;
pub mod queues;

pub use channel::*;
pub use event::*;
pub use queues::*;

mod dq;
mod message;

pub use dq::{wrap as dq_wrap, DurableQueue};
pub use message::DeliveredMessage;

pub mod dispatcher;
pub mod redis_queue;

pub use dispatcher::*;
pub use redis_queue::*;

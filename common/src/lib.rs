pub use logger::*;
pub use ring_buffer::*;
pub use time::*;

pub mod logger;
pub mod macros;
pub mod ring_buffer;
pub mod time;

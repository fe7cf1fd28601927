mod cached;
mod handler;
mod ring;

pub use cached::*;
pub use handler::*;
pub use ring::*;

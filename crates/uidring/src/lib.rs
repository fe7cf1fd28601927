#![doc = include_str!("../README.md")]

mod bits;
mod buffer;
mod config;
mod error;
#[cfg(feature = "async-tokio")]
mod futures;
mod generator;
mod time;
mod worker;

pub use crate::bits::*;
pub use crate::buffer::*;
pub use crate::config::*;
pub use crate::error::*;
#[cfg_attr(docsrs, doc(cfg(feature = "async-tokio")))]
#[cfg(feature = "async-tokio")]
pub use crate::futures::*;
pub use crate::generator::*;
pub use crate::time::*;
pub use crate::worker::*;

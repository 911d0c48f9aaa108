mod base;
mod cable;
mod client;
mod poll;

pub use base::*;
pub use cable::*;
pub use client::*;
pub use poll::*;

mod bit_layout;
mod packing;

pub use bit_layout::*;
pub use packing::*;

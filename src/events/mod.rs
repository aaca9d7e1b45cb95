//! Change notifications and their coalescing accumulator.

mod accumulator;
mod event;

pub use accumulator::{ChangeAccumulator, Storage};
pub use event::{ChangeEvent, DeclarationChange};

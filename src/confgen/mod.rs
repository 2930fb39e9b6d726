//! Configuration generator: renders the current topology into the nested,
//! block-structured configuration text of the device under test.

mod render;
mod writer;

pub(crate) use render::*;
pub use writer::*;

#[cfg(test)]
mod confgen_test;

//! Testing utilities and harness for Arbor

pub mod testing;

pub use arbor_render::{RenderError, Renderer};
pub use testing::*;

pub mod prelude {
    pub use crate::testing::*;
}

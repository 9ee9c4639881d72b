pub mod common;
pub mod image;
pub mod request;

pub use common::*;
pub use image::*;
pub use request::*;

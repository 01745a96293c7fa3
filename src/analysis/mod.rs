//! Name binding and shape inference.
//!
//! Both passes run before DCP analysis; only the binder consults the
//! declaration table for names, the shape pass for declared shapes.

pub mod binder;
pub mod shapes;

pub use binder::bind;
pub use shapes::{infer_shapes, static_bound};

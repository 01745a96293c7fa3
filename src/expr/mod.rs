//! Expression data model.
//!
//! - `Shape` - NumPy-style shapes
//! - `Array` - dense constant values
//! - `Declaration` / `DeclTable` - variables, parameters and constants
//! - `Expr` - expression trees with cached shape, curvature and sign

pub mod array;
pub mod declaration;
pub mod node;
pub mod shape;

pub use array::Array;
pub use declaration::{
    Attributes, DeclKind, DeclLookup, DeclTable, Declaration, Derivation, Layered,
};
pub use node::{BinaryOp, Bound, Expr, ExprKind, Slice, Symbol, UnaryOp};
pub use shape::Shape;

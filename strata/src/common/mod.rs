//! Row model, key expressions and small shared building blocks.

mod expr;
mod row;
mod schema;
mod top_k;
mod value;

pub use expr::*;
pub use row::*;
pub use schema::*;
pub use top_k::*;
pub use value::*;

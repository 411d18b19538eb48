//! Semantic stage: lowering of the parsed OData AST into the IR, and
//! assembly of a whole query from OData system query options.

mod lowering;
mod odata;

pub use lowering::{lower_fields, lower_order, resolve_method, Lower};
pub use odata::{resolve_options, QueryOption, QueryOptions};

pub mod ast;
pub mod granularity;
pub mod filter;
pub mod results;
pub mod dispatcher;

pub use ast::Query;
pub use dispatcher::{QueryContext, QueryDispatcher, QueryEngine, QueryKind};
pub use filter::{DimFilter, SearchQuerySpec};
pub use granularity::Granularity;
pub use results::{ResultRow, Sequence};

//! Query model, parsing and access checking.
//!
//! Life of a query:
//! 1. `QueryParser` turns the request into a typed `Query`
//! 2. `QueryAccessChecker` checks every referenced field against the field ACL
//! 3. Storage runs the query
//! 4. `EagerLoader` resolves keypath computed keys into `_transient`

mod access;
mod eager;
mod parser;
mod types;

pub use access::QueryAccessChecker;
pub use eager::EagerLoader;
pub use parser::QueryParser;
pub use types::{
    Expression, Func, Operator, Predicate, PredicateChild, Query, RelationDirection, Sort,
    SortOrder,
};

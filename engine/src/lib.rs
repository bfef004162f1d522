// Life of a request:
// 1. JSON payload comes in with a caller-supplied context
// 2. Parse into typed records, IDs or a query
// 3. For writes:
//     - Fetch or create each record, check record and field ACL
//     - Merge, run before hooks, extend the schema
//     - Write deltas, commit or roll back, run after hooks
//    For reads:
//     - Check the query against field ACL
//     - Run it in storage, eager load includes
//     - Strip unreadable fields
//
// System components:
//  - Query model and parser
//  - Access control (record ACL, field ACL)
//  - Save/delete pipeline with atomic orchestration
//  - Storage collaborator (in-memory implementation included)

pub mod acl;
pub mod config;
pub mod context;
pub mod error;
pub mod hooks;
pub mod pipeline;
pub mod query;
pub mod schema;
pub mod simulation;
pub mod storage;
pub mod telemetry;
pub mod time;
pub mod types;

#[cfg(test)]
mod e2e_tests;
#[cfg(test)]
mod testing;

pub use config::EngineConfig;
pub use context::{AuthInfo, RequestContext};
pub use error::{EngineError, ErrorKind};
pub use pipeline::{ItemError, ItemResult, RecordEngine};
pub use storage::{MemoryStore, Storage};

//! # dynq
//!
//! Dynamic queries: a QuerySpec-to-SQL compiler paired with an AI-assisted
//! generation pipeline and an analytic-engine execution service.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   compile    ┌──────────────┐
//! │  QuerySpec   │ ───────────▶ │   SQL text   │
//! │   [spec]     │    [sql]     └──────────────┘
//! └──────────────┘
//!
//! ┌──────────────┐  prompt   ┌────────────────┐  tools  ┌─────────────┐
//! │ DynamicQuery │ ────────▶ │  Orchestrator  │ ◀─────▶ │ completion  │
//! │   [store]    │ ◀──────── │  [generation]  │         │  service    │
//! └──────────────┘ SQL + id  └────────────────┘         └─────────────┘
//!        │                          │ SSE frames
//!        │ stored SQL               ▼
//!        ▼                   ┌────────────────┐
//! ┌──────────────┐           │  HTTP [web]    │
//! │  [engine]    │ ─────────▶│                │
//! └──────────────┘  scalar   └────────────────┘
//! ```

pub mod completion;
pub mod config;
pub mod engine;
pub mod generation;
pub mod spec;
pub mod sql;
pub mod sse;
pub mod store;
pub mod web;

/// Re-exports for convenient usage.
pub mod prelude {
    pub use crate::spec::{
        Aggregate, Column, Filter, FilterOperator, FilterValue, Join, JoinKind, JoinTarget, Order,
        QuerySpec, TableRef,
    };
    pub use crate::sql::{compile, CompileError, Compiler};
    pub use crate::store::{DynamicQuery, DynamicQueryStore, QueryStatus};
}

pub use spec::QuerySpec;
pub use sql::compile;

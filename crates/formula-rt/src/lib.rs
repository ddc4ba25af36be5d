//! Formula runtime.
//!
//! Values, the mutation function family, the external store contract and
//! the engine that ties checking and evaluation together.
//!
//! - [`value`]: Runtime values and error values
//! - [`cancel`]: Cooperative cancellation
//! - [`store`]: The [`store::MutableStore`] contract and [`store::InMemoryStore`]
//! - [`function`]: Function contracts and the [`function::FunctionRegistry`]
//! - [`functions`]: Builtin implementations
//! - [`eval`]: Bound tree evaluation
//! - [`engine`]: [`engine::Engine`]

pub mod cancel;
pub mod engine;
pub mod eval;
pub mod function;
pub mod functions;
pub mod store;
pub mod value;

pub use cancel::CancellationSignal;
pub use engine::{Engine, EngineConfig, EngineError};
pub use eval::Bindings;
pub use value::{ErrorValue, ExpressionError, FormulaValue, RecordValue, TableValue};

//! Query dispatch
//!
//! Classification output is mapped to a handler binding by the static
//! registry, then the router invokes the live handler instance from the
//! injected store.

pub mod registry;
pub mod router;

pub use registry::{resolve, validate_bindings, HandlerBinding};
pub use router::{DispatchOutcome, Dispatcher};

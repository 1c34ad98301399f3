//! Per-connection bookkeeping for pipelined calls.
//!
//! Each established connection owns two question tables (one per sender
//! role), a parameter resolver that suspends only on unresolved forward
//! references, a method dispatcher, and a driver task that keeps reading
//! inbound frames while earlier calls are still executing.

mod connection;
mod errors;
mod issuer;
mod method_dispatch;
mod param_resolver;
mod question_table;
mod transport;

pub use connection::{establish_connection, ConnectionDriver};
pub use errors::CallFailure;
pub use issuer::IssuerHandle;
pub use method_dispatch::{MethodDispatcher, MethodHandler};
pub use param_resolver::resolve_params;
pub use question_table::QuestionTable;
pub use transport::{in_memory_transport_pair, FrameTransport, InMemoryTransport};

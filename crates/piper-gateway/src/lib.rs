//! WebSocket transport for the piper protocol plus the demo methods.
//!
//! The accepting side runs one connection driver per upgraded socket; the
//! connecting side adapts a tokio-tungstenite stream to the same transport
//! seam and hands back an issuer handle.

mod demo_methods;
mod ws_client;
mod ws_server;

pub use demo_methods::{demo_method_dispatcher, METHOD_APPEND_SUFFIX, METHOD_MAKE_GREETING};
pub use ws_client::connect_ws_issuer;
pub use ws_server::{build_gateway_router, run_gateway_server, ServeConfig};

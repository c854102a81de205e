pub mod context;
pub mod org_gate;

pub use context::{request_context_middleware, RequestContext};
pub use org_gate::org_gate_middleware;

pub mod context;
pub mod resolver;

pub use context::RequestContext;
pub use resolver::{ResolveError, ResolvedRoute, RouteResolver};

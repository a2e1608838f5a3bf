//! ABOUTME: Tool dispatch server for ragserve
//! ABOUTME: Authentication, middleware pipeline, dispatcher, MCP-over-HTTP transport

pub mod auth;
pub mod dispatcher;
pub mod http;
pub mod middleware;
pub mod platform;

pub use auth::{Authenticator, JwtClaims, Principal};
pub use dispatcher::{Dispatcher, ToolRegistry};
pub use http::{build_router, AppState};
pub use middleware::{AuthMaterial, Pipeline};
pub use platform::{Platform, PlatformOptions};

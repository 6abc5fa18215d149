//! # hawkwing
//!
//! An embeddable HTTP router: static and parameterized routes, per-route
//! middleware chains, static files, HTML templates with hot reload, and a
//! hyper-based server with graceful shutdown.
//!
//! ## Routing rules
//!
//! - Templates are `/`-delimited; a `:name` segment captures one non-empty
//!   path segment.
//! - One trailing slash is ignored on both templates and requests, so
//!   `/about` and `/about/` are the same route. `/` is only the root.
//! - Routes are tried in registration order and the first match wins.
//! - Unknown methods and unmatched paths get `404 Not Found`.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use hawkwing::{middleware, Method, Request, Response, Router, Server};
//!
//! #[tokio::main]
//! async fn main() {
//!     let app = Router::new()
//!         .get("/users/:name", get_user)
//!         .add_route(Method::POST, "/users", create_user, [middleware::auth()]);
//!
//!     Server::bind("0.0.0.0:8080").serve(app).await.unwrap();
//! }
//!
//! async fn get_user(req: Request) -> Response {
//!     let name = req.param("name").unwrap_or("stranger");
//!     Response::text(format!("Hello, {name}!"))
//! }
//!
//! async fn create_user(_req: Request) -> &'static str {
//!     "User created!"
//! }
//! ```

mod config;
mod error;
mod handler;
mod params;
mod pattern;
mod request;
mod response;
mod router;
mod server;
mod watch;

pub mod middleware;
pub mod static_files;
pub mod template;

pub use config::{AssetsConfig, Config, RouterConfig, ServerConfig};
pub use error::Error;
pub use handler::{BoxFuture, Handler};
pub use http::{Method, StatusCode};
pub use params::Params;
pub use pattern::{Pattern, PatternError};
pub use request::Request;
pub use response::{ContentType, IntoResponse, Response, ResponseBuilder};
pub use router::Router;
pub use server::Server;
pub use template::{TemplateError, Templates};
pub use watch::Watch;

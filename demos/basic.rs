//! Minimal hawkwing application: static and parameterized routes, guarded
//! POST, a panicking route that the server survives, and optional static
//! files and templates configured from TOML.
//!
//! Run with:
//!   RUST_LOG=info cargo run --example basic [hawkwing.toml]
//!
//! Try:
//!   curl http://localhost:8080/hello
//!   curl http://localhost:8080/users/Sam
//!   curl http://localhost:8080/about/
//!   curl -X POST http://localhost:8080/users                       # 403
//!   curl -X POST http://localhost:8080/users -H 'authorization: t' # 400
//!   curl -X POST http://localhost:8080/users \
//!        -H 'authorization: t' -H 'content-type: application/json' -d '{}'
//!   curl http://localhost:8080/panic                               # 500

use hawkwing::{middleware, Config, Method, Request, Response, Router, Server, Templates};
use serde_json::json;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), hawkwing::Error> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = match std::env::args().nth(1) {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };

    let mut app = Router::with_config(&config.router)
        .get("/", |_req: Request| async { "Welcome to Hawkwing!\n" })
        .get("/hello", |_req: Request| async { "Hello, World!" })
        .get("/users/:name", greet)
        .get("/about", |_req: Request| async { "This is the about page." })
        .add_route(
            Method::POST,
            "/users",
            |_req: Request| async { "User created!\n" },
            [middleware::auth(), middleware::content_type(["application/json"])],
        )
        .get("/panic", |_req: Request| async {
            if true {
                panic!("deliberate failure");
            }
            "unreachable"
        });

    let mut watches = Vec::new();

    if let (Some(prefix), Some(dir)) = (&config.assets.static_prefix, &config.assets.static_dir) {
        app = app.load_static(prefix, dir);
        if config.assets.watch {
            match hawkwing::static_files::watch(dir) {
                Ok(watch) => watches.push(watch),
                Err(e) => tracing::warn!("static files will not be watched: {e}"),
            }
        }
    }

    if let Some(dir) = &config.assets.templates_dir {
        let templates = Templates::load(dir)?;
        if config.assets.watch {
            watches.push(templates.watch(dir)?);
        }
        app = app.get("/page/:name", move |req: Request| {
            let templates = templates.clone();
            async move {
                let name = req.param("name").unwrap_or("visitor");
                templates.render_html("index.html", &json!({ "name": name }))
            }
        });
    }

    Server::from_config(&config.server).serve(app).await?;

    for watch in watches {
        watch.stop().await;
    }
    Ok(())
}

async fn greet(req: Request) -> Response {
    let name = req.param("name").unwrap_or("stranger");
    Response::text(format!("Hello, {name}!"))
}

//! Alpha Plugin - an SPA with an API route
//!
//! Serves `dist/` at the namespace root and answers `GET /api/hello`
//! inside the guest.

use webplug_sdk::prelude::*;

struct AlphaPlugin;

impl Plugin for AlphaPlugin {
    fn config() -> &'static str {
        include_str!("../server.module.toml")
    }

    fn routes() -> Vec<RouteSpec> {
        vec![
            RouteSpec::get("/api/hello"),
            SpaSpec::new("/", "dist")
                .ignore(IgnoreRule::Suffix(".map".into()))
                .pre_compressed(Precompressed::Brotli)
                .pre_compressed(Precompressed::Gzip)
                .max_age(300)
                .into(),
        ]
    }

    fn handle(request: GuestRequest) -> GuestResponse {
        let name = request
            .query
            .as_deref()
            .and_then(|q| q.split('&').find_map(|pair| pair.strip_prefix("name=")))
            .unwrap_or("world");

        host::log(host::Level::Debug, &format!("hello for {}", name));

        GuestResponse::json(format!("{{\"message\":\"Hello, {}!\"}}", name))
    }
}

export_plugin!(AlphaPlugin);

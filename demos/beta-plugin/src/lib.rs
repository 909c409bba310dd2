//! Beta Plugin - static bundle only

use webplug_sdk::prelude::*;

struct BetaPlugin;

impl Plugin for BetaPlugin {
    fn config() -> &'static str {
        include_str!("../server.module.toml")
    }

    fn routes() -> Vec<RouteSpec> {
        vec![SpaSpec::new("/", "dist").extension("html").into()]
    }

    fn handle(_request: GuestRequest) -> GuestResponse {
        GuestResponse::status(404)
    }

    fn display_name() -> Option<String> {
        Some("Beta (static)".to_string())
    }
}

export_plugin!(BetaPlugin);

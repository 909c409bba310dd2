//! Host pages: landing page and plugin listing

use super::handler::RequestHandler;
use super::http::{HttpRequest, HttpResponse};
use crate::introspection;
use crate::registry::LoadedPlugin;
use async_trait::async_trait;
use serde::Serialize;
use std::fmt::Write;
use std::sync::Arc;

/// One mounted plugin as shown at `/plugins/`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ListingEntry {
    pub id: String,
    pub display_name: String,
    pub namespace: String,
    pub link: String,
    pub origin: String,
}

impl ListingEntry {
    /// Snapshot a plugin's metadata; never fails
    pub fn for_plugin(plugin: &LoadedPlugin) -> Self {
        Self {
            id: plugin.descriptor.id().to_string(),
            display_name: introspection::display_name(plugin),
            namespace: plugin.descriptor.route_namespace().to_string(),
            link: plugin.descriptor.mount_path(),
            origin: introspection::origin(plugin),
        }
    }
}

pub struct LandingPage {
    plugin_count: usize,
}

impl LandingPage {
    pub fn new(plugin_count: usize) -> Self {
        Self { plugin_count }
    }
}

#[async_trait]
impl RequestHandler for LandingPage {
    async fn handle(&self, _request: HttpRequest) -> HttpResponse {
        HttpResponse::html(format!(
            "<!DOCTYPE html>\n<html>\n<head><title>webplug</title></head>\n<body>\n\
             <h1>webplug</h1>\n\
             <p>{} plugin(s) mounted. <a href=\"/plugins/\">Browse plugins</a></p>\n\
             </body>\n</html>\n",
            self.plugin_count
        ))
    }
}

/// `GET /plugins/`, computed once from the accepted plugin set
pub struct PluginListing {
    entries: Arc<[ListingEntry]>,
}

impl PluginListing {
    pub fn new(entries: impl Into<Arc<[ListingEntry]>>) -> Self {
        Self {
            entries: entries.into(),
        }
    }

    fn render_html(&self) -> String {
        let mut html = String::from(
            "<!DOCTYPE html>\n<html>\n<head><title>Plugins</title></head>\n\
             <body>\n<h1>Plugins</h1>\n",
        );
        if self.entries.is_empty() {
            html.push_str("<p>No plugins loaded.</p>\n");
        } else {
            html.push_str("<ul>\n");
            for entry in self.entries.iter() {
                let _ = writeln!(
                    html,
                    "<li><a href=\"{}\">{}</a> <small>{}</small></li>",
                    escape_html(&entry.link),
                    escape_html(&entry.display_name),
                    escape_html(&entry.origin),
                );
            }
            html.push_str("</ul>\n");
        }
        html.push_str("</body>\n</html>\n");
        html
    }

    fn render_json(&self) -> Result<String, serde_json::Error> {
        #[derive(Serialize)]
        struct Listing<'a> {
            plugins: &'a [ListingEntry],
        }

        serde_json::to_string(&Listing {
            plugins: &self.entries,
        })
    }
}

#[async_trait]
impl RequestHandler for PluginListing {
    async fn handle(&self, request: HttpRequest) -> HttpResponse {
        if !prefers_json(request.header("accept")) {
            return HttpResponse::html(self.render_html());
        }
        match self.render_json() {
            Ok(body) => HttpResponse::json(body),
            Err(e) => {
                tracing::error!(error = %e, "Failed to render plugin listing");
                HttpResponse::internal_error()
            }
        }
    }
}

/// JSON only when asked for ahead of (or instead of) HTML
fn prefers_json(accept: Option<&str>) -> bool {
    let Some(accept) = accept else {
        return false;
    };
    let position = |media: &str| {
        accept
            .split(',')
            .map(|item| item.split(';').next().unwrap_or("").trim())
            .position(|m| m.eq_ignore_ascii_case(media))
    };
    match (position("application/json"), position("text/html")) {
        (Some(json), Some(html)) => json < html,
        (Some(_), None) => true,
        _ => false,
    }
}

fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            c => escaped.push(c),
        }
    }
    escaped
}

//! Subcommand implementations

use crate::cli::parse_header;
use anyhow::Result;
use serde::Serialize;
use std::fmt::Write;
use std::io::Write as _;
use webplug_host::routing::ListingEntry;
use webplug_host::{Host, HttpRequest, HttpResponse, Method};

#[derive(Serialize)]
struct Report<'a> {
    mounted: &'a [ListingEntry],
    conflicts: Vec<ConflictReport<'a>>,
    skipped: Vec<SkippedReport>,
}

#[derive(Serialize)]
struct ConflictReport<'a> {
    namespace: &'a str,
    kept: &'a str,
    rejected: &'a str,
    origin: &'a str,
}

#[derive(Serialize)]
struct SkippedReport {
    path: String,
    error: String,
}

fn report(host: &Host) -> Report<'_> {
    let composition = host.composition();
    Report {
        mounted: &composition.mounted,
        conflicts: composition
            .conflicts
            .iter()
            .map(|c| ConflictReport {
                namespace: &c.namespace,
                kept: &c.kept,
                rejected: &c.rejected,
                origin: &c.rejected_origin,
            })
            .collect(),
        skipped: host
            .discovery()
            .failures
            .iter()
            .map(|(path, error)| SkippedReport {
                path: path.display().to_string(),
                error: error.to_string(),
            })
            .collect(),
    }
}

/// Text or JSON summary of what the host mounted
pub fn list(host: &Host, json: bool) -> Result<String> {
    let report = report(host);
    if json {
        return Ok(serde_json::to_string_pretty(&report)?);
    }

    let mut out = String::new();
    if report.mounted.is_empty() {
        writeln!(out, "No plugins mounted")?;
    }
    for entry in report.mounted {
        writeln!(
            out,
            "{:<24} {:<28} {}",
            entry.display_name, entry.link, entry.origin
        )?;
    }
    for conflict in &report.conflicts {
        writeln!(
            out,
            "conflict: namespace '{}' kept by {}, rejected {}",
            conflict.namespace, conflict.kept, conflict.rejected
        )?;
    }
    for skipped in &report.skipped {
        writeln!(out, "skipped: {} ({})", skipped.path, skipped.error)?;
    }
    Ok(out)
}

/// Dispatch one request and return the response
pub async fn get(
    host: &Host,
    target: &str,
    head: bool,
    headers: &[String],
) -> Result<HttpResponse> {
    let method = if head { Method::Head } else { Method::Get };
    let mut request = HttpRequest::new(method, target);
    for raw in headers {
        let (name, value) = parse_header(raw)?;
        request = request.with_header(name, value);
    }
    Ok(host.dispatch(request).await)
}

/// Write a response the way `curl -i` would
pub fn print_response(response: &HttpResponse, include: bool) -> Result<()> {
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    if include {
        writeln!(out, "HTTP {}", response.status)?;
        for (name, value) in &response.headers {
            writeln!(out, "{}: {}", name, value)?;
        }
        writeln!(out)?;
    }
    out.write_all(&response.body)?;
    out.flush()?;
    Ok(())
}

/// Problems found during startup, one line each
pub fn check(host: &Host) -> Vec<String> {
    let report = report(host);
    let conflicts = report.conflicts.iter().map(|c| {
        format!(
            "namespace '{}' claimed by {} and {}",
            c.namespace, c.kept, c.rejected
        )
    });
    let skipped = report
        .skipped
        .iter()
        .map(|s| format!("{}: {}", s.path, s.error));
    let routes = host
        .composition()
        .route_errors
        .iter()
        .map(|(plugin, error)| format!("{}: {}", plugin, error));

    conflicts.chain(skipped).chain(routes).collect()
}

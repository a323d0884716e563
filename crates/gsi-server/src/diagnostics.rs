//! Minimal HTML status page served on `GET`.
//!
//! Shows the pipeline's counters, the latest committed update, the filter
//! chain and the registered listeners. No filtering is applied to `GET`
//! requests, so the page never shows token values or raw documents.

use std::fmt::Write as _;

use gsi_core::IngestPipeline;

/// Render the page for `pipeline`'s current state.
pub fn render(pipeline: &IngestPipeline) -> String {
    let stats = pipeline.stats().snapshot();
    let server_id = pipeline.server_id();
    let latest = pipeline.tracker().latest();

    let (sequence, received, client, map_name, map_phase, heartbeat) = latest.as_ref().map_or_else(
        || {
            (
                String::from("-"),
                String::from("-"),
                String::from("-"),
                String::from("-"),
                String::from("-"),
                String::from("-"),
            )
        },
        |update| {
            let map = update.state.map.as_ref();
            (
                update.sequence().to_string(),
                update.context.received_at().to_rfc3339(),
                update.context.client().to_string(),
                map.and_then(|m| m.name.clone())
                    .unwrap_or_else(|| String::from("-")),
                map.and_then(|m| m.phase.as_ref())
                    .map_or_else(|| String::from("-"), ToString::to_string),
                update.context.is_heartbeat().to_string(),
            )
        },
    );

    let filters = list_items(&pipeline.filters().describe());
    let listeners = list_items(&pipeline.listeners().names());
    let delivery = format!("{:?}", pipeline.delivery());

    let sequence = escape(&sequence);
    let received = escape(&received);
    let client = escape(&client);
    let map_name = escape(&map_name);
    let map_phase = escape(&map_phase);

    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="utf-8">
    <title>GSI Relay</title>
    <style>
        body {{
            background: #0d1117;
            color: #c9d1d9;
            font-family: 'Cascadia Code', 'Fira Code', 'Consolas', monospace;
            padding: 2rem;
            max-width: 800px;
            margin: 0 auto;
        }}
        h1 {{ color: #58a6ff; margin-bottom: 0.25rem; }}
        .subtitle {{ color: #8b949e; margin-top: 0; }}
        .metric {{
            display: inline-block;
            background: #161b22;
            border: 1px solid #30363d;
            border-radius: 6px;
            padding: 1rem 1.5rem;
            margin: 0.5rem 0.5rem 0.5rem 0;
            min-width: 120px;
        }}
        .metric .label {{ color: #8b949e; font-size: 0.85rem; }}
        .metric .value {{ color: #58a6ff; font-size: 1.5rem; font-weight: bold; }}
        .status {{ color: #3fb950; font-weight: bold; }}
        td {{ padding: 0.2rem 1rem 0.2rem 0; }}
        td:first-child {{ color: #8b949e; }}
        hr {{ border: none; border-top: 1px solid #30363d; margin: 1.5rem 0; }}
    </style>
</head>
<body>
    <h1>GSI Relay</h1>
    <p class="subtitle">Game state integration endpoint -- server {server_id}</p>

    <p>Status: <span class="status">LISTENING</span></p>

    <div>
        <div class="metric">
            <div class="label">Accepted</div>
            <div class="value">{accepted}</div>
        </div>
        <div class="metric">
            <div class="label">Rejected</div>
            <div class="value">{rejected}</div>
        </div>
        <div class="metric">
            <div class="label">Malformed</div>
            <div class="value">{malformed}</div>
        </div>
        <div class="metric">
            <div class="label">Filtered</div>
            <div class="value">{filtered}</div>
        </div>
        <div class="metric">
            <div class="label">Decode failures</div>
            <div class="value">{decode_failed}</div>
        </div>
        <div class="metric">
            <div class="label">Session conflicts</div>
            <div class="value">{session_conflicts}</div>
        </div>
    </div>

    <hr>

    <h2>Latest update</h2>
    <table>
        <tr><td>Sequence</td><td>{sequence}</td></tr>
        <tr><td>Received</td><td>{received}</td></tr>
        <tr><td>Client</td><td>{client}</td></tr>
        <tr><td>Heartbeat</td><td>{heartbeat}</td></tr>
        <tr><td>Map</td><td>{map_name}</td></tr>
        <tr><td>Phase</td><td>{map_phase}</td></tr>
    </table>

    <h2>Filters</h2>
    <ul>{filters}</ul>

    <h2>Listeners ({delivery})</h2>
    <ul>{listeners}</ul>
</body>
</html>"#,
        accepted = stats.accepted,
        rejected = stats.rejected,
        malformed = stats.malformed,
        filtered = stats.filtered,
        decode_failed = stats.decode_failed,
        session_conflicts = stats.session_conflicts,
    )
}

fn list_items(items: &[String]) -> String {
    if items.is_empty() {
        return String::from("<li>none</li>");
    }
    items.iter().fold(String::new(), |mut html, item| {
        let _ = write!(html, "<li>{}</li>", escape(item));
        html
    })
}

/// Escape text for inclusion in HTML element content.
fn escape(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;

    use gsi_core::{FilterChain, ListenerRegistry, RawUpdate, RequireAuthToken};

    use super::*;

    #[test]
    fn empty_pipeline_renders_placeholders() {
        let page = render(&IngestPipeline::default());
        assert!(page.starts_with("<!DOCTYPE html>"));
        assert!(page.contains("<li>none</li>"));
        assert!(page.contains("<tr><td>Sequence</td><td>-</td></tr>"));
    }

    #[tokio::test]
    async fn shows_latest_update_and_hides_secrets() {
        let filters = FilterChain::new().with(RequireAuthToken::new("password", "hunter2"));
        let pipeline = IngestPipeline::new(filters, Arc::new(ListenerRegistry::default()));
        pipeline.listeners().register_fn("logger", |_| Ok(()));
        let body = br#"{"auth":{"password":"hunter2"},"map":{"name":"<de_dust2>","phase":"live"}}"#;
        pipeline
            .ingest(RawUpdate::new(body.to_vec(), "/", "127.0.0.1:1".parse().unwrap()))
            .await
            .unwrap();

        let page = render(&pipeline);
        assert!(page.contains("<tr><td>Sequence</td><td>1</td></tr>"));
        assert!(page.contains("&lt;de_dust2&gt;"));
        assert!(page.contains("<li>logger</li>"));
        assert!(page.contains("auth token &quot;password&quot;"));
        assert!(!page.contains("hunter2"));
    }

    #[test]
    fn escapes_markup() {
        assert_eq!(escape(r#"<a href="x">&'"#), "&lt;a href=&quot;x&quot;&gt;&amp;&#39;");
    }
}

//! HTML status page
//!
//! Rendered from the snapshot artifact on each request. Missing fields show
//! as `N/A`; a missing artifact renders a page saying so.

use serde_json::Value;
use std::fmt::Write;

const PLACEHOLDER: &str = "N/A";

fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Display text of a field, or the placeholder
fn field(value: &Value, path: &[&str]) -> String {
    let leaf = path.iter().fold(value, |v, key| &v[*key]);
    match leaf {
        Value::String(s) => escape(s),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        _ => PLACEHOLDER.to_string(),
    }
}

/// Render the status page for `snapshot`
pub fn render_status_page(snapshot: Option<&Value>) -> String {
    let mut html = String::from("<html><head><title>Network Status</title></head><body>");

    let Some(snapshot) = snapshot else {
        html.push_str("<h1>Network Status</h1><p>No data collected yet</p></body></html>");
        return html;
    };

    // Writing into a String cannot fail
    let _ = write!(
        html,
        "<h1>Network Status for {}</h1>\
         <p>Node Address: {}</p>\
         <p>Node Version: {}</p>\
         <p>Service Uptime: {}</p>\
         <p>Timestamp: {}</p>",
        field(snapshot, &["hostname"]),
        field(snapshot, &["node_addr"]),
        field(snapshot, &["node_version"]),
        field(snapshot, &["service_uptime"]),
        field(snapshot, &["timestamp"]),
    );

    if let Some(networks) = snapshot["network_info"].as_object() {
        for (network, info) in networks {
            if let Some(error) = info["error"].as_str() {
                let _ = write!(
                    html,
                    "<h2>Error for network {}: {}</h2>",
                    escape(network),
                    escape(error)
                );
                continue;
            }

            let _ = write!(
                html,
                "<h2>Network: {}</h2>\
                 <p>Our Node State: {}</p>\
                 <p>Network State: {}</p>\
                 <p>Main Status: {}</p>\
                 <p>Block Height: {}</p>\
                 <p>Sync: {}</p>\
                 <p>Stake Value: {}</p>\
                 <p>Sovereign Tax: {}</p>\
                 <p>MA7: {} (APY {})</p>\
                 <p>MA30: {} (APY {})</p>",
                escape(network),
                field(info, &["our_node_state"]),
                field(info, &["network_state"]),
                field(info, &["main_status"]),
                field(info, &["block_height"]),
                field(info, &["sync_percentage"]),
                field(info, &["stake_value"]),
                field(info, &["sovereign_addr_info", "sovereign_tax"]),
                field(info, &["fee_addr_info", "ma7", "value"]),
                field(info, &["fee_addr_info", "ma7", "apy"]),
                field(info, &["fee_addr_info", "ma30", "value"]),
                field(info, &["fee_addr_info", "ma30", "apy"]),
            );
        }
    }

    html.push_str("</body></html>");
    html
}

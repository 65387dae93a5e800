use actix_web::{
    HttpResponse, get,
    http::header::{CacheControl, CacheDirective, ContentType, LOCATION},
    web::Data,
};
use cdc::sink::ChangeSink;
use cdc::stats::StatsRow;

const PAGE_HEAD: &str = r#"<!DOCTYPE html>
<html>
<head>
<meta charset="utf-8">
<title>Changefeed Stats</title>
<meta http-equiv="refresh" content="1">
<style>
  body { font-family: system-ui, -apple-system, Segoe UI, Roboto, Helvetica, Arial, sans-serif; margin: 24px; }
  h1 { margin-bottom: 8px; }
  table { border-collapse: collapse; width: 100%; }
  th, td { padding: 8px 10px; border-bottom: 1px solid #eee; text-align: right; }
  th:first-child, td:first-child { text-align: left; }
  thead th { position: sticky; top: 0; background: #fafafa; }
  tbody tr:nth-child(odd) { background: #f7f7f9; }
  .mono { font-family: ui-monospace, SFMono-Regular, Menlo, Consolas, monospace; }
  .sub { color: #666; font-size: 12px; margin-bottom: 10px; }
</style>
</head>
<body>
  <h1>Changefeed Stats</h1>
  <div class="sub">Rolling windows over one second buckets. Rates are requests per second for requests that contained the table.</div>
  <table>
"#;

const PAGE_TAIL: &str = "  </table>\n</body>\n</html>\n";

/// Rolling statistics as an auto-refreshing HTML table.
#[get("/stats")]
pub async fn stats_page(sink: Data<ChangeSink>) -> HttpResponse {
    let rows = sorted_snapshot(&sink);
    let page = render_stats_page(&rows, sink.stats().windows_secs());

    HttpResponse::Ok()
        .insert_header(CacheControl(vec![CacheDirective::NoStore]))
        .content_type(ContentType::html())
        .body(page)
}

#[get("/stats.json")]
pub async fn stats_json(sink: Data<ChangeSink>) -> HttpResponse {
    HttpResponse::Ok()
        .insert_header(CacheControl(vec![CacheDirective::NoStore]))
        .json(sorted_snapshot(&sink))
}

#[get("/")]
pub async fn index() -> HttpResponse {
    HttpResponse::Found()
        .insert_header((LOCATION, "/stats"))
        .finish()
}

fn sorted_snapshot(sink: &ChangeSink) -> Vec<StatsRow> {
    let mut rows = sink.stats().snapshot(chrono::Utc::now().timestamp());
    rows.sort_by(|left, right| left.table.cmp(&right.table));

    rows
}

pub fn render_stats_page(rows: &[StatsRow], windows_secs: &[u64]) -> String {
    let mut page = String::from(PAGE_HEAD);
    page.push_str(&render_header(windows_secs));
    page.push_str("    <tbody>\n");
    for row in rows {
        page.push_str(&render_row(row));
    }
    page.push_str("    </tbody>\n");
    page.push_str(PAGE_TAIL);

    page
}

fn render_header(windows_secs: &[u64]) -> String {
    let rates = windows_secs
        .iter()
        .map(|window| format!("<th>Req/s {}</th>", window_label(*window)));
    let sizes = windows_secs
        .iter()
        .map(|window| format!("<th>Avg JSON bytes {}</th>", window_label(*window)));
    let cells: String = rates.chain(sizes).collect();

    format!("    <thead><tr><th>Table</th>{cells}</tr></thead>\n")
}

fn render_row(row: &StatsRow) -> String {
    let rates = row
        .windows
        .iter()
        .map(|window| format!("<td>{:.3}</td>", window.rate));
    let sizes = row
        .windows
        .iter()
        .map(|window| format!("<td>{:.3}</td>", window.avg_bytes));
    let cells: String = rates.chain(sizes).collect();

    format!(
        "      <tr><td class=\"mono\">{}</td>{cells}</tr>\n",
        escape_html(&row.table)
    )
}

/// `60` -> `1m`, `3600` -> `1h`, `45` -> `45s`.
fn window_label(window_secs: u64) -> String {
    if window_secs >= 3600 && window_secs % 3600 == 0 {
        format!("{}h", window_secs / 3600)
    } else if window_secs >= 60 && window_secs % 60 == 0 {
        format!("{}m", window_secs / 60)
    } else {
        format!("{window_secs}s")
    }
}

fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&#34;"),
            '\'' => escaped.push_str("&#39;"),
            other => escaped.push(other),
        }
    }

    escaped
}

#[cfg(test)]
mod tests {
    use cdc::stats::WindowStats;

    use super::*;

    fn row(table: &str) -> StatsRow {
        StatsRow {
            table: table.to_string(),
            windows: vec![
                WindowStats {
                    window_secs: 60,
                    rate: 10.0 / 60.0,
                    avg_bytes: 200.0,
                },
                WindowStats {
                    window_secs: 3600,
                    rate: 10.0 / 3600.0,
                    avg_bytes: 200.0,
                },
            ],
        }
    }

    #[test]
    fn rows_use_three_decimals_and_escape_names() {
        insta::assert_snapshot!(
            render_row(&row("<orders>")).trim(),
            @r#"<tr><td class="mono">&lt;orders&gt;</td><td>0.167</td><td>0.003</td><td>200.000</td><td>200.000</td></tr>"#
        );
    }

    #[test]
    fn header_labels_every_window() {
        insta::assert_snapshot!(
            render_header(&[60, 300, 900, 3600]).trim(),
            @"<thead><tr><th>Table</th><th>Req/s 1m</th><th>Req/s 5m</th><th>Req/s 15m</th><th>Req/s 1h</th><th>Avg JSON bytes 1m</th><th>Avg JSON bytes 5m</th><th>Avg JSON bytes 15m</th><th>Avg JSON bytes 1h</th></tr></thead>"
        );
    }

    #[test]
    fn page_auto_refreshes() {
        let page = render_stats_page(&[row("orders")], &[60, 3600]);

        assert!(page.contains(r#"<meta http-equiv="refresh" content="1">"#));
        assert!(page.contains(r#"<td class="mono">orders</td>"#));
        assert_eq!(window_label(45), "45s");
    }
}

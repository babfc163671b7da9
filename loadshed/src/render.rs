//! Snapshot rendering: a standalone HTML page with an ECharts line chart.

use std::time::Duration;

use serde_json::{Value, json};

use crate::stats::{Outcome, Snapshot};

const ECHARTS_SRC: &str = "https://cdn.jsdelivr.net/npm/echarts@5/dist/echarts.min.js";

/// Fixed colours, independent of label iteration order.
pub fn color(outcome: Outcome) -> &'static str {
    match outcome {
        Outcome::Admitted => "#2f4554",
        Outcome::Rejected => "#c23531",
    }
}

/// Chart title for a harness run, e.g. `5 concurrent requests 500ms sleep`.
pub fn chart_title(limit: usize, sleep: Duration) -> String {
    format!("{} concurrent requests {}ms sleep", limit, sleep.as_millis())
}

/// ECharts option object for a snapshot: one line series per known label.
pub fn chart_options(snapshot: &Snapshot) -> Value {
    let series: Vec<Value> = snapshot
        .series
        .iter()
        .map(|(outcome, buckets)| {
            let data: Vec<u64> = buckets.iter().map(|b| b.count).collect();
            json!({
                "name": outcome.as_str(),
                "type": "line",
                "data": data,
                "lineStyle": { "color": color(*outcome) },
                "itemStyle": { "color": color(*outcome) },
            })
        })
        .collect();

    json!({
        "title": { "text": snapshot.title },
        "legend": { "show": true },
        "tooltip": { "trigger": "axis" },
        "xAxis": { "type": "category", "data": snapshot.seconds() },
        "yAxis": { "type": "value" },
        "series": series,
    })
}

/// Full HTML page for a snapshot.
pub fn render_html(snapshot: &Snapshot) -> String {
    // `</` inside the inline script would terminate it early.
    let options = chart_options(snapshot).to_string().replace("</", "<\\/");
    let title = escape_html(&snapshot.title);

    format!(
        r#"<!DOCTYPE html>
<html>
<head>
<meta charset="utf-8">
<title>{title}</title>
<script src="{ECHARTS_SRC}"></script>
</head>
<body>
<div id="chart" style="width:900px;height:500px;"></div>
<script type="text/javascript">
echarts.init(document.getElementById("chart"), "white").setOption({options});
</script>
</body>
</html>
"#
    )
}

fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stats::Stats;
    use chrono::DateTime;

    fn snapshot() -> Snapshot {
        let at = |s| DateTime::from_timestamp(s, 0).unwrap();
        let stats = Stats::with_start(chart_title(5, Duration::from_millis(500)), at(10));
        stats.record(Outcome::Admitted, at(10));
        stats.record(Outcome::Rejected, at(11));
        stats.record(Outcome::Rejected, at(11));
        stats.snapshot(at(10), at(12))
    }

    #[test]
    fn chart_title_format() {
        assert_eq!(
            chart_title(5, Duration::from_millis(500)),
            "5 concurrent requests 500ms sleep"
        );
    }

    #[test]
    fn chart_options_shape() {
        insta::assert_json_snapshot!(chart_options(&snapshot()), @r##"
        {
          "legend": {
            "show": true
          },
          "series": [
            {
              "data": [
                1,
                0,
                0
              ],
              "itemStyle": {
                "color": "#2f4554"
              },
              "lineStyle": {
                "color": "#2f4554"
              },
              "name": "admitted",
              "type": "line"
            },
            {
              "data": [
                0,
                2,
                0
              ],
              "itemStyle": {
                "color": "#c23531"
              },
              "lineStyle": {
                "color": "#c23531"
              },
              "name": "rejected",
              "type": "line"
            }
          ],
          "title": {
            "text": "5 concurrent requests 500ms sleep"
          },
          "tooltip": {
            "trigger": "axis"
          },
          "xAxis": {
            "data": [
              10,
              11,
              12
            ],
            "type": "category"
          },
          "yAxis": {
            "type": "value"
          }
        }
        "##);
    }

    #[test]
    fn html_embeds_options_and_title() {
        let html = render_html(&snapshot());
        assert!(html.contains("<title>5 concurrent requests 500ms sleep</title>"));
        assert!(html.contains(ECHARTS_SRC));
        assert!(html.contains(r#""name":"rejected""#));
    }

    #[test]
    fn html_escapes_title() {
        let stats = Stats::new("<b>\"load\"</b>");
        let html = render_html(&stats.snapshot_to_now());
        assert!(html.contains("<title>&lt;b&gt;&quot;load&quot;&lt;/b&gt;</title>"));
        assert!(!html.contains("</b>"));
    }
}

//! Prometheus text exposition format (version 0.0.4).

use crate::registry::{CollectedMetric, MetricValue};
use std::fmt::{self, Write};

pub const CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

/// Renders a sorted snapshot, one `# HELP`/`# TYPE` header per metric name.
pub fn render<F>(metrics: &[CollectedMetric], help: F) -> String
where
    F: Fn(&str) -> Option<String>,
{
    let mut out = String::with_capacity(metrics.len() * 64);
    let mut current: Option<&str> = None;

    for metric in metrics {
        // writing into a String never fails
        if current != Some(metric.name.as_str()) {
            _ = write_header(&mut out, metric, help(&metric.name));
            current = Some(metric.name.as_str());
        }
        _ = write_samples(&mut out, metric);
    }

    out
}

fn write_header(out: &mut String, metric: &CollectedMetric, help: Option<String>) -> fmt::Result {
    let name = &metric.name;
    if let Some(help) = help {
        writeln!(out, "# HELP {name} {}", escape_help(&help))?;
    }
    writeln!(out, "# TYPE {name} {}", metric.value.kind().as_str())
}

fn write_samples(out: &mut String, metric: &CollectedMetric) -> fmt::Result {
    let name = &metric.name;
    let labels = format_labels(&metric.labels, None);

    match &metric.value {
        MetricValue::Counter(value) => writeln!(out, "{name}{labels} {value}"),
        MetricValue::Gauge(value) => writeln!(out, "{name}{labels} {}", format_value(*value)),
        MetricValue::Histogram(h) => {
            for (bound, count) in &h.buckets {
                let le = format_labels(&metric.labels, Some(format_value(*bound).as_str()));
                writeln!(out, "{name}_bucket{le} {count}")?;
            }
            let inf = format_labels(&metric.labels, Some("+Inf"));
            writeln!(out, "{name}_bucket{inf} {}", h.count)?;
            writeln!(out, "{name}_sum{labels} {}", format_value(h.sum))?;
            writeln!(out, "{name}_count{labels} {}", h.count)
        }
        MetricValue::Summary(s) => {
            writeln!(out, "{name}_sum{labels} {}", format_value(s.sum))?;
            writeln!(out, "{name}_count{labels} {}", s.count)
        }
    }
}

fn format_labels(labels: &[(String, String)], le: Option<&str>) -> String {
    if labels.is_empty() && le.is_none() {
        return String::new();
    }

    let pairs = labels
        .iter()
        .map(|(key, value)| (key.as_str(), value.as_str()))
        .chain(le.map(|le| ("le", le)))
        .map(|(key, value)| format!("{key}=\"{}\"", escape_label_value(value)))
        .collect::<Vec<_>>();
    format!("{{{}}}", pairs.join(","))
}

fn format_value(value: f64) -> String {
    if value.is_nan() {
        "NaN".to_string()
    } else if value == f64::INFINITY {
        "+Inf".to_string()
    } else if value == f64::NEG_INFINITY {
        "-Inf".to_string()
    } else {
        value.to_string()
    }
}

fn escape_label_value(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n")
}

fn escape_help(help: &str) -> String {
    help.replace('\\', "\\\\").replace('\n', "\\n")
}

//! Prometheus text exposition format.
//!
//! Renders scalars and vectors into the text format scraped by a
//! Prometheus server or compatible agent. Both metric kinds are exposed as
//! `gauge`: a drain metric is the delta accumulated since the previous
//! scrape, which is not monotonic.

use std::fmt::Write as _;

use crate::cell::MetricKind;
use crate::vector::MetricVector;

/// Accumulates metric families into one exposition document.
#[derive(Debug, Default)]
pub struct Exposition {
    out: String,
}

impl Exposition {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an unlabeled sample.
    pub fn push_value(&mut self, name: &str, kind: MetricKind, value: f64) {
        self.header(name, kind);
        let _ = writeln!(self.out, "{name} {}", format_value(value));
    }

    /// Append one sample per vector row, sorted by label.
    pub fn push_vector(&mut self, name: &str, vector: &MetricVector) {
        self.header(name, vector.kind());
        let key = vector.label_key();
        for label in vector.labels() {
            let value = vector.get(label).unwrap_or_default();
            let _ = writeln!(
                self.out,
                "{name}{{{key}=\"{}\"}} {}",
                escape_label(label),
                format_value(value)
            );
        }
    }

    pub fn finish(self) -> String {
        self.out
    }

    fn header(&mut self, name: &str, kind: MetricKind) {
        let help = match kind {
            MetricKind::Gauge => "Latest polled value.",
            MetricKind::Drain => "Accumulated since the previous scrape.",
        };
        let _ = writeln!(self.out, "# HELP {name} {help}");
        let _ = writeln!(self.out, "# TYPE {name} gauge");
    }
}

/// Whether `name` matches `[a-zA-Z_:][a-zA-Z0-9_:]*`.
pub fn is_valid_metric_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' || c == ':' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == ':')
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

fn escape_label(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => escaped.push_str("\\\\"),
            '"' => escaped.push_str("\\\""),
            '\n' => escaped.push_str("\\n"),
            _ => escaped.push(c),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_empty() {
        assert_eq!(Exposition::new().finish(), "");
    }

    #[test]
    fn render_scalar() {
        let mut exposition = Exposition::new();
        exposition.push_value("chain_height", MetricKind::Gauge, 1234.0);
        let output = exposition.finish();

        assert!(output.contains("# HELP chain_height Latest polled value."));
        assert!(output.contains("# TYPE chain_height gauge"));
        assert!(output.contains("chain_height 1234\n"));
    }

    #[test]
    fn render_drain_as_gauge() {
        let mut exposition = Exposition::new();
        exposition.push_value("tx_failed", MetricKind::Drain, 2.5);
        let output = exposition.finish();

        assert!(output.contains("# HELP tx_failed Accumulated since the previous scrape."));
        assert!(output.contains("# TYPE tx_failed gauge"));
        assert!(output.contains("tx_failed 2.5\n"));
    }

    #[test]
    fn render_vector_sorted_by_label() {
        let mut stake = MetricVector::gauge("validator");
        stake.set("bob", 2.0);
        stake.set("alice", 1.0);

        let mut exposition = Exposition::new();
        exposition.push_vector("stake", &stake);
        let output = exposition.finish();

        let alice = output.find("stake{validator=\"alice\"} 1").unwrap();
        let bob = output.find("stake{validator=\"bob\"} 2").unwrap();
        assert!(alice < bob);
    }

    #[test]
    fn label_values_are_escaped() {
        let mut v = MetricVector::gauge("moniker");
        v.set("say \"hi\"\\\n", 1.0);

        let mut exposition = Exposition::new();
        exposition.push_vector("m", &v);
        let output = exposition.finish();

        assert!(output.contains(r#"m{moniker="say \"hi\"\\\n"} 1"#));
    }

    #[test]
    fn non_finite_values() {
        assert_eq!(format_value(f64::NAN), "NaN");
        assert_eq!(format_value(f64::INFINITY), "+Inf");
        assert_eq!(format_value(f64::NEG_INFINITY), "-Inf");
        assert_eq!(format_value(0.25), "0.25");
    }

    #[test]
    fn metric_name_validation() {
        assert!(is_valid_metric_name("chainwatch_tx_failed"));
        assert!(is_valid_metric_name("_private:sub"));
        assert!(!is_valid_metric_name(""));
        assert!(!is_valid_metric_name("1abc"));
        assert!(!is_valid_metric_name("has-dash"));
    }

    #[test]
    fn every_sample_line_is_name_labels_value() {
        let mut v = MetricVector::drain("validator");
        v.add("a", 1.0);
        let mut exposition = Exposition::new();
        exposition.push_value("x", MetricKind::Gauge, 1.0);
        exposition.push_vector("y", &v);

        for line in exposition.finish().lines() {
            if line.starts_with('#') {
                continue;
            }
            let mut parts = line.rsplitn(2, ' ');
            let value = parts.next().unwrap();
            assert!(value.parse::<f64>().is_ok(), "bad value in {line}");
            assert!(parts.next().is_some(), "missing name in {line}");
        }
    }
}

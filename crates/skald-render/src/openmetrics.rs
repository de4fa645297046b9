//! OpenMetrics text rendering of collected series.
//! https://github.com/prometheus/OpenMetrics/blob/main/specification/OpenMetrics.md

use skald::Series;

/// Renders a series snapshot as OpenMetrics text.
///
/// Series sharing an instrument name form one metric family: the HELP,
/// UNIT, and TYPE comment lines are emitted once per family, followed by
/// one value line per label set. The snapshot's own ordering (name, then
/// series key) is preserved, so output is stable across renders.
pub fn render(series: &[Series]) -> String {
    let mut out = String::new();
    let mut current_family: Option<&str> = None;

    for s in series {
        if current_family != Some(s.info.name.as_str()) {
            if current_family.is_some() {
                out.push('\n');
            }
            current_family = Some(s.info.name.as_str());
            if let Some(description) = &s.info.description {
                out.push_str(&format!("# HELP {} {}\n", s.info.name, description));
            }
            if let Some(unit) = &s.info.unit {
                out.push_str(&format!("# UNIT {} {}\n", s.info.name, unit));
            }
            out.push_str(&format!("# TYPE {} {}\n", s.info.name, s.info.kind));
        }

        out.push_str(&s.info.name);
        if !s.tags.is_empty() {
            let labels: Vec<String> = s
                .tags
                .iter()
                .map(|(k, v)| format!("{k}=\"{}\"", label_value(v)))
                .collect();
            out.push_str(&format!("{{{}}}", labels.join(",")));
        }
        out.push_str(&format!(" {} {}\n", s.value, s.updated_at.timestamp()));
    }
    out
}

/// Label values lose their JSON quoting; everything else renders as JSON.
fn label_value(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use serde_json::json;
    use skald::{InstrumentInfo, InstrumentKind, MetricValue, Tags, types::series_key};

    fn series(
        name: &str,
        kind: InstrumentKind,
        unit: Option<&str>,
        description: Option<&str>,
        tags: &[(&str, serde_json::Value)],
        value: MetricValue,
    ) -> Series {
        let tags: Tags = tags
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect();
        Series {
            key: series_key(name, &tags),
            info: InstrumentInfo {
                name: name.to_string(),
                kind,
                unit: unit.map(str::to_string),
                description: description.map(str::to_string),
            },
            tags,
            value,
            updated_at: Utc.with_ymd_and_hms(2026, 8, 1, 12, 0, 0).unwrap(),
        }
    }

    #[test]
    fn test_family_header_emitted_once() {
        let snapshot = vec![
            series(
                "requests",
                InstrumentKind::Counter,
                Some("1"),
                Some("handled requests"),
                &[("code", json!("200"))],
                MetricValue::Int(5),
            ),
            series(
                "requests",
                InstrumentKind::Counter,
                Some("1"),
                Some("handled requests"),
                &[("code", json!("500"))],
                MetricValue::Int(1),
            ),
        ];
        let text = render(&snapshot);
        assert_eq!(text.matches("# HELP requests").count(), 1);
        assert_eq!(text.matches("# UNIT requests 1").count(), 1);
        assert_eq!(text.matches("# TYPE requests counter").count(), 1);
        assert!(text.contains("requests{code=\"200\"} 5 1785585600"));
        assert!(text.contains("requests{code=\"500\"} 1 1785585600"));
    }

    #[test]
    fn test_missing_metadata_lines_skipped() {
        let snapshot = vec![series(
            "temperature",
            InstrumentKind::Gauge,
            None,
            None,
            &[],
            MetricValue::Float(19.5),
        )];
        let text = render(&snapshot);
        assert!(!text.contains("# HELP"));
        assert!(!text.contains("# UNIT"));
        assert!(text.contains("# TYPE temperature gauge"));
        assert!(text.contains("temperature 19.5 "));
    }

    #[test]
    fn test_families_separated_by_blank_line() {
        let snapshot = vec![
            series(
                "alpha",
                InstrumentKind::Counter,
                None,
                None,
                &[],
                MetricValue::Int(1),
            ),
            series(
                "beta",
                InstrumentKind::Gauge,
                None,
                None,
                &[],
                MetricValue::Int(2),
            ),
        ];
        let text = render(&snapshot);
        assert!(text.contains("\n\n# TYPE beta gauge"));
    }

    #[test]
    fn test_string_labels_render_unquoted() {
        let snapshot = vec![series(
            "requests",
            InstrumentKind::Counter,
            None,
            None,
            &[("method", json!("GET")), ("port", json!(8080))],
            MetricValue::Int(3),
        )];
        let text = render(&snapshot);
        assert!(text.contains("method=\"GET\""));
        assert!(text.contains("port=\"8080\""));
    }
}

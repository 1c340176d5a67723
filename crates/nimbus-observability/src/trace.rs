//! Distributed-trace continuation via the W3C `traceparent`/`baggage`
//! headers (spec §4.9). New for this engine: the teacher's observability
//! crate emits local events only and never continues a trace across a
//! webhook boundary, but an inbound webhook here genuinely crosses a
//! process boundary worth tying back to the upstream caller's trace.

use std::collections::HashMap;

/// Parsed `traceparent` header (`00-<trace_id>-<parent_id>-<flags>`) plus
/// any `baggage` key/value pairs carried alongside it.
#[derive(Debug, Clone, PartialEq)]
pub struct TraceContext {
    pub version: String,
    pub trace_id: String,
    pub parent_id: String,
    pub flags: String,
    pub baggage: HashMap<String, String>,
}

impl TraceContext {
    /// Parses a `traceparent` header value and an optional `baggage` header
    /// value. Returns `None` if `traceparent` is missing or malformed —
    /// callers should start a fresh trace in that case rather than error.
    pub fn parse(traceparent: &str, baggage: Option<&str>) -> Option<Self> {
        let parts: Vec<&str> = traceparent.split('-').collect();
        if parts.len() != 4 {
            return None;
        }
        let [version, trace_id, parent_id, flags] = [parts[0], parts[1], parts[2], parts[3]];
        if trace_id.len() != 32 || parent_id.len() != 16 {
            return None;
        }
        if trace_id.chars().all(|c| c == '0') || parent_id.chars().all(|c| c == '0') {
            return None;
        }

        Some(Self {
            version: version.to_string(),
            trace_id: trace_id.to_string(),
            parent_id: parent_id.to_string(),
            flags: flags.to_string(),
            baggage: baggage.map(parse_baggage).unwrap_or_default(),
        })
    }

    /// Derives the span context this process should log against: a fresh
    /// span id, parented to the inbound trace.
    pub fn child_span(&self, span_id: String) -> SpanContext {
        SpanContext { trace_id: self.trace_id.clone(), span_id, parent_span_id: Some(self.parent_id.clone()) }
    }
}

fn parse_baggage(header: &str) -> HashMap<String, String> {
    header
        .split(',')
        .filter_map(|pair| {
            let mut kv = pair.splitn(2, '=');
            let key = kv.next()?.trim();
            let value = kv.next()?.trim();
            if key.is_empty() {
                return None;
            }
            Some((key.to_string(), value.to_string()))
        })
        .collect()
}

/// The span context attached to an [`ErrorCapture`](crate::ErrorCapture),
/// identifying where in a (possibly cross-process) trace the error occurred.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct SpanContext {
    pub trace_id: String,
    pub span_id: String,
    pub parent_span_id: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_valid_traceparent_and_baggage() {
        let header = "00-4bf92f3577b34da6a3ce929d0e0e4736-00f067aa0ba902b7-01";
        let ctx = TraceContext::parse(header, Some("org_id=org_1, user_id=user_2")).unwrap();
        assert_eq!(ctx.trace_id, "4bf92f3577b34da6a3ce929d0e0e4736");
        assert_eq!(ctx.parent_id, "00f067aa0ba902b7");
        assert_eq!(ctx.baggage.get("org_id"), Some(&"org_1".to_string()));
    }

    #[test]
    fn rejects_all_zero_trace_id() {
        let header = "00-00000000000000000000000000000000-00f067aa0ba902b7-01";
        assert!(TraceContext::parse(header, None).is_none());
    }

    #[test]
    fn rejects_malformed_header() {
        assert!(TraceContext::parse("not-a-traceparent", None).is_none());
    }

    #[test]
    fn child_span_parents_to_inbound_parent_id() {
        let header = "00-4bf92f3577b34da6a3ce929d0e0e4736-00f067aa0ba902b7-01";
        let ctx = TraceContext::parse(header, None).unwrap();
        let span = ctx.child_span("a1b2c3d4e5f60718".to_string());
        assert_eq!(span.parent_span_id.as_deref(), Some("00f067aa0ba902b7"));
        assert_eq!(span.trace_id, ctx.trace_id);
    }
}

//! In-memory span tracing for pipeline debugging.
//!
//! This is distinct from the process-level `tracing` crate usage elsewhere
//! in the crate: a [`Tracer`] records a tree of [`Span`]s for a single
//! pipeline run, so a caller can inspect or print exactly what happened for
//! that run (e.g. attach it to a debug endpoint). [`NoOpTracer`] is the
//! default, zero-overhead stand-in used when nobody wants the tree.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Instant;

#[derive(Debug, Clone)]
pub enum AttrValue {
    Int(i64),
    Str(String),
}

impl From<usize> for AttrValue {
    fn from(v: usize) -> Self {
        AttrValue::Int(v as i64)
    }
}

impl From<&str> for AttrValue {
    fn from(v: &str) -> Self {
        AttrValue::Str(v.to_string())
    }
}

impl From<String> for AttrValue {
    fn from(v: String) -> Self {
        AttrValue::Str(v)
    }
}

/// A single traced operation, finished (duration known) once popped off the
/// tracer's stack.
#[derive(Debug, Clone)]
pub struct Span {
    pub name: String,
    #[doc(hidden)]
    start: Instant,
    pub duration_ms: f64,
    pub attributes: HashMap<String, AttrValue>,
    pub children: Vec<Span>,
}

impl Span {
    fn open(name: &str) -> Self {
        Self {
            name: name.to_string(),
            start: Instant::now(),
            duration_ms: 0.0,
            attributes: HashMap::new(),
            children: Vec::new(),
        }
    }

    pub fn set(&mut self, key: &str, value: impl Into<AttrValue>) {
        self.attributes.insert(key.to_string(), value.into());
    }
}

#[derive(Default)]
struct TracerState {
    roots: Vec<Span>,
    stack: Vec<Span>,
}

/// Collects a tree of spans for later inspection.
#[derive(Default)]
pub struct Tracer {
    state: Mutex<TracerState>,
}

impl Tracer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a span. The returned guard closes and records the span when
    /// dropped (typically at the end of a scope via `let _s = tracer.span(
    /// "name");`).
    pub fn span(&self, name: &str) -> SpanGuard<'_> {
        self.state.lock().unwrap().stack.push(Span::open(name));
        SpanGuard { tracer: self }
    }

    /// Set an attribute on the currently open (innermost) span.
    pub fn set_current(&self, key: &str, value: impl Into<AttrValue>) {
        if let Some(span) = self.state.lock().unwrap().stack.last_mut() {
            span.set(key, value);
        }
    }

    fn close_innermost(&self) {
        let mut state = self.state.lock().unwrap();
        if let Some(mut span) = state.stack.pop() {
            span.duration_ms = span.start.elapsed().as_secs_f64() * 1000.0;
            if let Some(parent) = state.stack.last_mut() {
                parent.children.push(span);
            } else {
                state.roots.push(span);
            }
        }
    }

    pub fn spans(&self) -> Vec<Span> {
        self.state.lock().unwrap().roots.clone()
    }

    pub fn format(&self) -> String {
        let roots = self.state.lock().unwrap().roots.clone();
        let mut lines = Vec::new();
        for span in &roots {
            format_span(span, &mut lines, 0);
        }
        lines.join("\n")
    }

    pub fn print(&self) {
        let formatted = self.format();
        if !formatted.is_empty() {
            println!("{formatted}");
        }
    }
}

/// Closes the span it was created from when dropped.
pub struct SpanGuard<'t> {
    tracer: &'t Tracer,
}

impl SpanGuard<'_> {
    pub fn set(&self, key: &str, value: impl Into<AttrValue>) {
        self.tracer.set_current(key, value);
    }
}

impl Drop for SpanGuard<'_> {
    fn drop(&mut self) {
        self.tracer.close_innermost();
    }
}

fn format_span(span: &Span, lines: &mut Vec<String>, indent: usize) {
    let prefix = "  ".repeat(indent);
    lines.push(format!("{prefix}[TRACE] {} ({:.1}ms)", span.name, span.duration_ms));
    for (key, value) in &span.attributes {
        let rendered = match value {
            AttrValue::Int(v) => v.to_string(),
            AttrValue::Str(v) => v.clone(),
        };
        lines.push(format!("{prefix}  {key}: {rendered}"));
    }
    for child in &span.children {
        format_span(child, lines, indent + 1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nested_spans_build_a_tree() {
        let tracer = Tracer::new();
        {
            let outer = tracer.span("outer");
            outer.set("k", "v");
            {
                let _inner = tracer.span("inner");
            }
        }
        let roots = tracer.spans();
        assert_eq!(roots.len(), 1);
        assert_eq!(roots[0].name, "outer");
        assert_eq!(roots[0].children.len(), 1);
        assert_eq!(roots[0].children[0].name, "inner");
    }
}

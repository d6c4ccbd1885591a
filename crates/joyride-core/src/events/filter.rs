//! Event filters
//!
//! A filter is a conjunction of optional criteria. At least one criterion
//! must be present, otherwise [`EventFilter::new`] fails.

use std::fmt;
use std::sync::Arc;

use super::event::Event;
use crate::error::{Error, Result};

/// Arbitrary predicate over an event
pub type EventPredicate = Arc<dyn Fn(&Event) -> bool + Send + Sync>;

/// Criteria used to construct an [`EventFilter`]
#[derive(Clone, Default)]
pub struct FilterCriteria {
    pub event_type: Option<String>,
    pub source: Option<String>,
    pub pattern: Option<String>,
    pub custom: Option<EventPredicate>,
}

impl FilterCriteria {
    pub fn new() -> Self {
        Self::default()
    }

    /// Match events whose type equals `event_type`
    pub fn event_type(mut self, event_type: impl Into<String>) -> Self {
        self.event_type = Some(event_type.into());
        self
    }

    /// Match events produced by `source`
    pub fn source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Match event types against a glob such as `dns.*`
    pub fn pattern(mut self, pattern: impl Into<String>) -> Self {
        self.pattern = Some(pattern.into());
        self
    }

    /// Match events for which `predicate` returns true
    pub fn custom<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&Event) -> bool + Send + Sync + 'static,
    {
        self.custom = Some(Arc::new(predicate));
        self
    }

    fn is_empty(&self) -> bool {
        self.event_type.is_none()
            && self.source.is_none()
            && self.pattern.is_none()
            && self.custom.is_none()
    }
}

impl fmt::Debug for FilterCriteria {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FilterCriteria")
            .field("event_type", &self.event_type)
            .field("source", &self.source)
            .field("pattern", &self.pattern)
            .field("custom", &self.custom.is_some())
            .finish()
    }
}

/// Pure predicate over events
#[derive(Clone, Debug)]
pub struct EventFilter {
    criteria: FilterCriteria,
}

impl EventFilter {
    /// Build a filter; fails when no criterion is given
    pub fn new(criteria: FilterCriteria) -> Result<Self> {
        if criteria.is_empty() {
            return Err(Error::invalid_filter(
                "At least one filter criterion must be specified",
            ));
        }
        if matches!(&criteria.event_type, Some(t) if t.is_empty()) {
            return Err(Error::invalid_filter("Event type cannot be empty"));
        }
        if matches!(&criteria.source, Some(s) if s.is_empty()) {
            return Err(Error::invalid_filter("Source cannot be empty"));
        }
        if matches!(&criteria.pattern, Some(p) if p.is_empty()) {
            return Err(Error::invalid_filter("Pattern cannot be empty"));
        }
        Ok(Self { criteria })
    }

    /// Whether every supplied criterion holds for `event`
    pub fn matches(&self, event: &Event) -> bool {
        if let Some(event_type) = &self.criteria.event_type {
            if event.event_type() != event_type {
                return false;
            }
        }
        if let Some(source) = &self.criteria.source {
            if event.source() != source {
                return false;
            }
        }
        if let Some(pattern) = &self.criteria.pattern {
            if !glob_match(pattern, event.event_type()) {
                return false;
            }
        }
        if let Some(predicate) = &self.criteria.custom {
            if !predicate(event) {
                return false;
            }
        }
        true
    }

    /// Exact event type criterion, if any
    pub fn event_type(&self) -> Option<&str> {
        self.criteria.event_type.as_deref()
    }

    /// Source criterion, if any
    pub fn source(&self) -> Option<&str> {
        self.criteria.source.as_deref()
    }

    /// Pattern criterion, if any
    pub fn pattern(&self) -> Option<&str> {
        self.criteria.pattern.as_deref()
    }
}

impl fmt::Display for EventFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::new();
        if let Some(t) = &self.criteria.event_type {
            parts.push(format!("type={}", t));
        }
        if let Some(s) = &self.criteria.source {
            parts.push(format!("source={}", s));
        }
        if let Some(p) = &self.criteria.pattern {
            parts.push(format!("pattern={}", p));
        }
        if self.criteria.custom.is_some() {
            parts.push("custom".to_string());
        }
        write!(f, "EventFilter({})", parts.join(", "))
    }
}

/// Case-insensitive, anchored glob match
///
/// `*` matches any run of characters and `?` exactly one. `[seq]` matches one
/// character in `seq` and `[!seq]` one character not in it; `seq` may hold
/// ranges such as `a-z`. An unterminated `[` matches itself.
fn glob_match(pattern: &str, text: &str) -> bool {
    let p: Vec<char> = pattern.to_lowercase().chars().collect();
    let t: Vec<char> = text.to_lowercase().chars().collect();

    let (mut pi, mut ti) = (0, 0);
    let mut backtrack: Option<(usize, usize)> = None;

    while ti < t.len() {
        if pi < p.len() && p[pi] == '*' {
            backtrack = Some((pi, ti));
            pi += 1;
            continue;
        }
        if let Some(next) = (pi < p.len()).then(|| match_one(&p, pi, t[ti])).flatten() {
            pi = next;
            ti += 1;
        } else if let Some((star, matched)) = backtrack {
            pi = star + 1;
            ti = matched + 1;
            backtrack = Some((star, matched + 1));
        } else {
            return false;
        }
    }

    p[pi..].iter().all(|&c| c == '*')
}

/// Match the pattern element at `pi` against `c`, returning the index after it
fn match_one(p: &[char], pi: usize, c: char) -> Option<usize> {
    match p[pi] {
        '?' => Some(pi + 1),
        '[' => match match_class(p, pi + 1, c) {
            Some((true, next)) => Some(next),
            Some((false, _)) => None,
            None => (c == '[').then_some(pi + 1),
        },
        literal => (literal == c).then_some(pi + 1),
    }
}

/// Evaluate a character class whose body starts at `start`
///
/// Returns whether `c` is accepted and the index after the closing `]`, or
/// `None` when the class is never closed. A `]` first in the body is literal.
fn match_class(p: &[char], start: usize, c: char) -> Option<(bool, usize)> {
    let mut i = start;
    let negated = p.get(i) == Some(&'!');
    if negated {
        i += 1;
    }

    let body = i;
    let mut found = false;
    loop {
        let &first = p.get(i)?;
        if first == ']' && i > body {
            return Some((found != negated, i + 1));
        }
        match (p.get(i + 1), p.get(i + 2)) {
            (Some('-'), Some(&last)) if last != ']' => {
                found |= (first..=last).contains(&c);
                i += 3;
            }
            _ => {
                found |= first == c;
                i += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::event::SystemPayload;

    fn event(event_type: &str, source: &str) -> Event {
        Event::new(event_type, source, SystemPayload::new("test", "op", "ok")).unwrap()
    }

    #[test]
    fn test_empty_criteria_rejected() {
        assert!(EventFilter::new(FilterCriteria::new()).is_err());
        assert!(EventFilter::new(FilterCriteria::new().pattern("")).is_err());
    }

    #[test]
    fn test_empty_type_or_source_rejected() {
        assert!(EventFilter::new(FilterCriteria::new().event_type("")).is_err());
        assert!(EventFilter::new(FilterCriteria::new().source("")).is_err());
        assert!(EventFilter::new(FilterCriteria::new().event_type("a").source("")).is_err());
    }

    #[test]
    fn test_exact_type_and_source() {
        let filter = EventFilter::new(
            FilterCriteria::new()
                .event_type("dns.record.added")
                .source("hosts_detector"),
        )
        .unwrap();

        assert!(filter.matches(&event("dns.record.added", "hosts_detector")));
        assert!(!filter.matches(&event("dns.record.added", "docker")));
        assert!(!filter.matches(&event("dns.record.removed", "hosts_detector")));
    }

    #[test]
    fn test_wildcard_pattern() {
        let filter = EventFilter::new(FilterCriteria::new().pattern("dns.*")).unwrap();

        assert!(filter.matches(&event("dns.record.added", "x")));
        assert!(filter.matches(&event("DNS.Record.Removed", "x")));
        assert!(!filter.matches(&event("system.started", "x")));
        assert!(!filter.matches(&event("dnsx", "x")));
    }

    #[test]
    fn test_custom_predicate_is_anded() {
        let filter = EventFilter::new(
            FilterCriteria::new()
                .pattern("system.*")
                .custom(|e| e.source() == "daemon"),
        )
        .unwrap();

        assert!(filter.matches(&event("system.started", "daemon")));
        assert!(!filter.matches(&event("system.started", "other")));
        assert!(!filter.matches(&event("dns.record.added", "daemon")));
    }

    #[test]
    fn test_glob_match() {
        assert!(glob_match("*", ""));
        assert!(glob_match("*", "anything.at.all"));
        assert!(glob_match("file.*.changed", "file.hosts.changed"));
        assert!(glob_match("node.?oined", "node.joined"));
        assert!(!glob_match("node.?oined", "node.rejoined"));
        assert!(!glob_match("dns.record", "dns.record.added"));
        assert!(glob_match("*.added", "dns.record.added"));
    }

    #[test]
    fn test_glob_character_classes() {
        assert!(glob_match("node.[jl]*", "node.joined"));
        assert!(glob_match("node.[jl]*", "node.left"));
        assert!(!glob_match("node.[jl]*", "node.updated"));
        assert!(glob_match("node.[!jl]*", "node.updated"));
        assert!(!glob_match("node.[!jl]*", "node.joined"));
        assert!(glob_match("v[0-9].*", "v2.ready"));
        assert!(!glob_match("v[0-9].*", "vx.ready"));
        assert!(glob_match("[]]x", "]x"));
        assert!(glob_match("a[b", "a[b"));
        assert!(!glob_match("a[b", "ab"));
        assert!(glob_match("*.[A-Z]DDED", "dns.record.added"));
    }

    #[test]
    fn test_display_describes_criteria() {
        let filter =
            EventFilter::new(FilterCriteria::new().event_type("a").pattern("b*")).unwrap();
        assert_eq!(filter.to_string(), "EventFilter(type=a, pattern=b*)");
    }
}

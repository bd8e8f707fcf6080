//! Outbound filter rules, bus to socket (SPEC_FULL.md §4.5).

use relay_common::{FilterSet, Frame, Kind};
use serde_json::{Map, Value};

/// Small-frames mode threshold: at or below this `max_frame_size`, the
/// client has asked for `uuid`/`meta` to be stripped before measuring.
const SMALL_FRAME_THRESHOLD: usize = 256;

const DEFAULT_MAX_FRAME_SIZE: usize = 1024;

#[derive(Debug, Clone)]
pub struct OutboundFilters {
    pub event: FilterSet,
    pub message: FilterSet,
    /// Shared by `request` and `response`: a response passes iff its
    /// request's name was allowed.
    pub request: FilterSet,
    pub max_frame_size: usize,
}

impl Default for OutboundFilters {
    fn default() -> Self {
        Self {
            event: FilterSet::all(),
            message: FilterSet::all(),
            request: FilterSet::all(),
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
        }
    }
}

impl OutboundFilters {
    /// Applies the five filter steps to `frame` in place, returning whether
    /// it should be forwarded to the socket.
    pub fn apply(&self, frame: &mut Frame) -> bool {
        if self.max_frame_size <= SMALL_FRAME_THRESHOLD {
            frame.clear_correlation();
            frame.clear_meta();
        }

        let Ok(encoded) = frame.encode() else {
            return false;
        };
        if encoded.len() > self.max_frame_size {
            return false;
        }

        match frame.kind {
            Kind::Event => self.event.contains(&frame.name),
            Kind::Message => self.message.contains(&frame.name),
            Kind::Request | Kind::Response => self.request.contains(&frame.name),
            Kind::Command => false,
        }
    }

    /// Applies a `filter{size?, names?}` command. Unset or empty fields
    /// leave the current value untouched.
    pub fn update(&mut self, size: Option<u64>, names: Option<&Map<String, Value>>) {
        if let Some(size) = size {
            self.max_frame_size = size as usize;
        }
        let Some(names) = names else { return };
        if let Some(set) = parse_names(names, "event") {
            self.event = set;
        }
        if let Some(set) = parse_names(names, "message") {
            self.message = set;
        }
        if let Some(set) = parse_names(names, "request") {
            self.request = set;
        }
    }
}

fn parse_names(record: &Map<String, Value>, key: &str) -> Option<FilterSet> {
    let value = record.get(key)?;
    let names: Vec<String> = value
        .as_array()?
        .iter()
        .filter_map(|v| v.as_str().map(str::to_string))
        .collect();
    if names.is_empty() {
        return None;
    }
    Some(FilterSet::named(names))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn default_allows_everything_within_the_default_size() {
        let filters = OutboundFilters::default();
        let mut frame = Frame::new(Kind::Event, "ping");
        assert!(filters.apply(&mut frame));
    }

    #[test]
    fn oversized_frame_is_dropped() {
        let mut filters = OutboundFilters::default();
        filters.max_frame_size = 10;
        let mut frame = Frame::new(Kind::Event, "a-long-enough-name-to-overflow");
        assert!(!filters.apply(&mut frame));
    }

    #[test]
    fn small_frames_mode_strips_uuid_and_meta_before_measuring() {
        let mut filters = OutboundFilters::default();
        filters.max_frame_size = 256;
        let mut frame = Frame::new(Kind::Event, "ping").with_uuid(uuid::Uuid::nil());
        frame.set_meta("source", json!({"name": "alice"}));
        assert!(filters.apply(&mut frame));
        assert_eq!(frame.uuid, None);
        assert!(frame.meta.is_empty());
    }

    #[test]
    fn event_kind_checked_against_event_set() {
        let mut filters = OutboundFilters::default();
        filters.event = FilterSet::named(["ping".to_string()]);
        let mut allowed = Frame::new(Kind::Event, "ping");
        let mut rejected = Frame::new(Kind::Event, "pong");
        assert!(filters.apply(&mut allowed));
        assert!(!filters.apply(&mut rejected));
    }

    #[test]
    fn request_and_response_share_one_filter_set() {
        let mut filters = OutboundFilters::default();
        filters.request = FilterSet::named(["status".to_string()]);
        let mut request = Frame::new(Kind::Request, "status");
        let mut response = Frame::new(Kind::Response, "status");
        let mut rejected = Frame::new(Kind::Response, "other");
        assert!(filters.apply(&mut request));
        assert!(filters.apply(&mut response));
        assert!(!filters.apply(&mut rejected));
    }

    #[test]
    fn command_kind_is_never_forwarded_over_the_bus_path() {
        let filters = OutboundFilters::default();
        let mut frame = Frame::new(Kind::Command, "login");
        assert!(!filters.apply(&mut frame));
    }

    #[test]
    fn update_leaves_unset_fields_untouched() {
        let mut filters = OutboundFilters::default();
        filters.event = FilterSet::named(["ping".to_string()]);
        filters.update(Some(2048), None);
        assert_eq!(filters.max_frame_size, 2048);
        assert_eq!(filters.event, FilterSet::named(["ping".to_string()]));
    }

    #[test]
    fn update_replaces_named_sets_from_the_names_record() {
        let mut filters = OutboundFilters::default();
        let mut names = Map::new();
        names.insert("event".into(), json!(["a", "b"]));
        filters.update(None, Some(&names));
        assert_eq!(filters.event, FilterSet::named(["a".to_string(), "b".to_string()]));
        assert_eq!(filters.message, FilterSet::all());
    }
}

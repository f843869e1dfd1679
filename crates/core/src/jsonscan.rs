//! Streaming extraction of selected paths from a JSON document.
//!
//! A [`Scanner`] is loaded with search registrations (a path of object keys
//! bound to a caller-owned slot) and then consumes an input stream exactly
//! once. Matched subtrees are decoded into the bound slots; everything else
//! is skipped without being materialized. Array paths are decoded element by
//! element, optionally through a caller-supplied filter, so a large array
//! never sits in memory at once.
//!
//! Paths are sequences of object keys. Arrays are transparent: a key inside
//! an object inside an array still extends the path of the enclosing object.
//! For non-array paths the first occurrence in the stream wins.

use std::any::Any;
use std::collections::HashMap;
use std::io::Read;
use std::sync::Arc;

use serde::de::value::MapAccessDeserializer;
use serde::de::{self, DeserializeOwned, DeserializeSeed, IgnoredAny, MapAccess, SeqAccess, Visitor};
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

/// Errors produced while registering paths or scanning a stream.
#[derive(Debug, Error)]
pub enum JsonScanError {
    /// The input is not well-formed JSON.
    #[error("malformed JSON: {0}")]
    Parse(String),

    /// A value in the stream does not fit the slot registered for its path,
    /// or a filter was attached to a slot that is not a sequence.
    #[error("type mismatch at path ({path}): {reason}")]
    TypeMismatch { path: String, reason: String },

    /// At least one registered path never appeared in the stream.
    #[error("not all registered paths were found")]
    PathsIncomplete,

    /// The new path extends a previously registered one.
    #[error("path ({path}) is a continuation of the registered path ({existing})")]
    PathContinuation { path: String, existing: String },

    /// A path key is the empty string.
    #[error("path contains an empty key")]
    EmptyKey,

    /// `set_filter` named a path with no registration.
    #[error("no registration for path ({0})")]
    UnknownPath(String),
}

fn path_display(path: &[String]) -> String {
    if path.is_empty() {
        "<whole document>".to_string()
    } else {
        path.join(" -> ")
    }
}

/// A decoding destination bound to one path.
trait Slot {
    /// Whether this slot consumes array elements one by one.
    fn is_seq(&self) -> bool;

    /// Decode a complete (non-array) value into the slot.
    fn put(&mut self, value: Value) -> Result<(), String>;

    /// Decode one array element, apply the filter, append on pass.
    fn push(&mut self, value: Value) -> Result<(), String>;

    /// Attach a type-erased element predicate. Fails on non-sequence slots
    /// and on predicates over the wrong element type.
    fn attach_filter(&mut self, pred: Box<dyn Any>) -> Result<(), String>;
}

struct ValueSlot<'t, T: DeserializeOwned> {
    target: &'t mut T,
}

impl<'t, T: DeserializeOwned> Slot for ValueSlot<'t, T> {
    fn is_seq(&self) -> bool {
        false
    }

    fn put(&mut self, value: Value) -> Result<(), String> {
        *self.target = T::deserialize(value).map_err(|e| e.to_string())?;
        Ok(())
    }

    fn push(&mut self, _value: Value) -> Result<(), String> {
        Err("slot is not a sequence".to_string())
    }

    fn attach_filter(&mut self, _pred: Box<dyn Any>) -> Result<(), String> {
        Err("filter on a non-sequence slot".to_string())
    }
}

type ElementFilter<T> = Arc<dyn Fn(&T) -> bool + Send + Sync>;

struct SeqSlot<'t, T: DeserializeOwned + 'static> {
    target: &'t mut Vec<T>,
    filter: Option<ElementFilter<T>>,
}

impl<'t, T: DeserializeOwned + 'static> Slot for SeqSlot<'t, T> {
    fn is_seq(&self) -> bool {
        true
    }

    fn put(&mut self, _value: Value) -> Result<(), String> {
        Err("slot is a sequence".to_string())
    }

    fn push(&mut self, value: Value) -> Result<(), String> {
        let element = T::deserialize(value).map_err(|e| e.to_string())?;
        if self.filter.as_ref().map_or(true, |pred| pred(&element)) {
            self.target.push(element);
        }
        Ok(())
    }

    fn attach_filter(&mut self, pred: Box<dyn Any>) -> Result<(), String> {
        match pred.downcast::<ElementFilter<T>>() {
            Ok(pred) => {
                self.filter = Some(*pred);
                Ok(())
            }
            Err(_) => Err("filter element type differs from the slot's".to_string()),
        }
    }
}

struct Registration<'t> {
    slots: Vec<Box<dyn Slot + 't>>,
    found: bool,
}

/// Accumulates search registrations, then walks a JSON stream once.
///
/// The scanner mutably borrows every registered target until it is dropped;
/// read the targets out after the scan.
#[derive(Default)]
pub struct Scanner<'t> {
    regs: HashMap<Vec<String>, Registration<'t>>,
    /// Failure raised from inside the serde walk, where only the
    /// deserializer's error type can cross the boundary.
    failure: Option<JsonScanError>,
}

impl<'t> Scanner<'t> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `path` to `target`; the first value at that path is decoded into
    /// it. An empty `path` decodes the whole document. Array values need
    /// [`Scanner::search_seq`] instead.
    pub fn search_for<T: DeserializeOwned>(
        &mut self,
        target: &'t mut T,
        path: &[&str],
    ) -> Result<(), JsonScanError> {
        self.register(path, Box::new(ValueSlot { target }))
    }

    /// Bind an array `path` to `target`; elements are decoded one by one and
    /// appended, subject to a filter attached with [`Scanner::set_filter`].
    pub fn search_seq<T: DeserializeOwned + 'static>(
        &mut self,
        target: &'t mut Vec<T>,
        path: &[&str],
    ) -> Result<(), JsonScanError> {
        self.register(path, Box::new(SeqSlot { target, filter: None }))
    }

    /// Attach an element predicate to an already-registered sequence path.
    /// Elements failing the predicate are decoded and discarded.
    pub fn set_filter<T, F>(&mut self, path: &[&str], pred: F) -> Result<(), JsonScanError>
    where
        T: DeserializeOwned + 'static,
        F: Fn(&T) -> bool + Send + Sync + 'static,
    {
        let key: Vec<String> = path.iter().map(|k| k.to_string()).collect();
        let reg = self
            .regs
            .get_mut(&key)
            .ok_or_else(|| JsonScanError::UnknownPath(path_display(&key)))?;

        let pred: ElementFilter<T> = Arc::new(pred);
        for slot in &mut reg.slots {
            slot.attach_filter(Box::new(pred.clone()))
                .map_err(|reason| JsonScanError::TypeMismatch {
                    path: path_display(&key),
                    reason,
                })?;
        }
        Ok(())
    }

    /// Walk the stream once. Succeeds only if every registered path was
    /// encountered; otherwise returns [`JsonScanError::PathsIncomplete`].
    pub fn scan<R: Read>(&mut self, reader: R) -> Result<(), JsonScanError> {
        let mut de = serde_json::Deserializer::from_reader(reader);
        let walked = NodeSeed { scanner: self, path: Vec::new() }.deserialize(&mut de);

        if let Some(failure) = self.failure.take() {
            return Err(failure);
        }
        walked.map_err(|e| JsonScanError::Parse(e.to_string()))?;

        if self.regs.values().all(|reg| reg.found) {
            Ok(())
        } else {
            Err(JsonScanError::PathsIncomplete)
        }
    }

    /// Drop all registrations, releasing the target borrows' bookkeeping.
    pub fn reset(&mut self) {
        self.regs.clear();
        self.failure = None;
    }

    fn register(&mut self, path: &[&str], slot: Box<dyn Slot + 't>) -> Result<(), JsonScanError> {
        if path.iter().any(|key| key.is_empty()) {
            return Err(JsonScanError::EmptyKey);
        }
        let key: Vec<String> = path.iter().map(|k| k.to_string()).collect();

        // A continuation of an existing path can never be reached: the
        // existing registration consumes the subtree first.
        for existing in self.regs.keys() {
            if key.len() > existing.len() && key.starts_with(existing) {
                return Err(JsonScanError::PathContinuation {
                    path: path_display(&key),
                    existing: path_display(existing),
                });
            }
        }
        // The more general path wins over previously registered descendants.
        self.regs
            .retain(|existing, _| !(existing.len() > key.len() && existing.starts_with(&key)));

        self.regs
            .entry(key)
            .or_insert_with(|| Registration { slots: Vec::new(), found: false })
            .slots
            .push(slot);
        Ok(())
    }

    fn is_pending_match(&self, path: &[String]) -> bool {
        self.regs.get(path).is_some_and(|reg| !reg.found)
    }

    fn has_descendant(&self, path: &[String]) -> bool {
        self.regs
            .keys()
            .any(|key| key.len() > path.len() && key.starts_with(path))
    }

    fn abort<E: de::Error>(&mut self, failure: JsonScanError) -> E {
        self.failure = Some(failure);
        E::custom("scan aborted")
    }
}

/// Seed for one node of the document: either decode it (registered path),
/// descend into it (some registration lies below), or skip it untouched.
struct NodeSeed<'w, 't> {
    scanner: &'w mut Scanner<'t>,
    path: Vec<String>,
}

impl<'de, 'w, 't> DeserializeSeed<'de> for NodeSeed<'w, 't> {
    type Value = ();

    fn deserialize<D>(self, deserializer: D) -> Result<(), D::Error>
    where
        D: de::Deserializer<'de>,
    {
        if self.scanner.is_pending_match(&self.path) {
            return MatchSeed { scanner: self.scanner, path: self.path }.deserialize(deserializer);
        }
        if self.scanner.has_descendant(&self.path) {
            deserializer.deserialize_any(WalkVisitor { scanner: self.scanner, path: self.path })
        } else {
            IgnoredAny::deserialize(deserializer).map(|_| ())
        }
    }
}

/// Walks an unmatched interior node looking for registered paths below it.
struct WalkVisitor<'w, 't> {
    scanner: &'w mut Scanner<'t>,
    path: Vec<String>,
}

impl<'de, 'w, 't> Visitor<'de> for WalkVisitor<'w, 't> {
    type Value = ();

    fn expecting(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.write_str("any JSON value")
    }

    fn visit_map<A: MapAccess<'de>>(mut self, mut map: A) -> Result<(), A::Error> {
        while let Some(key) = map.next_key::<String>()? {
            let mut path = self.path.clone();
            path.push(key);
            map.next_value_seed(NodeSeed { scanner: &mut *self.scanner, path })?;
        }
        Ok(())
    }

    fn visit_seq<A: SeqAccess<'de>>(mut self, mut seq: A) -> Result<(), A::Error> {
        // Arrays do not contribute path keys; walk the elements in place.
        while seq
            .next_element_seed(NodeSeed {
                scanner: &mut *self.scanner,
                path: self.path.clone(),
            })?
            .is_some()
        {}
        Ok(())
    }

    fn visit_bool<E>(self, _: bool) -> Result<(), E> {
        Ok(())
    }

    fn visit_i64<E>(self, _: i64) -> Result<(), E> {
        Ok(())
    }

    fn visit_u64<E>(self, _: u64) -> Result<(), E> {
        Ok(())
    }

    fn visit_f64<E>(self, _: f64) -> Result<(), E> {
        Ok(())
    }

    fn visit_str<E>(self, _: &str) -> Result<(), E> {
        Ok(())
    }

    fn visit_unit<E>(self) -> Result<(), E> {
        Ok(())
    }
}

/// Decodes the node at a registered path into its slots.
struct MatchSeed<'w, 't> {
    scanner: &'w mut Scanner<'t>,
    path: Vec<String>,
}

impl<'w, 't> MatchSeed<'w, 't> {
    /// Deliver a complete non-array value to the slots at this path.
    /// Sequence slots at the same path are left unfilled, and therefore
    /// unfound, exactly as if the path had never produced an array.
    fn deliver<E: de::Error>(self, value: Value) -> Result<(), E> {
        let mut delivered = false;
        let mut fail = None;
        {
            let reg = self.scanner.regs.get_mut(&self.path).expect("path checked");
            for slot in &mut reg.slots {
                if slot.is_seq() {
                    continue;
                }
                match slot.put(value.clone()) {
                    Ok(()) => delivered = true,
                    Err(reason) => {
                        fail = Some(reason);
                        break;
                    }
                }
            }
            if fail.is_none() && delivered {
                reg.found = true;
            }
        }
        if let Some(reason) = fail {
            let path = path_display(&self.path);
            return Err(self
                .scanner
                .abort(JsonScanError::TypeMismatch { path, reason }));
        }
        Ok(())
    }
}

impl<'de, 'w, 't> DeserializeSeed<'de> for MatchSeed<'w, 't> {
    type Value = ();

    fn deserialize<D>(self, deserializer: D) -> Result<(), D::Error>
    where
        D: de::Deserializer<'de>,
    {
        deserializer.deserialize_any(self)
    }
}

impl<'de, 'w, 't> Visitor<'de> for MatchSeed<'w, 't> {
    type Value = ();

    fn expecting(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.write_str("a value at a registered path")
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<(), A::Error> {
        let path = path_display(&self.path);
        let reg = self.scanner.regs.get_mut(&self.path).expect("path checked");
        if reg.slots.iter().any(|slot| !slot.is_seq()) {
            return Err(self.scanner.abort(JsonScanError::TypeMismatch {
                path,
                reason: "array value for a non-sequence slot".to_string(),
            }));
        }

        while let Some(element) = seq.next_element::<Value>()? {
            let mut fail = None;
            {
                let reg = self.scanner.regs.get_mut(&self.path).expect("path checked");
                for slot in &mut reg.slots {
                    if let Err(reason) = slot.push(element.clone()) {
                        fail = Some(reason);
                        break;
                    }
                }
            }
            if let Some(reason) = fail {
                let path = path_display(&self.path);
                return Err(self
                    .scanner
                    .abort(JsonScanError::TypeMismatch { path, reason }));
            }
        }

        self.scanner.regs.get_mut(&self.path).expect("path checked").found = true;
        Ok(())
    }

    fn visit_map<A: MapAccess<'de>>(self, map: A) -> Result<(), A::Error> {
        let value = Value::deserialize(MapAccessDeserializer::new(map))?;
        self.deliver(value)
    }

    fn visit_bool<E: de::Error>(self, v: bool) -> Result<(), E> {
        self.deliver(Value::Bool(v))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<(), E> {
        self.deliver(Value::from(v))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<(), E> {
        self.deliver(Value::from(v))
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<(), E> {
        self.deliver(Value::from(v))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<(), E> {
        self.deliver(Value::String(v.to_string()))
    }

    fn visit_unit<E: de::Error>(self) -> Result<(), E> {
        self.deliver(Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CITY: &str = r#"
    {
        "name": "Venice",
        "location": {
            "lat": 45.4333,
            "long": 12.3167
        }
    }"#;

    #[test]
    fn scalar_at_nested_path() {
        let mut latitude = 0f64;
        let mut scanner = Scanner::new();
        scanner.search_for(&mut latitude, &["location", "lat"]).unwrap();
        scanner.scan(CITY.as_bytes()).unwrap();
        drop(scanner);
        assert!((latitude - 45.4333).abs() < 1e-9);
    }

    #[test]
    fn several_paths_in_one_scan() {
        let mut name = String::new();
        let mut long = 0f64;
        let mut scanner = Scanner::new();
        scanner.search_for(&mut name, &["name"]).unwrap();
        scanner.search_for(&mut long, &["location", "long"]).unwrap();
        scanner.scan(CITY.as_bytes()).unwrap();
        drop(scanner);
        assert_eq!(name, "Venice");
        assert!((long - 12.3167).abs() < 1e-9);
    }

    #[test]
    fn key_order_is_irrelevant() {
        let doc = r#"{"b": {"inner": 2}, "a": 1}"#;
        let reordered = r#"{"a": 1, "b": {"inner": 2}}"#;
        for doc in [doc, reordered] {
            let mut a = 0i64;
            let mut inner = 0i64;
            let mut scanner = Scanner::new();
            scanner.search_for(&mut a, &["a"]).unwrap();
            scanner.search_for(&mut inner, &["b", "inner"]).unwrap();
            scanner.scan(doc.as_bytes()).unwrap();
            drop(scanner);
            assert_eq!((a, inner), (1, 2));
        }
    }

    #[test]
    fn whole_document_with_empty_path() {
        #[derive(Deserialize, Default)]
        struct City {
            name: String,
        }

        let mut city = City::default();
        let mut scanner = Scanner::new();
        scanner.search_for(&mut city, &[]).unwrap();
        scanner.scan(CITY.as_bytes()).unwrap();
        drop(scanner);
        assert_eq!(city.name, "Venice");
    }

    #[test]
    fn first_occurrence_wins() {
        let doc = r#"{"x": {"v": 1}, "y": {"v": 2}}"#;
        let mut v = 0i64;
        let mut scanner = Scanner::new();
        scanner.search_for(&mut v, &["x", "v"]).unwrap();
        scanner.scan(doc.as_bytes()).unwrap();
        drop(scanner);
        assert_eq!(v, 1);

        // The same key name at top level must not shadow the nested path.
        let doc = r#"{"v": 9, "x": {"v": 1}}"#;
        let mut v = 0i64;
        let mut scanner = Scanner::new();
        scanner.search_for(&mut v, &["x", "v"]).unwrap();
        scanner.scan(doc.as_bytes()).unwrap();
        drop(scanner);
        assert_eq!(v, 1);
    }

    #[test]
    fn arrays_are_transparent_to_paths() {
        let doc = r#"{"a": [{"b": 7}, {"b": 8}]}"#;
        let mut b = 0i64;
        let mut scanner = Scanner::new();
        scanner.search_for(&mut b, &["a", "b"]).unwrap();
        scanner.scan(doc.as_bytes()).unwrap();
        drop(scanner);
        assert_eq!(b, 7);
    }

    #[test]
    fn sequence_path_collects_elements() {
        let doc = r#"{"items": [1, 2, 3], "tail": true}"#;
        let mut items: Vec<i64> = Vec::new();
        let mut scanner = Scanner::new();
        scanner.search_seq(&mut items, &["items"]).unwrap();
        scanner.scan(doc.as_bytes()).unwrap();
        drop(scanner);
        assert_eq!(items, vec![1, 2, 3]);
    }

    #[derive(Debug, Deserialize, PartialEq, Clone)]
    struct AltTitle {
        iso_3166_1: String,
        title: String,
    }

    #[test]
    fn filtered_sequence_keeps_source_order() {
        let doc = r#"
        {
            "alternative_titles": {
                "titles": [
                    {"iso_3166_1": "US", "title": "one"},
                    {"iso_3166_1": "FR", "title": "two"},
                    {"iso_3166_1": "RU", "title": "three"},
                    {"iso_3166_1": "JP", "title": "four"},
                    {"iso_3166_1": "DE", "title": "five"}
                ]
            }
        }"#;

        let mut titles: Vec<AltTitle> = Vec::new();
        let mut scanner = Scanner::new();
        scanner
            .search_seq(&mut titles, &["alternative_titles", "titles"])
            .unwrap();
        scanner
            .set_filter::<AltTitle, _>(&["alternative_titles", "titles"], |t| {
                t.iso_3166_1 == "US" || t.iso_3166_1 == "RU"
            })
            .unwrap();
        scanner.scan(doc.as_bytes()).unwrap();
        drop(scanner);

        let countries: Vec<&str> = titles.iter().map(|t| t.iso_3166_1.as_str()).collect();
        assert_eq!(countries, vec!["US", "RU"]);
        assert_eq!(titles[0].title, "one");
        assert_eq!(titles[1].title, "three");
    }

    #[test]
    fn filter_on_scalar_slot_is_a_type_mismatch() {
        let mut v = 0i64;
        let mut scanner = Scanner::new();
        scanner.search_for(&mut v, &["a"]).unwrap();
        let err = scanner.set_filter::<i64, _>(&["a"], |_| true).unwrap_err();
        assert!(matches!(err, JsonScanError::TypeMismatch { .. }));
    }

    #[test]
    fn filter_on_unknown_path_is_rejected() {
        let mut scanner = Scanner::new();
        let err = scanner.set_filter::<i64, _>(&["a"], |_| true).unwrap_err();
        assert!(matches!(err, JsonScanError::UnknownPath(_)));
    }

    #[test]
    fn array_into_scalar_slot_is_a_type_mismatch() {
        let doc = r#"{"a": [1, 2]}"#;
        let mut a = 0i64;
        let mut scanner = Scanner::new();
        scanner.search_for(&mut a, &["a"]).unwrap();
        let err = scanner.scan(doc.as_bytes()).unwrap_err();
        assert!(matches!(err, JsonScanError::TypeMismatch { .. }));
    }

    #[test]
    fn missing_path_reports_incomplete() {
        let mut v = 0i64;
        let mut scanner = Scanner::new();
        scanner.search_for(&mut v, &["nope"]).unwrap();
        let err = scanner.scan(CITY.as_bytes()).unwrap_err();
        assert!(matches!(err, JsonScanError::PathsIncomplete));
    }

    #[test]
    fn malformed_stream_reports_parse_error() {
        let mut v = 0i64;
        let mut scanner = Scanner::new();
        scanner.search_for(&mut v, &["a"]).unwrap();
        let err = scanner.scan(&br#"{"a": 1,"#[..]).unwrap_err();
        assert!(matches!(err, JsonScanError::Parse(_)));
    }

    #[test]
    fn continuation_path_is_rejected() {
        let mut outer = Value::Null;
        let mut inner = 0i64;
        let mut scanner = Scanner::new();
        scanner.search_for(&mut outer, &["a"]).unwrap();
        let err = scanner.search_for(&mut inner, &["a", "b"]).unwrap_err();
        assert!(matches!(err, JsonScanError::PathContinuation { .. }));
    }

    #[test]
    fn ancestor_registration_replaces_descendants() {
        let doc = r#"{"a": {"b": 3}}"#;
        let mut inner = 0i64;
        let mut outer = Value::Null;
        let mut scanner = Scanner::new();
        scanner.search_for(&mut inner, &["a", "b"]).unwrap();
        scanner.search_for(&mut outer, &["a"]).unwrap();
        // The descendant registration is gone, so the scan must not touch
        // `inner` and must still complete with every remaining path found.
        scanner.scan(doc.as_bytes()).unwrap();
        drop(scanner);
        assert_eq!(inner, 0);
        assert_eq!(outer, serde_json::json!({"b": 3}));
    }

    #[test]
    fn duplicate_paths_all_receive_the_value() {
        let doc = r#"{"n": 5}"#;
        let mut first = 0i64;
        let mut second = 0i64;
        let mut scanner = Scanner::new();
        scanner.search_for(&mut first, &["n"]).unwrap();
        scanner.search_for(&mut second, &["n"]).unwrap();
        scanner.scan(doc.as_bytes()).unwrap();
        drop(scanner);
        assert_eq!((first, second), (5, 5));
    }

    #[test]
    fn empty_key_is_rejected() {
        let mut v = 0i64;
        let mut scanner = Scanner::new();
        let err = scanner.search_for(&mut v, &["a", ""]).unwrap_err();
        assert!(matches!(err, JsonScanError::EmptyKey));
    }

    #[test]
    fn reset_clears_registrations() {
        let mut v = 0i64;
        let mut scanner = Scanner::new();
        scanner.search_for(&mut v, &["gone"]).unwrap();
        scanner.reset();
        // No registrations left: any document scans clean.
        scanner.scan(CITY.as_bytes()).unwrap();
    }

    #[test]
    fn rescan_works_after_reset_with_fresh_registrations() {
        let mut name = String::new();
        let mut scanner = Scanner::new();
        scanner.search_for(&mut name, &["name"]).unwrap();
        scanner.scan(CITY.as_bytes()).unwrap();
        scanner.reset();

        let mut lat = 0f64;
        scanner.search_for(&mut lat, &["location", "lat"]).unwrap();
        scanner.scan(CITY.as_bytes()).unwrap();
        drop(scanner);
        assert!((lat - 45.4333).abs() < 1e-9);
    }

    #[derive(Debug, Clone, Deserialize, Default, PartialEq)]
    struct Nested {
        title: Option<String>,
    }

    #[test]
    fn mixed_scalar_object_and_filtered_sequence_in_one_pass() {
        // The shape a movie response has: scalars, a nullable object and a
        // nested filtered array, all pulled in a single scan.
        let doc = r#"
        {
            "id": 550,
            "belongs_to": null,
            "wrap": {
                "entries": [
                    {"tag": "keep", "data": {"title": "one"}},
                    {"tag": "drop", "data": {"title": "two"}},
                    {"tag": "keep", "data": {"title": null}}
                ]
            },
            "trailing": "ignored"
        }"#;

        #[derive(Debug, Clone, Deserialize)]
        struct Entry {
            tag: String,
            data: Nested,
        }

        let mut id = 0i64;
        let mut belongs_to: Option<Nested> = Some(Nested::default());
        let mut entries: Vec<Entry> = Vec::new();

        let mut scanner = Scanner::new();
        scanner.search_for(&mut id, &["id"]).unwrap();
        scanner.search_for(&mut belongs_to, &["belongs_to"]).unwrap();
        scanner.search_seq(&mut entries, &["wrap", "entries"]).unwrap();
        scanner
            .set_filter::<Entry, _>(&["wrap", "entries"], |entry| entry.tag == "keep")
            .unwrap();
        scanner.scan(doc.as_bytes()).unwrap();
        drop(scanner);

        assert_eq!(id, 550);
        assert_eq!(belongs_to, None);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].data.title.as_deref(), Some("one"));
        assert_eq!(entries[1].data.title, None);
    }

    #[test]
    fn matches_full_parse_for_compatible_paths() {
        let doc = r#"
        {
            "id": 601,
            "meta": {"adult": false, "rating": 7.9},
            "tags": ["a", "b"],
            "skip": {"huge": [1, 2, 3, 4]}
        }"#;

        let mut id = 0i64;
        let mut adult = true;
        let mut rating = 0f64;
        let mut tags: Vec<String> = Vec::new();
        let mut scanner = Scanner::new();
        scanner.search_for(&mut id, &["id"]).unwrap();
        scanner.search_for(&mut adult, &["meta", "adult"]).unwrap();
        scanner.search_for(&mut rating, &["meta", "rating"]).unwrap();
        scanner.search_seq(&mut tags, &["tags"]).unwrap();
        scanner.scan(doc.as_bytes()).unwrap();
        drop(scanner);

        let full: Value = serde_json::from_str(doc).unwrap();
        assert_eq!(Value::from(id), full["id"]);
        assert_eq!(Value::from(adult), full["meta"]["adult"]);
        assert_eq!(Value::from(rating), full["meta"]["rating"]);
        assert_eq!(serde_json::json!(tags), full["tags"]);
    }
}

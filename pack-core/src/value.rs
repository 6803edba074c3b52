//! The dynamic value model (spec §3.1, §4.2) and the Go-style `Array`/`Map`/
//! `Params` accessor views ported from `original_source/array.go`,
//! `map.go`, and `params.go`.

use std::borrow::Cow;

/// A pack-format value (spec §3.1). This is the closed set; every variant
/// has a legal wire form (spec §3.1 invariant).
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Nil,
    Bool(bool),
    /// Unsigned integer; the encoder picks the narrowest wire width that fits.
    UInt(u64),
    /// Signed integer; the encoder picks the narrowest wire width that fits.
    Int(i64),
    Float32(f32),
    Float64(f64),
    /// Opaque bytes. Also the text carrier: callers coerce to text with
    /// [`Value::as_text`] (spec §9: "raw-vs-text conflation").
    Raw(Vec<u8>),
    Array(Vec<Value>),
    /// Unordered key/value pairs, stored in insertion order. Duplicate keys
    /// (by `==`) are not expected from trusted producers; the decoder
    /// applies last-write-wins (spec §3.1, §4.4).
    Map(Vec<(Value, Value)>),
}

impl Value {
    pub fn is_nil(&self) -> bool {
        matches!(self, Value::Nil)
    }

    /// Coerce to a signed integer (spec §4.2 table, "signed int" row).
    /// Floats and containers fall back to `0`, matching the original's
    /// `IntItem`/`IntIndex`, which only special-case int and uint sources.
    pub fn as_i64(&self) -> i64 {
        match self {
            Value::Int(i) => *i,
            Value::UInt(u) => *u as i64,
            _ => 0,
        }
    }

    /// Coerce to an unsigned integer (spec §4.2 table, "unsigned int" row).
    pub fn as_u64(&self) -> u64 {
        match self {
            Value::UInt(u) => *u,
            Value::Int(i) => *i as u64,
            _ => 0,
        }
    }

    /// Coerce to `f64` (spec §4.2 table, "float64" row): widens from any
    /// numeric variant, defaults to `0.0` otherwise.
    pub fn as_f64(&self) -> f64 {
        match self {
            Value::Float64(f) => *f,
            Value::Float32(f) => *f as f64,
            Value::Int(i) => *i as f64,
            Value::UInt(u) => *u as f64,
            _ => 0.0,
        }
    }

    /// Reinterpret `Raw` bytes as text (spec §4.2 table, "text" row: "bytes-as-text").
    ///
    /// Unlike the original Go implementation's direct `string([]byte)` cast,
    /// this goes through `String::from_utf8_lossy` rather than an unchecked
    /// reinterpretation, so invalid UTF-8 is lossily repaired instead of
    /// producing a `&str` that violates Rust's UTF-8 invariant. Round-trips
    /// of valid UTF-8 (the common case, including every scenario in spec
    /// §8) are unaffected.
    pub fn as_text(&self) -> Option<Cow<'_, str>> {
        match self {
            Value::Raw(bytes) => Some(String::from_utf8_lossy(bytes)),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&[(Value, Value)]> {
        match self {
            Value::Map(entries) => Some(entries),
            _ => None,
        }
    }

    /// Borrowing view with the Go `array.go`-style typed item accessors.
    pub fn as_array_view(&self) -> Option<ArrayView<'_>> {
        self.as_array().map(ArrayView)
    }

    /// Borrowing view with the Go `map.go`-style typed keyed accessors.
    pub fn as_map_view(&self) -> Option<MapView<'_>> {
        self.as_map().map(MapView)
    }

    /// Insert into a decoded map's entry list, applying last-write-wins on
    /// an equal key (spec §3.1, §4.4). Used by the decoder; exposed so
    /// hand-built `Value::Map`s can share the same dedup behavior.
    pub fn map_insert(entries: &mut Vec<(Value, Value)>, key: Value, value: Value) {
        if let Some(slot) = entries.iter_mut().find(|(k, _)| *k == key) {
            slot.1 = value;
        } else {
            entries.push((key, value));
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

macro_rules! impl_from_uint {
    ($($t:ty),*) => {
        $(impl From<$t> for Value {
            fn from(v: $t) -> Self { Value::UInt(v as u64) }
        })*
    };
}
impl_from_uint!(u8, u16, u32, u64);

macro_rules! impl_from_int {
    ($($t:ty),*) => {
        $(impl From<$t> for Value {
            fn from(v: $t) -> Self { Value::Int(v as i64) }
        })*
    };
}
impl_from_int!(i8, i16, i32, i64);

impl From<f32> for Value {
    fn from(f: f32) -> Self {
        Value::Float32(f)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float64(f)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Raw(s.as_bytes().to_vec())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Raw(s.into_bytes())
    }
}

impl From<Vec<u8>> for Value {
    fn from(bytes: Vec<u8>) -> Self {
        Value::Raw(bytes)
    }
}

impl From<&[u8]> for Value {
    fn from(bytes: &[u8]) -> Self {
        Value::Raw(bytes.to_vec())
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::Array(items)
    }
}

/// Borrowing typed-item view over a decoded array, mirroring
/// `original_source/array.go`'s `Array` wrapper.
#[derive(Debug, Clone, Copy)]
pub struct ArrayView<'a>(&'a [Value]);

impl<'a> ArrayView<'a> {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn raw(&self) -> &'a [Value] {
        self.0
    }

    /// Indexes directly into the backing slice, panicking out of bounds —
    /// matching the Go `Item` accessor's direct slice index.
    pub fn item(&self, index: usize) -> &'a Value {
        &self.0[index]
    }

    pub fn int_item(&self, index: usize) -> i64 {
        self.item(index).as_i64()
    }

    pub fn uint_item(&self, index: usize) -> u64 {
        self.item(index).as_u64()
    }

    pub fn float_item(&self, index: usize) -> f64 {
        self.item(index).as_f64()
    }

    pub fn string_item(&self, index: usize) -> String {
        self.item(index)
            .as_text()
            .map(|s| s.into_owned())
            .unwrap_or_default()
    }

    pub fn array_item(&self, index: usize) -> Option<ArrayView<'a>> {
        self.item(index).as_array_view()
    }

    pub fn map_item(&self, index: usize) -> Option<MapView<'a>> {
        self.item(index).as_map_view()
    }
}

/// Borrowing typed-key view over a decoded map, mirroring
/// `original_source/map.go`'s `Map` wrapper. Every accessor returns a
/// `(value, present)` pair (spec §4.2): `present` is `true` only when the
/// key exists *and* its value coerces to the requested type.
#[derive(Debug, Clone, Copy)]
pub struct MapView<'a>(&'a [(Value, Value)]);

impl<'a> MapView<'a> {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    fn get(&self, key: &Value) -> Option<&'a Value> {
        self.0.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    fn get_text(&self, key: &str) -> Option<&'a Value> {
        self.0
            .iter()
            .find(|(k, _)| k.as_text().as_deref() == Some(key))
            .map(|(_, v)| v)
    }

    pub fn int_index(&self, key: &Value) -> (i64, bool) {
        match self.get(key) {
            Some(Value::Int(i)) => (*i, true),
            Some(Value::UInt(u)) => (*u as i64, true),
            _ => (0, false),
        }
    }

    pub fn uint_index(&self, key: &Value) -> (u64, bool) {
        match self.get(key) {
            Some(Value::UInt(u)) => (*u, true),
            Some(Value::Int(i)) => (*i as u64, true),
            _ => (0, false),
        }
    }

    pub fn float_index(&self, key: &Value) -> (f64, bool) {
        match self.get(key) {
            Some(Value::Float64(f)) => (*f, true),
            Some(Value::Float32(f)) => (*f as f64, true),
            Some(Value::Int(i)) => (*i as f64, true),
            Some(Value::UInt(u)) => (*u as f64, true),
            _ => (0.0, false),
        }
    }

    pub fn string_index(&self, key: &Value) -> (String, bool) {
        match self.get(key) {
            Some(Value::Raw(bytes)) => (String::from_utf8_lossy(bytes).into_owned(), true),
            Some(Value::Nil) => (String::new(), true),
            _ => (String::new(), false),
        }
    }

    pub fn array_index(&self, key: &Value) -> (Option<ArrayView<'a>>, bool) {
        match self.get(key) {
            Some(Value::Array(items)) => (Some(ArrayView(items)), true),
            Some(Value::Nil) => (None, true),
            _ => (None, false),
        }
    }

    pub fn map_index(&self, key: &Value) -> (Option<MapView<'a>>, bool) {
        match self.get(key) {
            Some(Value::Map(entries)) => (Some(MapView(entries)), true),
            Some(Value::Nil) => (None, true),
            _ => (None, false),
        }
    }

    /// Lookup by a plain text key, the common case for RPC params maps.
    pub fn string_key_index(&self, key: &str) -> (i64, bool) {
        match self.get_text(key) {
            Some(Value::Int(i)) => (*i, true),
            Some(Value::UInt(u)) => (*u as i64, true),
            _ => (0, false),
        }
    }
}

/// Unwraps RPC call params of the shape `[{key: value, ...}]` into a keyed
/// view, mirroring `original_source/params.go`. This is a convenience for
/// handlers that follow the single-map-argument convention; the RPC framing
/// itself (spec §3.3) does not require it.
pub struct Params<'a> {
    raw: MapView<'a>,
}

impl<'a> Params<'a> {
    pub fn new(call_params: &'a Value) -> Option<Self> {
        let args = call_params.as_array_view()?;
        if args.is_empty() {
            return None;
        }
        let map = args.item(0).as_map_view()?;
        Some(Params { raw: map })
    }

    pub fn version(&self) -> u64 {
        self.raw.string_key_index("version").0 as u64
    }

    pub fn int_index(&self, key: &Value) -> (i64, bool) {
        self.raw.int_index(key)
    }

    pub fn uint_index(&self, key: &Value) -> (u64, bool) {
        self.raw.uint_index(key)
    }

    pub fn float_index(&self, key: &Value) -> (f64, bool) {
        self.raw.float_index(key)
    }

    pub fn string_index(&self, key: &Value) -> (String, bool) {
        self.raw.string_index(key)
    }

    pub fn array_index(&self, key: &Value) -> (Option<ArrayView<'a>>, bool) {
        self.raw.array_index(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn int_uint_cast_between_each_other() {
        assert_eq!(Value::UInt(300).as_i64(), 300);
        assert_eq!(Value::Int(-1).as_u64(), u64::MAX);
    }

    #[test]
    fn float_source_does_not_coerce_to_int() {
        assert_eq!(Value::Float64(3.5).as_i64(), 0);
        assert_eq!(Value::Float64(3.5).as_u64(), 0);
    }

    #[test]
    fn float64_widens_from_any_numeric() {
        assert_eq!(Value::Int(-4).as_f64(), -4.0);
        assert_eq!(Value::UInt(4).as_f64(), 4.0);
        assert_eq!(Value::Float32(1.5).as_f64(), 1.5);
    }

    #[test]
    fn text_only_comes_from_raw() {
        assert_eq!(Value::from("hi").as_text().as_deref(), Some("hi"));
        assert_eq!(Value::Nil.as_text(), None);
        assert_eq!(Value::Bool(true).as_text(), None);
    }

    #[test]
    fn array_and_map_views_reject_scalars() {
        assert!(Value::Int(1).as_array_view().is_none());
        assert!(Value::Int(1).as_map_view().is_none());
        assert!(Value::Array(vec![]).as_array_view().is_some());
        assert!(Value::Map(vec![]).as_map_view().is_some());
    }

    #[test]
    fn map_insert_applies_last_write_wins() {
        let mut entries = Vec::new();
        Value::map_insert(&mut entries, Value::from("k"), Value::UInt(1));
        Value::map_insert(&mut entries, Value::from("k"), Value::UInt(2));
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].1, Value::UInt(2));
    }

    #[test]
    fn map_view_missing_key_is_absent() {
        let v = Value::Map(vec![(Value::from("a"), Value::UInt(1))]);
        let view = v.as_map_view().unwrap();
        assert_eq!(view.int_index(&Value::from("missing")), (0, false));
    }

    #[test]
    fn map_view_present_but_wrong_type_is_absent() {
        let v = Value::Map(vec![(Value::from("a"), Value::Raw(b"text".to_vec()))]);
        let view = v.as_map_view().unwrap();
        assert_eq!(view.int_index(&Value::from("a")), (0, false));
    }

    #[test]
    fn array_view_coerces_items() {
        let v = Value::Array(vec![Value::UInt(7), Value::from("hi")]);
        let view = v.as_array_view().unwrap();
        assert_eq!(view.uint_item(0), 7);
        assert_eq!(view.string_item(1), "hi");
    }

    #[test]
    fn params_unwraps_first_array_element_as_map() {
        let params = Value::Array(vec![Value::Map(vec![
            (Value::from("version"), Value::UInt(3)),
            (Value::from("x"), Value::Int(-5)),
        ])]);
        let p = Params::new(&params).unwrap();
        assert_eq!(p.version(), 3);
        assert_eq!(p.int_index(&Value::from("x")), (-5, true));
    }

    #[test]
    fn params_rejects_non_array_params() {
        assert!(Params::new(&Value::Nil).is_none());
        assert!(Params::new(&Value::Array(vec![])).is_none());
    }
}

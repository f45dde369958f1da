//! The dynamically-typed value graph the codec reads and writes.
//!
//! Scalars are held inline. Lists and maps are shared handles
//! ([`ListRef`], [`MapRef`]): cloning one clones the handle, not the
//! contents, and two handles to the same composite are the same node of the
//! graph. The encoder keys its reference table on that identity, which is
//! what makes shared and cyclic structure representable.

use std::cell::{Ref, RefCell};
use std::fmt;
use std::rc::Rc;

/// A decodable / encodable datum.
#[derive(Clone)]
pub enum Value {
    Null,
    Bool(bool),
    Int32(i32),
    Int64(i64),
    Double(f64),
    Str(String),
    Bytes(Vec<u8>),
    List(ListRef),
    Map(MapRef),
}

impl Value {
    /// Builds a fresh list from `items`.
    pub fn list(items: impl IntoIterator<Item = Value>) -> Self {
        Value::List(ListRef::from_vec(items.into_iter().collect()))
    }

    /// Builds a fresh map from `entries`, kept in the given order.
    pub fn map(entries: impl IntoIterator<Item = (Value, Value)>) -> Self {
        Value::Map(MapRef::from_vec(entries.into_iter().collect()))
    }

    /// Short name of the variant, used in error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int32(_) => "int32",
            Value::Int64(_) => "int64",
            Value::Double(_) => "double",
            Value::Str(_) => "string",
            Value::Bytes(_) => "bytes",
            Value::List(_) => "list",
            Value::Map(_) => "map",
        }
    }

    pub fn is_composite(&self) -> bool {
        matches!(self, Value::List(_) | Value::Map(_))
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int32(i) => Some(*i as i64),
            Value::Int64(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&ListRef> {
        match self {
            Value::List(list) => Some(list),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&MapRef> {
        match self {
            Value::Map(map) => Some(map),
            _ => None,
        }
    }
}

/// Structural equality.
///
/// Doubles compare by bit pattern, so `NaN == NaN` and `0.0 != -0.0`: two
/// values are equal exactly when they encode the same. Composites compare
/// by content (identical handles short-circuit) using a work list, so deep
/// nesting does not grow the call stack. Comparing graphs that contain
/// cycles does not terminate.
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        let mut pending = Vec::new();
        if !shallow_eq(self, other, &mut pending) {
            return false;
        }
        while let Some((a, b)) = pending.pop() {
            if !shallow_eq(&a, &b, &mut pending) {
                return false;
            }
        }
        true
    }
}

/// Compares `a` and `b` one level deep. Scalars are compared in place;
/// pairs of child composites are queued on `pending`.
fn shallow_eq(a: &Value, b: &Value, pending: &mut Vec<(Value, Value)>) -> bool {
    let mut queue = |x: &Value, y: &Value| match (x, y) {
        (Value::List(_), Value::List(_)) | (Value::Map(_), Value::Map(_)) => {
            pending.push((x.clone(), y.clone()));
            true
        }
        _ => scalar_eq(x, y),
    };
    match (a, b) {
        (Value::List(a), Value::List(b)) => {
            if a.ptr_eq(b) {
                return true;
            }
            let (a, b) = (a.0.borrow(), b.0.borrow());
            a.len() == b.len() && a.iter().zip(b.iter()).all(|(x, y)| queue(x, y))
        }
        (Value::Map(a), Value::Map(b)) => {
            if a.ptr_eq(b) {
                return true;
            }
            let (a, b) = (a.0.borrow(), b.0.borrow());
            a.len() == b.len()
                && a
                    .iter()
                    .zip(b.iter())
                    .all(|((ka, va), (kb, vb))| queue(ka, kb) && queue(va, vb))
        }
        _ => scalar_eq(a, b),
    }
}

fn scalar_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Null, Value::Null) => true,
        (Value::Bool(a), Value::Bool(b)) => a == b,
        (Value::Int32(a), Value::Int32(b)) => a == b,
        (Value::Int64(a), Value::Int64(b)) => a == b,
        (Value::Double(a), Value::Double(b)) => a.to_bits() == b.to_bits(),
        (Value::Str(a), Value::Str(b)) => a == b,
        (Value::Bytes(a), Value::Bytes(b)) => a == b,
        _ => false,
    }
}

/// Debug output nests once per level, so printing a value nested thousands
/// deep can exhaust the stack. Like equality, it does not terminate on
/// cycles.
impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("Null"),
            Value::Bool(b) => write!(f, "Bool({b})"),
            Value::Int32(i) => write!(f, "Int32({i})"),
            Value::Int64(i) => write!(f, "Int64({i})"),
            Value::Double(d) => write!(f, "Double({d:?})"),
            Value::Str(s) => write!(f, "Str({s:?})"),
            Value::Bytes(b) => write!(f, "Bytes({} bytes)", b.len()),
            Value::List(list) => fmt::Debug::fmt(list, f),
            Value::Map(map) => fmt::Debug::fmt(map, f),
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int32(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int64(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Double(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Str(v.to_owned())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Str(v)
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Bytes(v)
    }
}

impl From<ListRef> for Value {
    fn from(v: ListRef) -> Self {
        Value::List(v)
    }
}

impl From<MapRef> for Value {
    fn from(v: MapRef) -> Self {
        Value::Map(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}

// ── Composite handles ─────────────────────────────────────────────────────

/// Shared handle to an ordered list of values.
#[derive(Clone, Default)]
pub struct ListRef(Rc<RefCell<Vec<Value>>>);

impl ListRef {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self::from_vec(Vec::with_capacity(capacity))
    }

    pub fn from_vec(items: Vec<Value>) -> Self {
        Self(Rc::new(RefCell::new(items)))
    }

    /// Appends `value` at the end.
    pub fn push(&self, value: impl Into<Value>) {
        self.0.borrow_mut().push(value.into());
    }

    pub fn len(&self) -> usize {
        self.0.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.borrow().is_empty()
    }

    /// Returns a clone of the element at `index` (composites are shared).
    pub fn get(&self, index: usize) -> Option<Value> {
        self.0.borrow().get(index).cloned()
    }

    /// Borrows the elements.
    ///
    /// # Panics
    ///
    /// Panics if the list is being mutated through another handle.
    pub fn items(&self) -> Ref<'_, Vec<Value>> {
        self.0.borrow()
    }

    /// Removes every element. Used to break cycles before dropping.
    pub fn clear(&self) {
        let items = std::mem::take(&mut *self.0.borrow_mut());
        dismantle(items);
    }

    /// `true` when both handles point at the same list.
    pub fn ptr_eq(&self, other: &ListRef) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    /// Address of the shared allocation; stable for the handle's lifetime.
    pub(crate) fn addr(&self) -> usize {
        Rc::as_ptr(&self.0) as *const () as usize
    }

    #[cfg(test)]
    pub(crate) fn handle_count(&self) -> usize {
        Rc::strong_count(&self.0)
    }

    #[cfg(test)]
    pub(crate) fn capacity(&self) -> usize {
        self.0.borrow().capacity()
    }
}

impl PartialEq for ListRef {
    fn eq(&self, other: &Self) -> bool {
        Value::List(self.clone()) == Value::List(other.clone())
    }
}

impl fmt::Debug for ListRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.0.borrow().iter()).finish()
    }
}

impl Drop for ListRef {
    fn drop(&mut self) {
        if Rc::strong_count(&self.0) != 1 {
            return;
        }
        let items = match self.0.try_borrow_mut() {
            Ok(mut items) => std::mem::take(&mut *items),
            Err(_) => return,
        };
        dismantle(items);
    }
}

/// Shared handle to an ordered sequence of key/value pairs.
#[derive(Clone, Default)]
pub struct MapRef(Rc<RefCell<Vec<(Value, Value)>>>);

impl MapRef {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self::from_vec(Vec::with_capacity(capacity))
    }

    pub fn from_vec(entries: Vec<(Value, Value)>) -> Self {
        Self(Rc::new(RefCell::new(entries)))
    }

    /// Inserts `key` → `value`.
    ///
    /// An existing equal key keeps its position and gets the new value;
    /// otherwise the pair is appended. Returns the replaced value.
    pub fn insert(&self, key: impl Into<Value>, value: impl Into<Value>) -> Option<Value> {
        let key = key.into();
        let value = value.into();
        let mut entries = self.0.borrow_mut();
        match entries.iter_mut().find(|(k, _)| *k == key) {
            Some((_, slot)) => Some(std::mem::replace(slot, value)),
            None => {
                entries.push((key, value));
                None
            }
        }
    }

    /// Appends a pair without looking for an existing key.
    pub fn push(&self, key: impl Into<Value>, value: impl Into<Value>) {
        self.0.borrow_mut().push((key.into(), value.into()));
    }

    /// Looks up the value stored under a string key.
    pub fn get(&self, key: &str) -> Option<Value> {
        self.0
            .borrow()
            .iter()
            .find(|(k, _)| k.as_str() == Some(key))
            .map(|(_, v)| v.clone())
    }

    pub fn len(&self) -> usize {
        self.0.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.borrow().is_empty()
    }

    /// Borrows the entries in insertion order.
    ///
    /// # Panics
    ///
    /// Panics if the map is being mutated through another handle.
    pub fn entries(&self) -> Ref<'_, Vec<(Value, Value)>> {
        self.0.borrow()
    }

    /// Removes every entry. Used to break cycles before dropping.
    pub fn clear(&self) {
        let entries = std::mem::take(&mut *self.0.borrow_mut());
        dismantle(entries.into_iter().flat_map(|(k, v)| [k, v]).collect());
    }

    /// `true` when both handles point at the same map.
    pub fn ptr_eq(&self, other: &MapRef) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    pub(crate) fn addr(&self) -> usize {
        Rc::as_ptr(&self.0) as *const () as usize
    }

    #[cfg(test)]
    pub(crate) fn handle_count(&self) -> usize {
        Rc::strong_count(&self.0)
    }
}

impl PartialEq for MapRef {
    fn eq(&self, other: &Self) -> bool {
        Value::Map(self.clone()) == Value::Map(other.clone())
    }
}

impl fmt::Debug for MapRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(self.0.borrow().iter().map(|(k, v)| (k, v)))
            .finish()
    }
}

impl Drop for MapRef {
    fn drop(&mut self) {
        if Rc::strong_count(&self.0) != 1 {
            return;
        }
        let entries = match self.0.try_borrow_mut() {
            Ok(mut entries) => std::mem::take(&mut *entries),
            Err(_) => return,
        };
        dismantle(entries.into_iter().flat_map(|(k, v)| [k, v]).collect());
    }
}

/// Drops a batch of values without recursing once per nesting level.
///
/// Uniquely owned composites are emptied into the work list before their
/// handle goes away, so their own `Drop` finds nothing left to do.
fn dismantle(mut pending: Vec<Value>) {
    while let Some(value) = pending.pop() {
        match value {
            Value::List(list) if Rc::strong_count(&list.0) == 1 => {
                if let Ok(mut items) = list.0.try_borrow_mut() {
                    pending.append(&mut items);
                }
            }
            Value::Map(map) if Rc::strong_count(&map.0) == 1 => {
                if let Ok(mut entries) = map.0.try_borrow_mut() {
                    pending.extend(entries.drain(..).flat_map(|(k, v)| [k, v]));
                }
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clone_shares_composites() {
        let list = ListRef::new();
        let value = Value::List(list.clone());
        list.push(1);
        assert_eq!(value.as_list().map(ListRef::len), Some(1));
        assert!(value.as_list().unwrap().ptr_eq(&list));
    }

    #[test]
    fn double_equality_is_bitwise() {
        assert_eq!(Value::Double(f64::NAN), Value::Double(f64::NAN));
        assert_ne!(Value::Double(0.0), Value::Double(-0.0));
        assert_ne!(Value::Int32(1), Value::Int64(1));
    }

    #[test]
    fn map_insert_preserves_order_and_replaces() {
        let map = MapRef::new();
        assert_eq!(map.insert("b", 1), None);
        assert_eq!(map.insert("a", 2), None);
        assert_eq!(map.insert("b", 3), Some(Value::Int32(1)));
        let keys: Vec<_> = map
            .entries()
            .iter()
            .map(|(k, _)| k.as_str().unwrap().to_owned())
            .collect();
        assert_eq!(keys, ["b", "a"]);
        assert_eq!(map.get("b"), Some(Value::Int32(3)));
    }

    #[test]
    fn map_keys_need_not_be_strings() {
        let map = Value::map([
            (Value::Int32(1), Value::from("one")),
            (Value::list([Value::Null]), Value::Bool(true)),
        ]);
        assert_eq!(map.as_map().unwrap().len(), 2);
        assert_eq!(map.as_map().unwrap().get("one"), None);
    }

    #[test]
    fn deep_nesting_drops_without_overflow() {
        let mut value = Value::Null;
        for _ in 0..200_000 {
            value = Value::list([value]);
        }
        drop(value);
    }

    #[test]
    fn deep_equality_without_overflow() {
        let nest = |leaf: Value| {
            let mut value = leaf;
            for _ in 0..100_000 {
                value = Value::map([(Value::from("k"), Value::list([value]))]);
            }
            value
        };
        assert!(nest(Value::Int32(1)) == nest(Value::Int32(1)));
        assert!(nest(Value::Int32(1)) != nest(Value::Int64(1)));
    }

    #[test]
    fn equality_is_positional() {
        let a = Value::list([Value::list([]), Value::Int32(1)]);
        let b = Value::list([Value::Int32(1), Value::list([])]);
        assert_ne!(a, b);
        let shared = Value::list([Value::Null]);
        assert_eq!(
            Value::list([shared.clone(), shared.clone()]),
            Value::list([Value::list([Value::Null]), shared])
        );
    }

    #[test]
    fn clear_breaks_self_reference() {
        let list = ListRef::new();
        list.push(Value::List(list.clone()));
        assert!(list.get(0).unwrap().as_list().unwrap().ptr_eq(&list));
        list.clear();
        assert!(list.is_empty());
    }
}

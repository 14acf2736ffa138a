//! Assertions that report through a [`TestContext`] instead of panicking
//! directly, so context decorators apply to their messages.

use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::{BuildHasher, Hash};

use crate::context::TestContext;

/// Fatal unless `result == expected`.
pub fn equal<T>(cx: &dyn TestContext, result: T, expected: T)
where
    T: PartialEq + Debug,
{
    if result != expected {
        cx.fatal(&format!("{result:?} != {expected:?}"));
    }
}

/// Fatal unless `elem` is present in `items`.
pub fn contains<T>(cx: &dyn TestContext, items: &[T], elem: &T)
where
    T: PartialEq + Debug,
{
    if !items.contains(elem) {
        cx.fatal(&format!("{elem:?} not present in {items:?}"));
    }
}

/// Fatal unless `map` has an entry for `key`.
pub fn contains_key<K, V, S>(cx: &dyn TestContext, map: &HashMap<K, V, S>, key: &K)
where
    K: Eq + Hash + Debug,
    V: Debug,
    S: BuildHasher,
{
    if !map.contains_key(key) {
        cx.fatal(&format!("key {key:?} not present in {map:?}"));
    }
}

/// Fatal unless some entry of `map` has value `value`.
pub fn contains_value<K, V, S>(cx: &dyn TestContext, map: &HashMap<K, V, S>, value: &V)
where
    K: Debug,
    V: PartialEq + Debug,
    S: BuildHasher,
{
    if !map.values().any(|v| v == value) {
        cx.fatal(&format!("val {value:?} not present in {map:?}"));
    }
}

//! Null-safe access into nested resource properties.
use serde_json::Value;

/// A position inside a JSON value that may not exist.
///
/// Every step on a missing position stays missing, so extraction rules can
/// chain `get` calls and only check the end result.
#[derive(Debug, Clone, Copy)]
pub struct Lookup<'a>(Option<&'a Value>);

impl<'a> Lookup<'a> {
    #[must_use]
    pub fn new(value: &'a Value) -> Self {
        Self(Some(value))
    }

    #[must_use]
    pub fn missing() -> Self {
        Self(None)
    }

    /// Step into an object key. Arrays, scalars and null yield a missing position.
    #[must_use]
    pub fn get(self, key: &str) -> Self {
        Self(self.0.and_then(|v| v.as_object()).and_then(|m| m.get(key)))
    }

    /// Follow a sequence of object keys.
    #[must_use]
    pub fn path(self, keys: &[&str]) -> Self {
        keys.iter().fold(self, |cur, key| cur.get(key))
    }

    /// Non-empty string at this position.
    #[must_use]
    pub fn as_str(self) -> Option<&'a str> {
        self.0.and_then(Value::as_str).filter(|s| !s.trim().is_empty())
    }

    /// Shorthand for the `id` field of a `{ "id": ... }` reference object.
    #[must_use]
    pub fn id(self) -> Option<&'a str> {
        self.get("id").as_str()
    }

    /// Elements of an array at this position; empty for anything else.
    pub fn items(self) -> impl Iterator<Item = Lookup<'a>> {
        self.0
            .and_then(Value::as_array)
            .map(|arr| arr.as_slice())
            .unwrap_or_default()
            .iter()
            .map(Lookup::new)
    }

    #[must_use]
    pub fn is_missing(self) -> bool {
        matches!(self.0, None | Some(Value::Null))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn path_through_objects() {
        let v = json!({"storageProfile": {"osDisk": {"managedDisk": {"id": "/x"}}}});
        let l = Lookup::new(&v);
        assert_eq!(l.path(&["storageProfile", "osDisk", "managedDisk"]).id(), Some("/x"));
    }

    #[test]
    fn absent_and_null_paths_are_missing() {
        let v = json!({"a": null, "b": 3, "c": ""});
        let l = Lookup::new(&v);
        assert!(l.get("a").is_missing());
        assert!(l.path(&["a", "b", "c"]).is_missing());
        assert_eq!(l.get("b").get("x").as_str(), None);
        assert_eq!(l.get("c").as_str(), None);
        assert!(Lookup::missing().is_missing());
    }

    #[test]
    fn items_of_non_array_is_empty() {
        let v = json!({"list": [{"id": "/a"}, 7, {"id": "/b"}], "obj": {}});
        let l = Lookup::new(&v);
        let ids: Vec<_> = l.get("list").items().filter_map(Lookup::id).collect();
        assert_eq!(ids, vec!["/a", "/b"]);
        assert_eq!(l.get("obj").items().count(), 0);
        assert_eq!(l.get("nope").items().count(), 0);
    }
}

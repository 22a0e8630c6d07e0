use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::str::FromStr;

/// Identity of a catalog item.
///
/// Ordering is total and used to break score ties: every integer id sorts
/// before every string id, integers numerically, strings lexically.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ItemId {
    Integer(u64),
    String(String),
}

impl ItemId {
    /// Key used for on-disk records; the prefix keeps `42` and `"42"` apart
    pub fn storage_key(&self) -> String {
        match self {
            ItemId::Integer(i) => format!("i:{}", i),
            ItemId::String(s) => format!("s:{}", s),
        }
    }

    /// Inverse of [`ItemId::storage_key`]
    pub fn from_storage_key(key: &str) -> Option<Self> {
        match key.split_once(':')? {
            ("i", rest) => rest.parse().ok().map(ItemId::Integer),
            ("s", rest) => Some(ItemId::String(rest.to_string())),
            _ => None,
        }
    }
}

impl std::fmt::Display for ItemId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ItemId::Integer(i) => write!(f, "{}", i),
            ItemId::String(s) => write!(f, "{}", s),
        }
    }
}

impl FromStr for ItemId {
    type Err = Infallible;

    /// Numeric strings become integer ids, anything else a string id. An
    /// `s:` prefix forces a string id, so `s:42` addresses the string `"42"`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Some(rest) = s.strip_prefix("s:") {
            return Ok(ItemId::String(rest.to_string()));
        }
        Ok(s.parse::<u64>()
            .map(ItemId::Integer)
            .unwrap_or_else(|_| ItemId::String(s.to_string())))
    }
}

impl From<u64> for ItemId {
    fn from(i: u64) -> Self {
        ItemId::Integer(i)
    }
}

impl From<String> for ItemId {
    fn from(s: String) -> Self {
        ItemId::String(s)
    }
}

impl From<&str> for ItemId {
    fn from(s: &str) -> Self {
        ItemId::String(s.to_string())
    }
}

/// A catalog item as read from the metadata store
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub id: ItemId,
    #[serde(default)]
    pub title: String,
    /// Free text describing the item (plot summary, description)
    #[serde(default)]
    pub overview: String,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub categories: Vec<String>,
}

impl Default for ItemId {
    fn default() -> Self {
        ItemId::Integer(0)
    }
}

impl Item {
    #[inline]
    #[must_use]
    pub fn new(id: impl Into<ItemId>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            ..Default::default()
        }
    }

    #[inline]
    #[must_use]
    pub fn with_overview(mut self, overview: impl Into<String>) -> Self {
        self.overview = overview.into();
        self
    }

    #[inline]
    #[must_use]
    pub fn with_keywords<I, S>(mut self, keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.keywords = keywords.into_iter().map(Into::into).collect();
        self
    }

    #[inline]
    #[must_use]
    pub fn with_categories<I, S>(mut self, categories: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.categories = categories.into_iter().map(Into::into).collect();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_integer_ids_sort_before_strings() {
        let mut ids = vec![
            ItemId::from("b"),
            ItemId::from(10),
            ItemId::from("a"),
            ItemId::from(2),
        ];
        ids.sort();
        assert_eq!(
            ids,
            vec![ItemId::from(2), ItemId::from(10), ItemId::from("a"), ItemId::from("b")]
        );
    }

    #[test]
    fn test_parse_item_id() {
        assert_eq!("42".parse::<ItemId>().unwrap(), ItemId::Integer(42));
        assert_eq!("tt0042".parse::<ItemId>().unwrap(), ItemId::from("tt0042"));
        assert_eq!("s:42".parse::<ItemId>().unwrap(), ItemId::from("42"));
        assert_eq!("s:s:x".parse::<ItemId>().unwrap(), ItemId::from("s:x"));
    }

    #[test]
    fn test_item_json_uses_untagged_ids() {
        let item: Item = serde_json::from_str(
            r#"{"id": 7, "title": "Alien", "overview": "crew meets creature", "keywords": ["space"]}"#,
        )
        .unwrap();
        assert_eq!(item.id, ItemId::Integer(7));
        assert!(item.categories.is_empty());
        assert_eq!(ItemId::from("x").storage_key(), "s:x");
    }

    #[test]
    fn test_storage_key_round_trip() {
        for id in [ItemId::Integer(42), ItemId::from("42"), ItemId::from("a:b")] {
            assert_eq!(ItemId::from_storage_key(&id.storage_key()), Some(id));
        }
        assert_eq!(ItemId::from_storage_key("x:1"), None);
    }
}

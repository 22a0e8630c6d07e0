use std::collections::HashMap;
use tastevec_core::{Item, ItemId};

/// Read access to item metadata owned by the surrounding application.
///
/// Any network or database fetch must have completed before the engine asks;
/// the engine never blocks on I/O through this trait.
pub trait ItemSource: Send + Sync {
    fn item(&self, id: &ItemId) -> Option<Item>;

    /// Every known item, used as the corpus when fitting
    fn items(&self) -> Vec<Item>;

    fn len(&self) -> usize {
        self.items().len()
    }
}

/// Simple in-memory catalog
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    items: HashMap<ItemId, Item>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, item: Item) -> Option<Item> {
        self.items.insert(item.id.clone(), item)
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl FromIterator<Item> for Catalog {
    fn from_iter<I: IntoIterator<Item = Item>>(iter: I) -> Self {
        let mut catalog = Catalog::new();
        for item in iter {
            catalog.insert(item);
        }
        catalog
    }
}

impl ItemSource for Catalog {
    fn item(&self, id: &ItemId) -> Option<Item> {
        self.items.get(id).cloned()
    }

    /// Ordered by id so fitting sees the same corpus order on every run
    fn items(&self) -> Vec<Item> {
        let mut items: Vec<Item> = self.items.values().cloned().collect();
        items.sort_by(|a, b| a.id.cmp(&b.id));
        items
    }

    fn len(&self) -> usize {
        self.items.len()
    }
}

impl ItemSource for [Item] {
    fn item(&self, id: &ItemId) -> Option<Item> {
        self.iter().find(|item| &item.id == id).cloned()
    }

    fn items(&self) -> Vec<Item> {
        self.to_vec()
    }

    fn len(&self) -> usize {
        <[Item]>::len(self)
    }
}

impl ItemSource for Vec<Item> {
    fn item(&self, id: &ItemId) -> Option<Item> {
        self.as_slice().item(id)
    }

    fn items(&self) -> Vec<Item> {
        self.clone()
    }

    fn len(&self) -> usize {
        Vec::len(self)
    }
}

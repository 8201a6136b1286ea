//! Jewelry catalog
//!
//! Static metadata for the overlay categories: a name and the number of
//! items available for it. Which overlay slot a category feeds is derived
//! from its name.

use serde::{Deserialize, Serialize};

/// Overlay slot fed by a category
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Slot {
    /// Drawn at both ear anchors
    Earring,
    /// Drawn below the neck anchor
    Necklace,
}

impl Slot {
    /// Display name for UI
    pub fn display_name(&self) -> &'static str {
        match self {
            Slot::Earring => "Earrings",
            Slot::Necklace => "Necklaces",
        }
    }
}

/// A named catalog bucket with a fixed item count
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub name: String,
    pub item_count: usize,
}

impl Category {
    pub fn new(name: impl Into<String>, item_count: usize) -> Self {
        Self {
            name: name.into(),
            item_count,
        }
    }

    /// Slot this category's images are assigned to.
    ///
    /// Any name mentioning "earrings" is an earring category; everything
    /// else is treated as a necklace category.
    pub fn slot(&self) -> Slot {
        if self.name.contains("earrings") {
            Slot::Earring
        } else {
            Slot::Necklace
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("Unknown category: {0}")]
    UnknownCategory(String),
}

/// The set of categories known to the application
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Catalog {
    categories: Vec<Category>,
}

impl Default for Catalog {
    fn default() -> Self {
        Self::new(vec![
            Category::new("gold_earrings", 5),
            Category::new("gold_necklaces", 5),
            Category::new("diamond_earrings", 5),
            Category::new("diamond_necklaces", 6),
        ])
    }
}

impl Catalog {
    pub fn new(categories: Vec<Category>) -> Self {
        Self { categories }
    }

    /// Look up a category by name
    pub fn get(&self, name: &str) -> Result<&Category, CatalogError> {
        self.categories
            .iter()
            .find(|c| c.name == name)
            .ok_or_else(|| CatalogError::UnknownCategory(name.to_string()))
    }

    pub fn categories(&self) -> &[Category] {
        &self.categories
    }

    /// Sub-categories whose name contains `filter` (case-insensitive),
    /// e.g. "earrings" or "gold".
    pub fn family<'a>(&'a self, filter: &str) -> impl Iterator<Item = &'a Category> + 'a {
        let filter = filter.to_lowercase();
        self.categories
            .iter()
            .filter(move |c| c.name.to_lowercase().contains(&filter))
    }

    pub fn len(&self) -> usize {
        self.categories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }
}

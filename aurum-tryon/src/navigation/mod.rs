//! Catalog navigation
//!
//! Owns the active category and the image chosen for each overlay slot.
//! Gestures, thumbnail picks and the auto-try sequencer all change the
//! selection through this controller.

use crate::assets::{AssetCache, AssetList, ImageHandle};
use crate::catalog::{Catalog, CatalogError, Category, Slot};
use crate::gesture::NavDirection;

#[derive(Debug, thiserror::Error)]
pub enum NavigationError {
    #[error(transparent)]
    Catalog(#[from] CatalogError),
    #[error("Item {index} is out of range for {category} ({count} items)")]
    IndexOutOfRange {
        category: String,
        index: usize,
        count: usize,
    },
}

/// Image chosen for each slot
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Selection {
    pub earring: Option<ImageHandle>,
    pub necklace: Option<ImageHandle>,
}

impl Selection {
    pub fn get(&self, slot: Slot) -> Option<&ImageHandle> {
        match slot {
            Slot::Earring => self.earring.as_ref(),
            Slot::Necklace => self.necklace.as_ref(),
        }
    }

    pub fn set(&mut self, slot: Slot, handle: ImageHandle) {
        match slot {
            Slot::Earring => self.earring = Some(handle),
            Slot::Necklace => self.necklace = Some(handle),
        }
    }

    pub fn clear(&mut self, slot: Slot) {
        match slot {
            Slot::Earring => self.earring = None,
            Slot::Necklace => self.necklace = None,
        }
    }
}

/// Active category plus per-slot selection
pub struct NavigationController {
    catalog: Catalog,
    cache: AssetCache,
    active: Option<Category>,
    selection: Selection,
}

impl NavigationController {
    pub fn new(catalog: Catalog, cache: AssetCache) -> Self {
        Self {
            catalog,
            cache,
            active: None,
            selection: Selection::default(),
        }
    }

    /// Make `name` the active category and make sure its assets are
    /// loading. Neither slot's selection is touched.
    pub fn set_category(&mut self, name: &str) -> Result<&Category, NavigationError> {
        let category = self.catalog.get(name)?.clone();
        self.cache.preload(&category);
        log::info!("Active category: {} ({})", category.name, category.slot().display_name());
        Ok(self.active.insert(category))
    }

    /// Step the active slot's image one item forward or back, wrapping at
    /// either end. Returns `false` (and does nothing) without an active
    /// category or before its asset list exists.
    ///
    /// A slot whose image is not part of the active list counts as being at
    /// index 0.
    pub fn navigate(&mut self, direction: NavDirection) -> bool {
        let Some((slot, list)) = self.active_list() else {
            return false;
        };
        if list.is_empty() {
            return false;
        }

        let len = list.len() as isize;
        let current = self
            .selection
            .get(slot)
            .and_then(|handle| list.iter().position(|h| h == handle))
            .unwrap_or(0) as isize;
        let next = (current + direction.delta()).rem_euclid(len) as usize;

        self.selection.set(slot, list[next].clone());
        true
    }

    /// Pick item `index` (0-based) of `category` directly, activating the
    /// category first if needed.
    pub fn select_explicit(&mut self, category: &str, index: usize) -> Result<(), NavigationError> {
        if self.active_category().map(|c| c.name.as_str()) != Some(category) {
            self.set_category(category)?;
        }
        if self.select_index(index) {
            Ok(())
        } else {
            let count = self.active.as_ref().map(|c| c.item_count).unwrap_or(0);
            Err(NavigationError::IndexOutOfRange {
                category: category.to_string(),
                index,
                count,
            })
        }
    }

    /// Assign item `index` of the active list to the active slot.
    ///
    /// Returns `false` if there is no active list or the index is outside
    /// it.
    pub fn select_index(&mut self, index: usize) -> bool {
        let Some((slot, list)) = self.active_list() else {
            return false;
        };
        match list.get(index) {
            Some(handle) => {
                self.selection.set(slot, handle.clone());
                true
            }
            None => false,
        }
    }

    /// Slot and asset list of the active category
    fn active_list(&self) -> Option<(Slot, AssetList)> {
        let category = self.active.as_ref()?;
        let list = self.cache.get(&category.name)?;
        Some((category.slot(), list))
    }

    pub fn active_category(&self) -> Option<&Category> {
        self.active.as_ref()
    }

    /// Handles of the active category (thumbnails, auto-try)
    pub fn active_assets(&self) -> Option<AssetList> {
        self.active_list().map(|(_, list)| list)
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::{AssetError, AssetSource};
    use image::RgbaImage;
    use std::sync::Arc;

    struct BlankSource;

    impl AssetSource for BlankSource {
        fn load(&self, _category: &str, _number: usize) -> Result<RgbaImage, AssetError> {
            Ok(RgbaImage::new(1, 1))
        }
    }

    fn controller() -> NavigationController {
        let catalog = Catalog::new(vec![
            Category::new("gold_earrings", 5),
            Category::new("gold_necklaces", 3),
            Category::new("diamond_earrings", 2),
            Category::new("empty_necklaces", 0),
        ]);
        NavigationController::new(catalog, AssetCache::new(Arc::new(BlankSource)))
    }

    fn earring_index(nav: &NavigationController) -> Option<(String, usize)> {
        nav.selection()
            .earring
            .as_ref()
            .map(|h| (h.category().to_string(), h.index()))
    }

    #[test]
    fn test_navigate_without_category_is_noop() {
        let mut nav = controller();
        assert!(!nav.navigate(NavDirection::Next));
        assert_eq!(*nav.selection(), Selection::default());
    }

    #[test]
    fn test_navigate_empty_category_is_noop() {
        let mut nav = controller();
        nav.set_category("empty_necklaces").unwrap();
        assert!(!nav.navigate(NavDirection::Previous));
        assert!(nav.selection().necklace.is_none());
    }

    #[test]
    fn test_navigate_from_nothing_starts_at_zero() {
        let mut nav = controller();
        nav.set_category("gold_earrings").unwrap();

        // No selection counts as index 0, so Next lands on index 1
        assert!(nav.navigate(NavDirection::Next));
        assert_eq!(earring_index(&nav), Some(("gold_earrings".to_string(), 1)));
    }

    #[test]
    fn test_navigate_wraps() {
        let mut nav = controller();
        nav.set_category("gold_earrings").unwrap();
        nav.select_index(4);
        assert!(nav.navigate(NavDirection::Next));
        assert_eq!(earring_index(&nav), Some(("gold_earrings".to_string(), 0)));

        assert!(nav.navigate(NavDirection::Previous));
        assert_eq!(earring_index(&nav), Some(("gold_earrings".to_string(), 4)));
    }

    #[test]
    fn test_navigate_round_trip() {
        let mut nav = controller();
        nav.set_category("gold_earrings").unwrap();
        for start in 0..5 {
            assert!(nav.select_index(start));
            let before = nav.selection().clone();
            nav.navigate(NavDirection::Next);
            nav.navigate(NavDirection::Previous);
            assert_eq!(*nav.selection(), before);
        }
    }

    #[test]
    fn test_navigate_single_item_category() {
        let catalog = Catalog::new(vec![Category::new("solo_earrings", 1)]);
        let mut nav = NavigationController::new(catalog, AssetCache::new(Arc::new(BlankSource)));
        nav.set_category("solo_earrings").unwrap();
        assert!(nav.navigate(NavDirection::Next));
        assert_eq!(nav.selection().earring.as_ref().map(|h| h.index()), Some(0));
    }

    #[test]
    fn test_category_switch_keeps_other_slot() {
        let mut nav = controller();
        nav.select_explicit("gold_necklaces", 2).unwrap();
        nav.select_explicit("gold_earrings", 3).unwrap();

        nav.set_category("diamond_earrings").unwrap();
        assert_eq!(nav.selection().necklace.as_ref().map(|h| h.index()), Some(2));
        // Stale earring from another category counts as index 0
        assert!(nav.navigate(NavDirection::Next));
        assert_eq!(earring_index(&nav), Some(("diamond_earrings".to_string(), 1)));
    }

    #[test]
    fn test_navigation_routes_to_slot() {
        let mut nav = controller();
        nav.set_category("gold_necklaces").unwrap();
        nav.navigate(NavDirection::Previous);

        assert!(nav.selection().earring.is_none());
        assert_eq!(nav.selection().necklace.as_ref().map(|h| h.index()), Some(2));
    }

    #[test]
    fn test_select_explicit_activates_category() {
        let mut nav = controller();
        nav.select_explicit("diamond_earrings", 1).unwrap();
        assert_eq!(nav.active_category().map(|c| c.name.as_str()), Some("diamond_earrings"));
        assert_eq!(earring_index(&nav), Some(("diamond_earrings".to_string(), 1)));
    }

    #[test]
    fn test_select_explicit_errors() {
        let mut nav = controller();
        assert!(matches!(
            nav.select_explicit("platinum_rings", 0),
            Err(NavigationError::Catalog(CatalogError::UnknownCategory(_)))
        ));
        assert!(matches!(
            nav.select_explicit("gold_earrings", 5),
            Err(NavigationError::IndexOutOfRange { index: 5, count: 5, .. })
        ));
    }

    #[test]
    fn test_same_handles_after_reselecting_category() {
        let mut nav = controller();
        nav.set_category("gold_earrings").unwrap();
        let first = nav.active_assets().unwrap();
        nav.set_category("gold_necklaces").unwrap();
        nav.set_category("gold_earrings").unwrap();
        assert!(Arc::ptr_eq(&first, &nav.active_assets().unwrap()));
    }
}

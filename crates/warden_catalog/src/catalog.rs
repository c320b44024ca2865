//! # Check Catalog
//!
//! Dense id-indexed table of validated checks plus one id pool per category.
//! Built once, overridden once, then wrapped in an `Arc` and never mutated.

use tracing::{debug, info, warn};

use crate::definition::{CheckDefinition, CheckRow, OverrideRow};
use crate::error::{CatalogError, CatalogResult, RowError};
use crate::kind::{Action, Category};
use crate::store::CheckStore;

/// A row skipped during load, kept for diagnostics.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RejectedRow {
    /// Id as stored.
    pub id: u32,
    /// Why it was skipped.
    pub error: RowError,
}

/// The loaded set of checks.
#[derive(Debug, Default)]
pub struct CheckCatalog {
    /// Indexed by check id. Gaps are `None`.
    checks: Vec<Option<CheckDefinition>>,
    /// Ids per category, sorted ascending.
    pools: [Vec<u16>; 3],
    rejected: Vec<RejectedRow>,
}

impl CheckCatalog {
    /// Creates an empty catalog.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Validates rows and builds the catalog.
    ///
    /// Every accepted check starts with `default_action`; overrides are
    /// applied afterwards with [`CheckCatalog::apply_overrides`].
    ///
    /// # Errors
    ///
    /// Fails only when two accepted rows share an id. Invalid rows are
    /// logged, skipped and listed in [`CheckCatalog::rejected`].
    pub fn load(rows: &[CheckRow], default_action: Action) -> CatalogResult<Self> {
        let mut catalog = Self::new();

        for row in rows {
            let check = match CheckDefinition::from_row(row, default_action) {
                Ok(check) => check,
                Err(error) => {
                    warn!(check_id = row.id, kind = row.kind, %error, "skipping check row");
                    catalog.rejected.push(RejectedRow { id: row.id, error });
                    continue;
                }
            };
            catalog.insert(check)?;
        }

        for pool in &mut catalog.pools {
            pool.sort_unstable();
        }

        info!(
            checks = catalog.len(),
            inject = catalog.pools[Category::Inject.index()].len(),
            lua = catalog.pools[Category::Lua.index()].len(),
            modded = catalog.pools[Category::Modded.index()].len(),
            rejected = catalog.rejected.len(),
            "loaded check catalog"
        );
        Ok(catalog)
    }

    /// Loads definitions and overrides from a store.
    ///
    /// # Errors
    ///
    /// Propagates store failures and duplicate ids.
    pub fn from_store<S: CheckStore + ?Sized>(store: &S, default_action: Action) -> CatalogResult<Self> {
        let rows = store.load_check_definitions()?;
        let mut catalog = Self::load(&rows, default_action)?;
        let overrides = store.load_action_overrides()?;
        catalog.apply_overrides(&overrides);
        Ok(catalog)
    }

    fn insert(&mut self, check: CheckDefinition) -> CatalogResult<()> {
        let index = usize::from(check.id);
        if index >= self.checks.len() {
            self.checks.resize_with(index + 1, || None);
        }
        if self.checks[index].is_some() {
            return Err(CatalogError::DuplicateCheckId(check.id));
        }
        if let Some(category) = check.kind.category() {
            self.pools[category.index()].push(check.id);
        }
        self.checks[index] = Some(check);
        Ok(())
    }

    /// Replaces the action of individual checks.
    ///
    /// Unknown ids and invalid action values are logged and ignored.
    /// Returns the number of overrides applied.
    pub fn apply_overrides(&mut self, overrides: &[OverrideRow]) -> usize {
        let mut applied = 0;
        for row in overrides {
            let Some(action) = Action::from_u8(row.action) else {
                warn!(check_id = row.id, action = row.action, "ignoring override with invalid action");
                continue;
            };
            let slot = usize::try_from(row.id)
                .ok()
                .and_then(|index| self.checks.get_mut(index))
                .and_then(Option::as_mut);
            match slot {
                Some(check) => {
                    debug!(check_id = row.id, from = %check.action, to = %action, "action override");
                    check.action = action;
                    applied += 1;
                }
                None => warn!(check_id = row.id, "ignoring override for unknown check"),
            }
        }
        applied
    }

    /// Looks up a check by id.
    #[must_use]
    pub fn get(&self, id: u16) -> Option<&CheckDefinition> {
        self.checks.get(usize::from(id)).and_then(Option::as_ref)
    }

    /// Ids in a category, sorted ascending.
    #[must_use]
    pub fn ids_in(&self, category: Category) -> &[u16] {
        &self.pools[category.index()]
    }

    /// Number of loaded checks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.pools.iter().map(Vec::len).sum()
    }

    /// Returns true if no check was loaded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Highest loaded id, if any.
    #[must_use]
    pub fn max_check_id(&self) -> Option<u16> {
        self.iter().map(|check| check.id).max()
    }

    /// Rows skipped during load.
    #[must_use]
    pub fn rejected(&self) -> &[RejectedRow] {
        &self.rejected
    }

    /// Iterates loaded checks in id order.
    pub fn iter(&self) -> impl Iterator<Item = &CheckDefinition> {
        self.checks.iter().filter_map(Option::as_ref)
    }
}

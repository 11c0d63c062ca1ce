use std::collections::{HashMap, HashSet};

use reckon_core::{name_key, CategoryId, Classification, LedgerStore, OwnerId, StoreError};
use tracing::{debug, warn};

/// Category and subcategory names the owner had before the batch started.
/// Never updated while the batch runs.
#[derive(Debug, Clone, Default)]
pub struct TaxonomySnapshot {
    categories: HashMap<String, CategoryId>,
    subcategories: HashSet<String>,
}

impl TaxonomySnapshot {
    pub async fn load<S: LedgerStore + ?Sized>(
        store: &S,
        owner: &OwnerId,
    ) -> Result<Self, StoreError> {
        let categories = store
            .list_categories(owner)
            .await?
            .into_iter()
            .map(|c| (name_key(&c.name), c.id))
            .collect();
        let subcategories = store
            .list_subcategories(owner)
            .await?
            .into_iter()
            .map(|s| name_key(&s.name))
            .collect();
        Ok(TaxonomySnapshot {
            categories,
            subcategories,
        })
    }
}

/// What taxonomy resolution did for one row.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaxonomyOutcome {
    /// Labels to store on the transaction.
    pub classification: Classification,
    /// Set when this row created a category unknown before the batch.
    pub new_category: Option<String>,
    pub new_subcategory: Option<String>,
}

/// Creates missing taxonomy entities on demand for one batch.
///
/// Names created earlier in the same batch are remembered so each one is
/// upserted once per batch, however many rows carry it.
pub struct TaxonomySync<'a, S: ?Sized> {
    store: &'a S,
    owner: &'a OwnerId,
    snapshot: TaxonomySnapshot,
    created_categories: HashMap<String, CategoryId>,
    created_subcategories: HashSet<String>,
}

impl<'a, S: LedgerStore + ?Sized> TaxonomySync<'a, S> {
    pub fn new(store: &'a S, owner: &'a OwnerId, snapshot: TaxonomySnapshot) -> Self {
        Self {
            store,
            owner,
            snapshot,
            created_categories: HashMap::new(),
            created_subcategories: HashSet::new(),
        }
    }

    pub async fn resolve(&mut self, requested: Classification) -> TaxonomyOutcome {
        let Classification {
            category,
            subcategory,
        } = requested;

        let Some(category) = category else {
            if let Some(sub) = subcategory {
                debug!(subcategory = %sub, "dropping subcategory without a category");
            }
            return TaxonomyOutcome::default();
        };

        let (category_id, new_category) = match self.resolve_category(&category).await {
            Ok(resolved) => resolved,
            Err(e) => {
                warn!(category = %category, error = %e, "category upsert failed; keeping label without subcategory");
                return TaxonomyOutcome {
                    classification: Classification {
                        category: Some(category),
                        subcategory: None,
                    },
                    ..Default::default()
                };
            }
        };

        let (subcategory, new_subcategory) = match subcategory {
            None => (None, None),
            Some(sub) => match self.resolve_subcategory(&sub, category_id).await {
                Ok(created) => {
                    let new_subcategory = created.then(|| sub.clone());
                    (Some(sub), new_subcategory)
                }
                Err(e) => {
                    warn!(subcategory = %sub, error = %e, "subcategory upsert failed; omitting it");
                    (None, None)
                }
            },
        };

        TaxonomyOutcome {
            classification: Classification {
                category: Some(category.clone()),
                subcategory,
            },
            new_category: new_category.then_some(category),
            new_subcategory,
        }
    }

    /// Returns the category id and whether this call created it.
    async fn resolve_category(&mut self, name: &str) -> Result<(CategoryId, bool), StoreError> {
        let key = name_key(name);
        if let Some(id) = self.snapshot.categories.get(&key) {
            return Ok((*id, false));
        }
        if let Some(id) = self.created_categories.get(&key) {
            return Ok((*id, false));
        }

        let category = self.store.upsert_category(self.owner, name).await?;
        debug!(category = %category.name, id = %category.id, "created category");
        self.created_categories.insert(key, category.id);
        Ok((category.id, true))
    }

    async fn resolve_subcategory(
        &mut self,
        name: &str,
        category_id: CategoryId,
    ) -> Result<bool, StoreError> {
        let key = name_key(name);
        if self.snapshot.subcategories.contains(&key) || self.created_subcategories.contains(&key) {
            return Ok(false);
        }

        let subcategory = self
            .store
            .upsert_subcategory(self.owner, name, category_id)
            .await?;
        debug!(subcategory = %subcategory.name, category_id = %category_id, "created subcategory");
        self.created_subcategories.insert(key);
        Ok(true)
    }
}

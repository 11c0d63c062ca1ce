use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

use super::owner::OwnerId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CategoryId(pub i64);

impl fmt::Display for CategoryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubcategoryId(pub i64);

/// Names are unique per owner, compared case-insensitively, stored with the
/// casing they were first created with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    pub id: CategoryId,
    pub owner_id: OwnerId,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subcategory {
    pub id: SubcategoryId,
    pub owner_id: OwnerId,
    pub category_id: CategoryId,
    pub name: String,
}

/// Case-insensitive lookup key for a category or subcategory name.
pub fn name_key(name: &str) -> String {
    name.trim().to_lowercase()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubcategoryNode {
    pub id: SubcategoryId,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategoryNode {
    pub id: CategoryId,
    pub name: String,
    pub subcategories: Vec<SubcategoryNode>,
}

/// Nests subcategories under their parents, keeping the input order of both.
/// Subcategories whose parent is not in `categories` are dropped.
pub fn build_tree(categories: &[Category], subcategories: &[Subcategory]) -> Vec<CategoryNode> {
    let mut children: HashMap<CategoryId, Vec<SubcategoryNode>> = HashMap::new();
    for sub in subcategories {
        children.entry(sub.category_id).or_default().push(SubcategoryNode {
            id: sub.id,
            name: sub.name.clone(),
        });
    }

    categories
        .iter()
        .map(|cat| CategoryNode {
            id: cat.id,
            name: cat.name.clone(),
            subcategories: children.remove(&cat.id).unwrap_or_default(),
        })
        .collect()
}

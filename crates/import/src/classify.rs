use std::collections::HashMap;

use reckon_core::{Classification, Transaction};

/// Token → (category, subcategory) lookup learned from an owner's history.
///
/// Built from a snapshot taken before a batch starts; rows written during the
/// batch never feed back into it.
#[derive(Debug, Clone, Default)]
pub struct KeywordMap {
    bindings: HashMap<String, (String, String)>,
}

/// Result of classifying one row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Suggestion {
    pub classification: Classification,
    pub auto_suggested: bool,
}

impl KeywordMap {
    /// Only transactions carrying notes, a category and a subcategory
    /// contribute. The first transaction to use a token owns it.
    pub fn from_history(history: &[Transaction]) -> Self {
        let mut bindings = HashMap::new();
        for tx in history {
            let (Some(notes), Some(category), Some(subcategory)) =
                (&tx.notes, &tx.category, &tx.subcategory)
            else {
                continue;
            };
            for token in tokenize(notes) {
                bindings
                    .entry(token)
                    .or_insert_with(|| (category.clone(), subcategory.clone()));
            }
        }
        KeywordMap { bindings }
    }

    /// Fills in both labels when the row has no category at all. A row with an
    /// explicit category is returned untouched, even if its subcategory is
    /// missing.
    pub fn classify(&self, notes: Option<&str>, explicit: Classification) -> Suggestion {
        if explicit.category.is_some() {
            return Suggestion {
                classification: explicit,
                auto_suggested: false,
            };
        }

        let hit = notes
            .into_iter()
            .flat_map(tokenize)
            .find_map(|token| self.bindings.get(&token));

        match hit {
            Some((category, subcategory)) => Suggestion {
                classification: Classification {
                    category: Some(category.clone()),
                    subcategory: Some(subcategory.clone()),
                },
                auto_suggested: true,
            },
            None => Suggestion {
                classification: explicit,
                auto_suggested: false,
            },
        }
    }
}

pub fn tokenize(notes: &str) -> Vec<String> {
    notes.to_lowercase().split_whitespace().map(str::to_string).collect()
}

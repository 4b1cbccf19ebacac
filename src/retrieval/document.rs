use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// One retrievable catalog row.
///
/// `position` is the row the document occupied when the index was built;
/// its embedding is row `position` of the index matrix.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub position: usize,
    pub content: String,
    pub title: Option<String>,
    pub category: Option<String>,
    /// Raw cell text, rendered as-is.
    pub score: Option<String>,
    pub price: Option<String>,
    /// Remaining metadata columns, kept for presentation only.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, String>,
}

impl Document {
    pub fn new(position: usize, content: impl Into<String>) -> Self {
        Self {
            position,
            content: content.into(),
            title: None,
            category: None,
            score: None,
            price: None,
            extra: BTreeMap::new(),
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn with_score(mut self, score: impl Into<String>) -> Self {
        self.score = Some(score.into());
        self
    }

    pub fn with_price(mut self, price: impl Into<String>) -> Self {
        self.price = Some(price.into());
        self
    }
}

/// A search hit: the document and its squared L2 distance to the query.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredDocument {
    pub document: Document,
    pub distance: f32,
}

//! Entity-by-document presence bits.

use rayon::prelude::*;

use crate::graph::EntityPattern;

/// One row per surviving entity, one bit per document.
#[derive(Debug, Clone)]
pub struct PresenceMatrix {
    entities: Vec<EntityPattern>,
    rows: Vec<Vec<bool>>,
    document_count: usize,
}

impl PresenceMatrix {
    /// Scans every document once per pattern and drops entities mentioned
    /// in fewer than `min_mentions` documents. Pattern order is preserved.
    #[must_use]
    pub fn build(documents: &[&str], patterns: Vec<EntityPattern>, min_mentions: usize) -> Self {
        let rows: Vec<Vec<bool>> = patterns
            .par_iter()
            .map(|pattern| documents.iter().map(|doc| pattern.is_match(doc)).collect())
            .collect();

        let total = patterns.len();
        let (entities, rows): (Vec<_>, Vec<_>) = patterns
            .into_iter()
            .zip(rows)
            .filter(|(_, row)| row.iter().filter(|&&present| present).count() >= min_mentions)
            .unzip();

        tracing::debug!(
            "{} of {total} entities have at least {min_mentions} mentions",
            entities.len()
        );

        Self {
            entities,
            rows,
            document_count: documents.len(),
        }
    }

    #[must_use]
    pub fn entities(&self) -> &[EntityPattern] {
        &self.entities
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    #[must_use]
    pub fn document_count(&self) -> usize {
        self.document_count
    }

    #[must_use]
    pub fn row(&self, entity: usize) -> &[bool] {
        &self.rows[entity]
    }

    /// Documents mentioning the entity, in order.
    pub fn documents_of(&self, entity: usize) -> impl Iterator<Item = usize> + '_ {
        self.rows[entity]
            .iter()
            .enumerate()
            .filter_map(|(doc, &present)| present.then_some(doc))
    }

    #[must_use]
    pub fn mention_count(&self, entity: usize) -> usize {
        self.documents_of(entity).count()
    }
}

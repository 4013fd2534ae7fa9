//! Product-to-product co-purchase graph

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::domain::order::Order;
use crate::domain::product::ProductId;

/// Directed co-purchase counts. Every order adds one to both `(a, b)` and `(b, a)` for each pair
/// of distinct products it contains, so the matrix is symmetric when built from orders alone.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CoOccurrenceMatrix {
    edges: HashMap<ProductId, HashMap<ProductId, u32>>,
}

impl CoOccurrenceMatrix {
    /// Builds the matrix from an order snapshot, skipping cancelled orders. A product listed on
    /// several lines of the same order counts once for that order.
    pub fn build(orders: &[Order]) -> Self {
        let mut matrix = Self::default();

        for order in orders.iter().filter(|order| order.status.qualifies()) {
            let products = order.distinct_product_ids();
            for source in &products {
                for target in &products {
                    if source != target {
                        matrix.increment(source, target);
                    }
                }
            }
        }

        matrix
    }

    fn increment(&mut self, source: &ProductId, target: &ProductId) {
        *self
            .edges
            .entry(source.clone())
            .or_default()
            .entry(target.clone())
            .or_default() += 1;
    }

    pub fn count(&self, source: &ProductId, target: &ProductId) -> u32 {
        self.edges.get(source).and_then(|partners| partners.get(target)).copied().unwrap_or(0)
    }

    /// Co-purchase partners of `product`, highest count first and ties by product id.
    pub fn partners(&self, product: &ProductId) -> Vec<(&ProductId, u32)> {
        let Some(partners) = self.edges.get(product) else {
            return Vec::new();
        };

        let mut ranked: Vec<(&ProductId, u32)> =
            partners.iter().map(|(id, count)| (id, *count)).collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        ranked
    }

    /// Products with at least one co-purchase partner.
    pub fn product_count(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }
}

/// Digest of the qualifying order snapshot. Any change to an order id, status, product or
/// quantity changes the key.
pub fn snapshot_key(orders: &[Order]) -> blake3::Hash {
    let mut qualifying: Vec<&Order> =
        orders.iter().filter(|order| order.status.qualifies()).collect();
    qualifying.sort_by(|a, b| a.id.0.cmp(&b.id.0));

    let mut hasher = blake3::Hasher::new();
    for order in qualifying {
        hasher.update(order.id.0.as_bytes());
        hasher.update(&[0x1f]);
        hasher.update(order.status.as_str().as_bytes());
        for line in &order.lines {
            hasher.update(&[0x1e]);
            hasher.update(line.product_id.as_str().as_bytes());
            hasher.update(&line.quantity.to_le_bytes());
        }
        hasher.update(&[0x1d]);
    }
    hasher.finalize()
}

/// Single-entry cache keyed by [`snapshot_key`]. A snapshot that differs from the cached one
/// always triggers a rebuild, so cached and rebuilt matrices are identical.
#[derive(Debug, Default)]
pub struct MatrixCache {
    entry: Mutex<Option<(blake3::Hash, Arc<CoOccurrenceMatrix>)>>,
}

impl MatrixCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_or_build(&self, orders: &[Order]) -> Arc<CoOccurrenceMatrix> {
        let key = snapshot_key(orders);

        if let Ok(guard) = self.entry.lock() {
            if let Some((cached_key, matrix)) = guard.as_ref() {
                if *cached_key == key {
                    tracing::debug!(
                        event_name = "recommendations.matrix.cache_hit",
                        "reusing co-occurrence matrix"
                    );
                    return Arc::clone(matrix);
                }
            }
        }

        let matrix = Arc::new(CoOccurrenceMatrix::build(orders));
        if let Ok(mut guard) = self.entry.lock() {
            *guard = Some((key, Arc::clone(&matrix)));
        }
        matrix
    }

    pub fn invalidate(&self) {
        if let Ok(mut guard) = self.entry.lock() {
            *guard = None;
        }
    }
}

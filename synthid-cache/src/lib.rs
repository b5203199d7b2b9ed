//! Id-keyed detail cache filled in batches.
//!
//! List endpoints return summaries without the body text. The views look the
//! body up here and show a placeholder until it has been fetched.

use std::collections::HashMap;
use std::fmt::Display;
use std::future::Future;
use std::hash::Hash;

use futures_util::future::join_all;
use synthid_client::Backend;
use synthid_types::{DetectionId, DetectionSummary, GenerationId, GenerationSummary};
use tracing::{debug, warn};

pub const LOADING: &str = "Loading...";

#[derive(Clone, Debug, PartialEq)]
pub enum Resolution<V> {
    Pending,
    Resolved(V),
    Failed(String),
}

#[derive(Clone, Debug, PartialEq)]
pub struct BatchReport<K> {
    pub requested: usize,
    pub resolved: usize,
    pub failed: Vec<(K, String)>,
}

impl<K> Default for BatchReport<K> {
    fn default() -> Self {
        Self {
            requested: 0,
            resolved: 0,
            failed: Vec::new(),
        }
    }
}

#[derive(Clone, Debug)]
pub struct BatchResolver<K, V> {
    entries: HashMap<K, Resolution<V>>,
}

impl<K, V> Default for BatchResolver<K, V> {
    fn default() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }
}

impl<K, V> BatchResolver<K, V>
where
    K: Eq + Hash + Clone + Display,
    V: Clone,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Only resolved values are visible; pending and failed keys read as absent.
    pub fn get(&self, key: &K) -> Option<&V> {
        match self.entries.get(key) {
            Some(Resolution::Resolved(v)) => Some(v),
            _ => None,
        }
    }

    pub fn state(&self, key: &K) -> Option<&Resolution<V>> {
        self.entries.get(key)
    }

    pub fn len(&self) -> usize {
        self.iter_resolved().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Keys that still need a fetch, deduplicated, in input order.
    ///
    /// `resolve` holds `&mut self` for a whole batch, so a `Pending` key seen
    /// here was left by a batch that never finished and is fetched again.
    pub fn unresolved(&self, keys: impl IntoIterator<Item = K>) -> Vec<K> {
        let mut out: Vec<K> = Vec::new();
        for key in keys {
            let needed = !matches!(self.entries.get(&key), Some(Resolution::Resolved(_)));
            if needed && !out.contains(&key) {
                out.push(key);
            }
        }
        out
    }

    pub fn mark_pending(&mut self, key: K) {
        self.entries
            .entry(key)
            .and_modify(|e| {
                if !matches!(e, Resolution::Resolved(_)) {
                    *e = Resolution::Pending;
                }
            })
            .or_insert(Resolution::Pending);
    }

    /// Record one fetch outcome. A failure never evicts a resolved value.
    pub fn settle(&mut self, key: K, outcome: Result<V, String>) {
        match outcome {
            Ok(v) => {
                self.entries.insert(key, Resolution::Resolved(v));
            }
            Err(msg) => {
                let keep = matches!(self.entries.get(&key), Some(Resolution::Resolved(_)));
                if !keep {
                    self.entries.insert(key, Resolution::Failed(msg));
                }
            }
        }
    }

    /// Merge resolved values; later writes win.
    pub fn merge(&mut self, values: impl IntoIterator<Item = (K, V)>) {
        for (k, v) in values {
            self.entries.insert(k, Resolution::Resolved(v));
        }
    }

    /// Fetch every unresolved key concurrently and merge what comes back.
    pub async fn resolve<F, Fut, E>(&mut self, keys: impl IntoIterator<Item = K>, fetch: F) -> BatchReport<K>
    where
        F: Fn(K) -> Fut,
        Fut: Future<Output = Result<V, E>>,
        E: Display,
    {
        let wanted = self.unresolved(keys);
        if wanted.is_empty() {
            return BatchReport::default();
        }
        for key in &wanted {
            self.mark_pending(key.clone());
        }

        let outcomes = join_all(wanted.iter().cloned().map(|key| {
            let fut = fetch(key.clone());
            async move { (key, fut.await) }
        }))
        .await;

        let mut report = BatchReport {
            requested: wanted.len(),
            ..BatchReport::default()
        };
        for (key, outcome) in outcomes {
            match outcome {
                Ok(v) => {
                    report.resolved += 1;
                    self.settle(key, Ok(v));
                }
                Err(err) => {
                    let msg = err.to_string();
                    warn!(key = %key, error = %msg, "detail lookup failed");
                    report.failed.push((key.clone(), msg.clone()));
                    self.settle(key, Err(msg));
                }
            }
        }
        debug!(requested = report.requested, resolved = report.resolved, "batch resolved");
        report
    }

    pub fn iter_resolved(&self) -> impl Iterator<Item = (&K, &V)> {
        self.entries.iter().filter_map(|(k, e)| match e {
            Resolution::Resolved(v) => Some((k, v)),
            _ => None,
        })
    }
}

impl<K> BatchResolver<K, String>
where
    K: Eq + Hash + Clone + Display,
{
    pub fn display<'a>(&'a self, key: &K, placeholder: &'a str) -> &'a str {
        self.get(key).map(String::as_str).unwrap_or(placeholder)
    }
}

/// Fill in `output_text` for generation rows not yet cached.
pub async fn enrich_outputs(
    cache: &mut BatchResolver<GenerationId, String>,
    backend: &dyn Backend,
    rows: &[GenerationSummary],
) -> BatchReport<GenerationId> {
    cache
        .resolve(rows.iter().map(|r| r.id), |id| async move {
            backend.get_generation(id).await.map(|g| g.output_text)
        })
        .await
}

/// Fill in the full analysed text for detection rows not yet cached.
pub async fn enrich_detections(
    cache: &mut BatchResolver<DetectionId, String>,
    backend: &dyn Backend,
    rows: &[DetectionSummary],
) -> BatchReport<DetectionId> {
    cache
        .resolve(rows.iter().map(|r| r.id), |id| async move {
            backend.get_detection(id).await.map(|d| d.input_text)
        })
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use synthid_client::InMemoryBackend;
    use synthid_types::{GenerationConfig, GenerationQuery, GenerationRequest};

    #[test]
    fn later_merge_overwrites_earlier() {
        let mut cache: BatchResolver<u32, String> = BatchResolver::new();
        cache.merge([(1, "a".to_string())]);
        cache.merge([(1, "b".to_string()), (2, "c".to_string())]);

        let mut all: Vec<(u32, String)> = cache.iter_resolved().map(|(k, v)| (*k, v.clone())).collect();
        all.sort();
        assert_eq!(all, vec![(1, "b".to_string()), (2, "c".to_string())]);
    }

    #[test]
    fn failure_keeps_resolved_value() {
        let mut cache: BatchResolver<u32, String> = BatchResolver::new();
        cache.settle(1, Ok("a".into()));
        cache.settle(1, Err("boom".into()));
        assert_eq!(cache.get(&1).map(String::as_str), Some("a"));

        cache.settle(2, Err("boom".into()));
        assert_eq!(cache.get(&2), None);
        assert_eq!(cache.state(&2), Some(&Resolution::Failed("boom".into())));
        assert_eq!(cache.display(&2, LOADING), LOADING);
    }

    #[tokio::test]
    async fn failed_lookup_is_retried_on_next_batch() {
        let backend = InMemoryBackend::new();
        let cfg = GenerationConfig::default();
        let a = backend.seed(GenerationRequest::new(cfg.clone(), "one")).await;
        let b = backend.seed(GenerationRequest::new(cfg, "two")).await;
        backend.fail_detail(b.id).await;

        let rows = backend.list_generations(&GenerationQuery::new(1, 10)).await.unwrap().items;
        let mut cache = BatchResolver::new();
        let report = enrich_outputs(&mut cache, &backend, &rows).await;
        assert_eq!(report.requested, 2);
        assert_eq!(report.resolved, 1);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(cache.get(&a.id), Some(&a.output_text));
        assert_eq!(cache.get(&b.id), None);

        backend.heal_detail(b.id).await;
        backend.clear_calls().await;
        let report = enrich_outputs(&mut cache, &backend, &rows).await;
        assert_eq!(report.requested, 1);
        assert_eq!(cache.get(&b.id), Some(&b.output_text));
        assert_eq!(backend.count("GET", "/api/generations/").await, 1);
    }

    #[tokio::test]
    async fn resolved_rows_are_not_fetched_again() {
        let backend = InMemoryBackend::new();
        let gen = backend
            .seed(GenerationRequest::new(GenerationConfig::default(), "hi"))
            .await;
        let rows = vec![gen.summary(), gen.summary()];

        let mut cache = BatchResolver::new();
        let report = enrich_outputs(&mut cache, &backend, &rows).await;
        assert_eq!(report.requested, 1);
        let report = enrich_outputs(&mut cache, &backend, &rows).await;
        assert_eq!(report, BatchReport::default());
        assert_eq!(backend.calls().await.len(), 1);
    }

    #[tokio::test]
    async fn abandoned_batch_is_fetched_again() {
        let mut cache: BatchResolver<u32, String> = BatchResolver::new();
        cache.mark_pending(1);
        cache.mark_pending(2);
        cache.settle(2, Ok("kept".into()));

        assert_eq!(cache.unresolved([1, 2]), vec![1]);
        let report = cache
            .resolve([1, 2], |k| async move { Ok::<_, String>(format!("v{k}")) })
            .await;
        assert_eq!(report.requested, 1);
        assert_eq!(cache.display(&1, LOADING), "v1");
        assert_eq!(cache.display(&2, LOADING), "kept");
    }
}

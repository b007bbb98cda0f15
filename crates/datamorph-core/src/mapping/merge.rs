//! Multi-source merging
//!
//! Turns the fetched payloads of every configured source into one mapped
//! payload. The effective merge mode decides the shape:
//!
//! - `single`: one source, mapped items as an array (or one object when the
//!   source yields a lone object)
//! - `combined`: items of all sources pooled into one array, ordered by the
//!   merge strategy
//! - `separate`: one sub-result per source, keyed by the source's display name
//!
//! Copyright (c) 2025 Datamorph Team
//! Licensed under the Apache-2.0 license

use super::resolver::MappingResolver;
use crate::path;
use crate::transform::TransformationPipeline;
use crate::types::{
    MappingConfig, MergeMode, MergeStrategy, PipelineStage, SourceDescriptor, SourceMetadata,
    SourcePayloads,
};
use crate::value::parse_date;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{debug, info_span, Instrument};

/// Keys probed, in order, when no `dateField` is configured
pub const DEFAULT_DATE_FIELDS: &[&str] = &[
    "date",
    "pubDate",
    "published",
    "publishedAt",
    "createdAt",
    "updatedAt",
    "timestamp",
];

/// Mapped item count for one source
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SourceCount {
    pub id: String,
    pub name: String,
    pub count: usize,
}

/// Result of merging every source
#[derive(Debug, Clone)]
pub struct MergeOutcome {
    /// Effective merge mode
    pub mode: MergeMode,
    /// Mapped (and possibly pipeline-transformed) payload
    pub payload: Value,
    /// Mapped items contributed by each source, in configuration order
    pub source_counts: Vec<SourceCount>,
    /// Metadata of every configured source
    pub sources: Vec<SourceMetadata>,
}

/// A mapped item still tagged with the source it came from
#[derive(Debug)]
struct TaggedItem {
    source: usize,
    item: Value,
}

/// Items extracted from one source's payload
#[derive(Debug, Default)]
struct SourceItems {
    items: Vec<Value>,
    /// The payload held one object rather than a list
    lone: bool,
}

/// Merges fetched payloads according to a mapping configuration
#[derive(Debug)]
pub struct SourceMerger<'a> {
    config: &'a MappingConfig,
    pipeline: &'a TransformationPipeline,
    timestamp: String,
}

impl<'a> SourceMerger<'a> {
    pub fn new(config: &'a MappingConfig, pipeline: &'a TransformationPipeline, timestamp: impl Into<String>) -> Self {
        Self {
            config,
            pipeline,
            timestamp: timestamp.into(),
        }
    }

    /// Merge mode actually used for the configured sources
    pub fn effective_mode(&self) -> MergeMode {
        effective_mode(self.config)
    }

    /// Map and merge every source's payload
    pub async fn merge(&self, payloads: &SourcePayloads) -> MergeOutcome {
        let mode = self.effective_mode();
        let sources: Vec<SourceMetadata> = self
            .config
            .source_selection
            .sources
            .iter()
            .map(|d| SourceMetadata::from_descriptor(d, self.primary_path(d), self.timestamp.clone()))
            .collect();

        let span = info_span!("merge", mode = ?mode, sources = sources.len());
        let (payload, source_counts) = async {
            match mode {
                MergeMode::Single => self.merge_single(payloads, &sources).await,
                MergeMode::Combined => self.merge_combined(payloads, &sources).await,
                MergeMode::Separate => self.merge_separate(payloads, &sources).await,
            }
        }
        .instrument(span)
        .await;

        MergeOutcome {
            mode,
            payload,
            source_counts,
            sources,
        }
    }

    async fn merge_single(&self, payloads: &SourcePayloads, sources: &[SourceMetadata]) -> (Value, Vec<SourceCount>) {
        let Some((descriptor, meta)) = self.descriptors().zip(sources).next() else {
            return (Value::Array(Vec::new()), Vec::new());
        };

        let resolver = MappingResolver::new(self.config);
        let extracted = self.source_items(descriptor, meta, payloads).await;
        let mapped: Vec<Value> = extracted.items.iter().map(|item| resolver.map_record(item, meta)).collect();
        let counts = vec![count_for(meta, mapped.len())];

        let payload = self.after_mapping(shape(mapped, extracted.lone)).await;
        (payload, counts)
    }

    async fn merge_combined(&self, payloads: &SourcePayloads, sources: &[SourceMetadata]) -> (Value, Vec<SourceCount>) {
        let resolver = MappingResolver::new(self.config);
        let mut pool = Vec::new();
        let mut counts = Vec::with_capacity(sources.len());

        for (index, (descriptor, meta)) in self.descriptors().zip(sources).enumerate() {
            let extracted = self.source_items(descriptor, meta, payloads).await;
            counts.push(count_for(meta, extracted.items.len()));
            pool.extend(extracted.items.iter().map(|item| TaggedItem {
                source: index,
                item: resolver.map_record(item, meta),
            }));
        }

        let selection = &self.config.source_selection;
        let ordered = match selection.merge_strategy {
            MergeStrategy::Sequential | MergeStrategy::Priority => pool,
            MergeStrategy::Interleaved => interleave(pool, sources.len()),
            MergeStrategy::Chronological => newest_first(pool, selection.date_field.as_deref()),
        };
        debug!(items = ordered.len(), strategy = ?selection.merge_strategy, "Combined source items");

        let merged = Value::Array(ordered.into_iter().map(|tagged| tagged.item).collect());
        (self.after_mapping(merged).await, counts)
    }

    async fn merge_separate(&self, payloads: &SourcePayloads, sources: &[SourceMetadata]) -> (Value, Vec<SourceCount>) {
        let resolver = MappingResolver::new(self.config).excluding_sourceless();
        let mut result = Map::new();
        let mut counts = Vec::with_capacity(sources.len());

        for (descriptor, meta) in self.descriptors().zip(sources) {
            let extracted = self.source_items(descriptor, meta, payloads).await;
            let mapped: Vec<Value> = extracted.items.iter().map(|item| resolver.map_record(item, meta)).collect();
            counts.push(count_for(meta, mapped.len()));

            let sub_result = self.after_mapping(shape(mapped, extracted.lone)).await;
            let key = if result.contains_key(&meta.name) {
                debug!(source = %meta.id, name = %meta.name, "Duplicate source name, keying by id");
                meta.id.clone()
            } else {
                meta.name.clone()
            };
            result.insert(key, sub_result);
        }

        (Value::Object(result), counts)
    }

    fn descriptors(&self) -> impl Iterator<Item = &'a SourceDescriptor> {
        self.config.source_selection.sources.iter()
    }

    /// Source-level primary path, else the selection-level one
    fn primary_path(&self, descriptor: &SourceDescriptor) -> Option<String> {
        let non_blank = |p: &Option<String>| p.clone().filter(|p| !p.trim().is_empty());
        non_blank(&descriptor.primary_path).or_else(|| non_blank(&self.config.source_selection.primary_path))
    }

    async fn source_items(
        &self,
        descriptor: &SourceDescriptor,
        meta: &SourceMetadata,
        payloads: &SourcePayloads,
    ) -> SourceItems {
        let Some(payload) = payloads.get(&descriptor.id) else {
            debug!(source = %descriptor.id, "No data for source");
            return SourceItems::default();
        };

        let mut located = match meta.path.as_deref() {
            Some(primary) => path::get(payload, primary),
            None => payload.clone(),
        };

        if self.config.pipeline_stage == PipelineStage::Before && !self.pipeline.is_empty() {
            located = self.pipeline.run(located).await;
        }

        match located {
            Value::Array(items) => SourceItems { items, lone: false },
            Value::Null => {
                debug!(source = %descriptor.id, path = ?meta.path, "Primary path resolved to nothing");
                SourceItems::default()
            }
            other => SourceItems {
                items: vec![other],
                lone: true,
            },
        }
    }

    async fn after_mapping(&self, payload: Value) -> Value {
        if self.config.pipeline_stage == PipelineStage::After && !self.pipeline.is_empty() {
            self.pipeline.run(payload).await
        } else {
            payload
        }
    }
}

/// Merge mode for a configuration, following the source count
pub fn effective_mode(config: &MappingConfig) -> MergeMode {
    let selection = &config.source_selection;
    match (selection.merge_mode, selection.sources.len()) {
        (Some(MergeMode::Separate), _) => MergeMode::Separate,
        (Some(MergeMode::Combined), n) if n > 1 => MergeMode::Combined,
        (_, n) if n <= 1 => MergeMode::Single,
        _ => MergeMode::Separate,
    }
}

fn count_for(meta: &SourceMetadata, count: usize) -> SourceCount {
    SourceCount {
        id: meta.id.clone(),
        name: meta.name.clone(),
        count,
    }
}

fn shape(mut mapped: Vec<Value>, lone: bool) -> Value {
    if lone && mapped.len() == 1 {
        mapped.remove(0)
    } else {
        Value::Array(mapped)
    }
}

/// Round-robin across sources in configured order until all are exhausted
fn interleave(pool: Vec<TaggedItem>, source_count: usize) -> Vec<TaggedItem> {
    let total = pool.len();
    let mut buckets: Vec<std::collections::VecDeque<TaggedItem>> =
        (0..source_count).map(|_| Default::default()).collect();
    for tagged in pool {
        buckets[tagged.source].push_back(tagged);
    }

    let mut ordered = Vec::with_capacity(total);
    while ordered.len() < total {
        for bucket in buckets.iter_mut() {
            if let Some(tagged) = bucket.pop_front() {
                ordered.push(tagged);
            }
        }
    }
    ordered
}

/// Stable sort, newest first; items without a parsable date go last
fn newest_first(pool: Vec<TaggedItem>, date_field: Option<&str>) -> Vec<TaggedItem> {
    let mut keyed: Vec<(Option<DateTime<Utc>>, TaggedItem)> = pool
        .into_iter()
        .map(|tagged| (item_date(&tagged.item, date_field), tagged))
        .collect();
    keyed.sort_by(|(a, _), (b, _)| b.cmp(a));
    keyed.into_iter().map(|(_, tagged)| tagged).collect()
}

fn item_date(item: &Value, date_field: Option<&str>) -> Option<DateTime<Utc>> {
    match date_field {
        Some(field) => parse_date(&path::get(item, field)),
        None => DEFAULT_DATE_FIELDS
            .iter()
            .map(|field| path::get(item, field))
            .find(|v| !v.is_null())
            .and_then(|v| parse_date(&v)),
    }
}

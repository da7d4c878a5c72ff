//! Tread - retrieval and ranking core for shoe-catalog image search
//!
//! Tread stores image embeddings with metadata and answers text, image,
//! hybrid, semantic, metadata and recommendation queries over them.
//!
//! # Quick Start
//!
//! ```ignore
//! use std::sync::Arc;
//! use tread::{SearchRequest, TreadConfig};
//!
//! let config = TreadConfig::from_file("tread.toml".as_ref())?;
//! let tread = tread::open(&config, Arc::new(MyClipEmbedder::load()?))?;
//!
//! tread.index().add(vectors, metadata, None)?;
//! let response = tread.search_natural("red nike running shoes")?;
//! ```
//!
//! # Architecture
//!
//! [`open`] is the composition root: it builds the [`VectorIndex`] from the
//! `[index]` section, wires it with the caller's [`Embedder`] into a
//! [`SearchOrchestrator`], and connects the analytics channel. Nothing is
//! registered globally; every collaborator is passed in explicitly.

use std::sync::Arc;

use tracing::info;

pub use tread_core::{
    BackendKind, Candidate, CategoryRegistry, DistanceMetric, FilterValue, FusionWeights,
    IndexConfig, JsonScalar, Metadata, MetadataFilter, Modality, QueryIntent, QueryType,
    RankedResult, SearchConfig, SearchMode, SearchRequest, SearchResponse, TreadConfig,
    TreadError, TreadResult, VectorConfig, VectorRecord,
};
pub use tread_engine::{
    FileSidecar, IndexBackend, IndexStats, LocalCollection, ManagedCollection, ManagedError,
    ManagedHit, Sidecar, VectorIndex,
};
pub use tread_intelligence::{
    AnalyticsEvent, AnalyticsReceiver, AnalyticsSummary, EmbedError, Embedder, FusedResult,
    Fuser, QueryExpander, QueryIntentExtractor, SearchOrchestrator, SynonymExpander,
    WeightedFuser,
};

/// An opened collection with its orchestrator and analytics stream
#[derive(Debug)]
pub struct Tread {
    orchestrator: SearchOrchestrator,
    analytics: AnalyticsReceiver,
}

/// Open the collection described by `config` with a local backend
///
/// Loads the persisted snapshot when `index.data_dir` is set.
///
/// # Errors
///
/// - `Config` for an invalid configuration or `backend = "managed"`
///   (use [`open_with_client`])
/// - `DimensionMismatch` when the embedder does not fit `index.dimension`
/// - snapshot errors from [`VectorIndex::open`]
pub fn open(config: &TreadConfig, embedder: Arc<dyn Embedder>) -> TreadResult<Tread> {
    config.validate()?;
    let index = VectorIndex::from_config(&config.index)?;
    Tread::assemble(index, embedder, config)
}

/// Open the collection with the managed backend over `client`
pub fn open_with_client(
    config: &TreadConfig,
    embedder: Arc<dyn Embedder>,
    client: Arc<dyn ManagedCollection>,
) -> TreadResult<Tread> {
    config.validate()?;
    let backend = IndexBackend::managed(client, config.index.metric);
    let vector_config = config.index.vector_config()?;
    let index = match config.index.snapshot_path() {
        Some(path) => VectorIndex::open(
            &config.index.collection,
            vector_config,
            backend,
            Arc::new(FileSidecar::new(path)),
        )?,
        None => VectorIndex::new(&config.index.collection, vector_config, backend)?,
    };
    Tread::assemble(index, embedder, config)
}

impl Tread {
    fn assemble(
        index: VectorIndex,
        embedder: Arc<dyn Embedder>,
        config: &TreadConfig,
    ) -> TreadResult<Self> {
        let (sink, analytics) =
            tread_intelligence::analytics_channel(config.search.analytics_capacity);
        let orchestrator = SearchOrchestrator::new(Arc::new(index), embedder, config)?
            .with_analytics(sink);
        let stats = orchestrator.stats();
        info!(
            target: "tread::search",
            collection = %stats.collection,
            backend = stats.backend.name(),
            live = stats.live_vectors,
            "Opened collection"
        );
        Ok(Tread {
            orchestrator,
            analytics,
        })
    }

    pub fn index(&self) -> &Arc<VectorIndex> {
        self.orchestrator.index()
    }

    pub fn orchestrator(&self) -> &SearchOrchestrator {
        &self.orchestrator
    }

    pub fn search(&self, req: &SearchRequest) -> TreadResult<SearchResponse> {
        self.orchestrator.search(req)
    }

    pub fn search_natural(&self, text: &str) -> TreadResult<SearchResponse> {
        self.orchestrator.search_natural(text)
    }

    pub fn stats(&self) -> IndexStats {
        self.orchestrator.stats()
    }

    /// Drain queued analytics events into a summary
    pub fn search_stats(&self) -> AnalyticsSummary {
        AnalyticsSummary::from_events(&self.analytics.drain())
    }

    pub fn analytics(&self) -> &AnalyticsReceiver {
        &self.analytics
    }
}

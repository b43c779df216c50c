use std::collections::{BTreeMap, HashMap, VecDeque};
use std::path::PathBuf;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::event::{CostEvent, CostRecord, Stage};
use super::pricing::PricingTable;
use super::queue::{DropPolicy, TelemetryQueue};
use super::store::{CostStore, JsonlCostStore, MemoryCostStore};

/// Telemetry pipeline settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetryConfig {
    pub queue_capacity: usize,
    pub drop_policy: DropPolicy,
    /// JSON-lines file to append priced records to; in-memory when unset
    pub store_path: Option<PathBuf>,
    #[serde(default)]
    pub pricing: PricingTable,
    /// Sessions whose totals are kept; the oldest is forgotten beyond this
    #[serde(default = "default_max_sessions")]
    pub max_sessions: usize,
}

fn default_max_sessions() -> usize {
    1000
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 1024,
            drop_policy: DropPolicy::DropOldest,
            store_path: None,
            pricing: PricingTable::default(),
            max_sessions: default_max_sessions(),
        }
    }
}

/// Running totals for one stage.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StageTotals {
    pub events: u64,
    pub duration_ms: u64,
    pub characters: u64,
    pub audio_seconds: f64,
    pub cost_usd: f64,
}

impl StageTotals {
    fn add(&mut self, record: &CostRecord) {
        self.events += 1;
        self.duration_ms += record.event.duration_ms;
        self.characters += record.event.characters + record.event.output_characters;
        self.audio_seconds += record.event.audio_seconds;
        self.cost_usd += record.cost_usd;
    }
}

/// Totals for one session.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionCost {
    pub turns: u64,
    pub cost_usd: f64,
    pub stages: BTreeMap<Stage, StageTotals>,
}

/// Snapshot served by the summary endpoint.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TelemetrySummary {
    pub stages: BTreeMap<Stage, StageTotals>,
    /// Sessions currently tracked, at most `max_sessions`.
    pub sessions: usize,
    pub sessions_evicted: u64,
    pub total_cost_usd: f64,
    pub events_recorded: u64,
    pub events_dropped: u64,
    pub events_pending: usize,
}

struct Aggregates {
    stages: BTreeMap<Stage, StageTotals>,
    sessions: HashMap<String, SessionCost>,
    /// Session ids in first-seen order.
    session_order: VecDeque<String>,
    max_sessions: usize,
    evicted: u64,
    recorded: u64,
    total_cost_usd: f64,
}

impl Aggregates {
    fn new(max_sessions: usize) -> Self {
        Self {
            stages: BTreeMap::new(),
            sessions: HashMap::new(),
            session_order: VecDeque::new(),
            max_sessions: max_sessions.max(1),
            evicted: 0,
            recorded: 0,
            total_cost_usd: 0.0,
        }
    }

    fn track_session(&mut self, session_id: &str) {
        if self.sessions.contains_key(session_id) {
            return;
        }
        while self.sessions.len() >= self.max_sessions {
            let Some(oldest) = self.session_order.pop_front() else {
                break;
            };
            self.sessions.remove(&oldest);
            self.evicted += 1;
            debug!(session_id = %oldest, "Evicted session cost totals");
        }
        self.session_order.push_back(session_id.to_string());
        self.sessions
            .insert(session_id.to_string(), SessionCost::default());
    }

    fn add(&mut self, record: &CostRecord) {
        self.recorded += 1;
        self.total_cost_usd += record.cost_usd;
        self.stages
            .entry(record.event.stage)
            .or_default()
            .add(record);

        self.track_session(&record.event.session_id);
        let session = self
            .sessions
            .entry(record.event.session_id.clone())
            .or_default();
        session.turns = session.turns.max(record.event.turn);
        session.cost_usd += record.cost_usd;
        session
            .stages
            .entry(record.event.stage)
            .or_default()
            .add(record);
    }
}

/// Write-only handle the voice path records cost events through.
///
/// Cloning is cheap; all clones feed the same queue and the same consumer.
#[derive(Clone)]
pub struct TelemetrySink {
    queue: Arc<TelemetryQueue>,
    aggregates: Arc<RwLock<Aggregates>>,
}

impl TelemetrySink {
    /// Build the configured store and spawn the consumer task.
    pub fn from_config(config: &TelemetryConfig) -> (Self, JoinHandle<()>) {
        let store: Arc<dyn CostStore> = match &config.store_path {
            Some(path) => Arc::new(JsonlCostStore::new(path)),
            None => Arc::new(MemoryCostStore::new()),
        };
        Self::start(config, store)
    }

    /// Spawn the single consumer that prices, aggregates and persists events.
    pub fn start(config: &TelemetryConfig, store: Arc<dyn CostStore>) -> (Self, JoinHandle<()>) {
        let queue = Arc::new(TelemetryQueue::new(
            config.queue_capacity,
            config.drop_policy,
        ));
        let aggregates = Arc::new(RwLock::new(Aggregates::new(config.max_sessions)));

        info!(
            "Starting telemetry consumer (store: {}, capacity: {}, policy: {})",
            store.name(),
            queue.capacity(),
            queue.policy().as_str()
        );

        let consumer = tokio::spawn(run_consumer(
            queue.clone(),
            aggregates.clone(),
            config.pricing.clone(),
            store,
        ));

        (Self { queue, aggregates }, consumer)
    }

    /// Enqueue an event without waiting. Overflow is dropped silently.
    pub fn record(&self, event: CostEvent) {
        if !self.queue.push(event) {
            debug!(
                "Telemetry queue full or closed, dropped {} events so far",
                self.queue.dropped()
            );
        }
    }

    pub fn summary(&self) -> TelemetrySummary {
        let aggregates = self.aggregates.read();
        TelemetrySummary {
            stages: aggregates.stages.clone(),
            sessions: aggregates.sessions.len(),
            sessions_evicted: aggregates.evicted,
            total_cost_usd: aggregates.total_cost_usd,
            events_recorded: aggregates.recorded,
            events_dropped: self.queue.dropped(),
            events_pending: self.queue.len(),
        }
    }

    pub fn session_summary(&self, session_id: &str) -> Option<SessionCost> {
        self.aggregates.read().sessions.get(session_id).cloned()
    }

    /// Close the queue; the consumer drains what is left and exits.
    pub fn shutdown(&self) {
        self.queue.close();
    }
}

async fn run_consumer(
    queue: Arc<TelemetryQueue>,
    aggregates: Arc<RwLock<Aggregates>>,
    pricing: PricingTable,
    store: Arc<dyn CostStore>,
) {
    while let Some(event) = queue.pop().await {
        let cost_usd = pricing.price(&event);
        let record = CostRecord { event, cost_usd };

        aggregates.write().add(&record);

        if let Err(e) = store.persist(&record).await {
            warn!(
                session_id = %record.event.session_id,
                stage = %record.event.stage,
                "Failed to persist cost record: {}",
                e
            );
        }
    }

    debug!("Telemetry consumer stopped");
}

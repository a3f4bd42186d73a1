//! Calculation context
//!
//! Everything a calculation reads: configuration, sites, source models,
//! logic tree definitions and the GSIM registry, plus the event bus and the
//! cancellation token shared with whoever started the calculation.

use crate::gsim::GsimRegistry;
use crate::logictree::LogicTreeDefinition;
use crate::source::SourceModel;
use chrono::{DateTime, Utc};
use hazard_common::config::CalculationConfig;
use hazard_common::events::EventBus;
use hazard_common::site::SiteCollection;
use hazard_common::{Error, Result};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

#[derive(Clone)]
pub struct CalculationContext {
    pub calculation_id: Uuid,
    pub config: CalculationConfig,
    pub sites: Arc<SiteCollection>,
    /// Source models by name
    pub source_models: BTreeMap<String, SourceModel>,
    pub source_model_logic_tree: LogicTreeDefinition,
    pub gsim_logic_tree: LogicTreeDefinition,
    pub gsims: GsimRegistry,
    pub event_bus: EventBus,
    pub cancel_token: CancellationToken,
    pub started_at: DateTime<Utc>,
}

impl CalculationContext {
    pub fn new(
        config: CalculationConfig,
        sites: SiteCollection,
        source_models: Vec<SourceModel>,
        source_model_logic_tree: LogicTreeDefinition,
        gsim_logic_tree: LogicTreeDefinition,
        gsims: GsimRegistry,
    ) -> Result<Self> {
        if sites.is_empty() {
            return Err(Error::InvalidInput("site collection is empty".to_string()));
        }
        let mut by_name = BTreeMap::new();
        for model in source_models {
            let name = model.name.clone();
            if by_name.insert(name.clone(), model).is_some() {
                return Err(Error::config(format!("duplicate source model name {:?}", name)));
            }
        }

        Ok(Self {
            calculation_id: Uuid::new_v4(),
            config,
            sites: Arc::new(sites),
            source_models: by_name,
            source_model_logic_tree,
            gsim_logic_tree,
            gsims,
            event_bus: EventBus::default(),
            cancel_token: CancellationToken::new(),
            started_at: Utc::now(),
        })
    }

    pub fn with_event_bus(mut self, event_bus: EventBus) -> Self {
        self.event_bus = event_bus;
        self
    }

    pub fn with_cancel_token(mut self, cancel_token: CancellationToken) -> Self {
        self.cancel_token = cancel_token;
        self
    }

    /// Milliseconds since the context was created
    pub fn elapsed_ms(&self) -> u64 {
        (Utc::now() - self.started_at).num_milliseconds().max(0) as u64
    }
}

//! Array Client Adapters
//!
//! Provides implementations of [`ArrayClient`]:
//! - Memory: simulated array held in process memory
//! - Instrumented: tracing, metrics and cancellation around another client

pub mod instrumented;
pub mod memory;

pub use instrumented::{ClientMetrics, InstrumentedClient};
pub use memory::{MemoryArray, MemoryArrayConfig, RecordedCall};

use crate::config::ArrayConfig;
use crate::domain::ports::{ArrayClient, ArrayClientRef};
use crate::error::{Error, Result};
use prometheus::Registry;
use std::sync::Arc;
use tracing::info;

/// Factory for array clients
pub struct BackendFactory;

impl BackendFactory {
    /// Build the configured backend, instrumented and registered with `registry`
    pub fn create(config: &ArrayConfig, registry: &Registry) -> Result<ArrayClientRef> {
        let metrics = ClientMetrics::register(registry)?;
        match config.backend.to_lowercase().as_str() {
            "memory" | "simulator" => {
                info!(serial = %config.memory.serial, "using in-memory array");
                let array = Arc::new(MemoryArray::new(config.memory.clone()));
                Ok(Self::instrument(array, metrics))
            }
            other => Err(Error::Configuration(format!("unknown array backend: {other}"))),
        }
    }

    fn instrument<C: ArrayClient + 'static>(
        client: Arc<C>,
        metrics: ClientMetrics,
    ) -> ArrayClientRef {
        Arc::new(InstrumentedClient::new(client, metrics))
    }
}

//! Simulated execution engine

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{ExecutionEngine, OrderRequest, SubmitOutcome};

/// Paper engine: every submission succeeds instantly with a fresh order id.
/// Keeps a log of submitted orders for inspection.
#[derive(Default, Clone)]
pub struct PaperEngine {
    submitted: Arc<RwLock<Vec<OrderRequest>>>,
}

impl PaperEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn submitted(&self) -> Vec<OrderRequest> {
        self.submitted.read().await.clone()
    }
}

#[async_trait]
impl ExecutionEngine for PaperEngine {
    async fn submit(&self, order: &OrderRequest) -> SubmitOutcome {
        let order_id = format!("paper-{}", Uuid::new_v4());
        tracing::debug!(
            market = %order.market_slug,
            outcome = %order.outcome,
            notional = %order.notional,
            order_id = %order_id,
            "paper fill"
        );
        self.submitted.write().await.push(order.clone());
        SubmitOutcome::ok(order_id)
    }

    fn mode_name(&self) -> &'static str {
        "paper"
    }
}

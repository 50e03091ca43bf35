//! Mock payment gateway for testing.
//!
//! Scriptable implementation of `PaymentGateway` for unit and integration
//! tests. Supports per-charge scripted states, error injection per method,
//! and call tracking for assertions.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use crate::domain::foundation::{ChargeId, Money};
use crate::domain::payment::{GatewayKind, ProviderChargeState};
use crate::ports::{CreateChargeRequest, CreatedCharge, GatewayError, PaymentGateway};

/// Recorded method call for assertions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedCall {
    pub method: &'static str,
    pub charge_id: Option<String>,
}

#[derive(Default)]
struct MockState {
    /// Scripted charge states by charge id.
    charge_states: HashMap<String, ProviderChargeState>,

    /// Errors to return, keyed by method name. Consumed on use.
    method_errors: HashMap<&'static str, Vec<GatewayError>>,

    /// Every call made, in order.
    calls: Vec<RecordedCall>,

    /// Parents whose recurrence has been voided.
    stopped_recurrences: Vec<String>,

    /// Charges refunded (fully or partially).
    refunded: Vec<String>,
}

/// Scriptable gateway double.
#[derive(Clone, Default)]
pub struct MockGateway {
    kind: Option<GatewayKind>,
    state: Arc<Mutex<MockState>>,
    charge_counter: Arc<AtomicU64>,
}

impl MockGateway {
    pub fn new(kind: GatewayKind) -> Self {
        Self {
            kind: Some(kind),
            state: Arc::new(Mutex::new(MockState::default())),
            charge_counter: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Scripts the state the gateway reports for a charge.
    pub fn script_charge_state(&self, charge_id: &str, state: ProviderChargeState) {
        let mut inner = self.state.lock().unwrap();
        inner.charge_states.insert(charge_id.to_string(), state);
    }

    /// Queues an error for the next call to the named method. Multiple
    /// queued errors are consumed in order; once drained, calls succeed.
    pub fn queue_error(&self, method: &'static str, error: GatewayError) {
        let mut inner = self.state.lock().unwrap();
        inner.method_errors.entry(method).or_default().push(error);
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn recurrence_stopped(&self, charge_id: &str) -> bool {
        self.state
            .lock()
            .unwrap()
            .stopped_recurrences
            .iter()
            .any(|c| c == charge_id)
    }

    pub fn was_refunded(&self, charge_id: &str) -> bool {
        self.state
            .lock()
            .unwrap()
            .refunded
            .iter()
            .any(|c| c == charge_id)
    }

    fn record(&self, method: &'static str, charge_id: Option<&ChargeId>) {
        let mut inner = self.state.lock().unwrap();
        inner.calls.push(RecordedCall {
            method,
            charge_id: charge_id.map(|c| c.to_string()),
        });
    }

    fn take_error(&self, method: &'static str) -> Option<GatewayError> {
        let mut inner = self.state.lock().unwrap();
        let queue = inner.method_errors.get_mut(method)?;
        if queue.is_empty() {
            None
        } else {
            Some(queue.remove(0))
        }
    }
}

#[async_trait]
impl PaymentGateway for MockGateway {
    fn kind(&self) -> GatewayKind {
        self.kind.unwrap_or(GatewayKind::Card)
    }

    async fn create_charge(&self, _req: CreateChargeRequest) -> Result<CreatedCharge, GatewayError> {
        self.record("create_charge", None);
        if let Some(err) = self.take_error("create_charge") {
            return Err(err);
        }

        let n = self.charge_counter.fetch_add(1, Ordering::SeqCst) + 1;
        let id = format!("mock_ch_{}", n);
        {
            let mut inner = self.state.lock().unwrap();
            inner
                .charge_states
                .insert(id.clone(), ProviderChargeState::Created);
        }

        Ok(CreatedCharge {
            charge_id: ChargeId::new(id.clone()).map_err(|e| GatewayError::Rejected(e.to_string()))?,
            redirect_url: format!("https://gateway.test/pay/{}", id),
            state: ProviderChargeState::Created,
        })
    }

    async fn charge_status(
        &self,
        charge_id: &ChargeId,
    ) -> Result<ProviderChargeState, GatewayError> {
        self.record("charge_status", Some(charge_id));
        if let Some(err) = self.take_error("charge_status") {
            return Err(err);
        }

        let inner = self.state.lock().unwrap();
        inner
            .charge_states
            .get(charge_id.as_str())
            .copied()
            .ok_or_else(|| GatewayError::ResourceMissing(format!("no charge {}", charge_id)))
    }

    async fn refund_charge(
        &self,
        charge_id: &ChargeId,
        _amount: Option<Money>,
    ) -> Result<(), GatewayError> {
        self.record("refund_charge", Some(charge_id));
        if let Some(err) = self.take_error("refund_charge") {
            return Err(err);
        }

        let mut inner = self.state.lock().unwrap();
        if !inner.charge_states.contains_key(charge_id.as_str()) {
            return Err(GatewayError::ResourceMissing(format!(
                "no charge {}",
                charge_id
            )));
        }
        inner
            .charge_states
            .insert(charge_id.to_string(), ProviderChargeState::Refunded);
        inner.refunded.push(charge_id.to_string());
        Ok(())
    }

    async fn cancel_recurrence(&self, parent_charge_id: &ChargeId) -> Result<(), GatewayError> {
        self.record("cancel_recurrence", Some(parent_charge_id));
        if let Some(err) = self.take_error("cancel_recurrence") {
            return Err(err);
        }

        let mut inner = self.state.lock().unwrap();
        inner.stopped_recurrences.push(parent_charge_id.to_string());
        Ok(())
    }
}

//! Service layer API for the production workflow
//!
//! Every write re-reads the order inside a sled transaction, validates it against the
//! status graph there, and stores all affected records together. A caller acting on a
//! stale view gets [`FlowError::Conflict`] instead of overwriting someone else's step.
use super::access::{Actor, User};
use super::batch::BatchNumber;
use super::config::FlowConfig;
use super::engine::{self, Transition};
use super::error::{FlowError, ValidationError};
use super::log::FieldChange;
use super::order::{Order, OrderDraft, TimeStamp};
use super::split::{self, Produced, SplitOutcome};
use super::status::{Role, Status};
use super::utils;
use chrono::{FixedOffset, Utc};
use sled::transaction::{ConflictableTransactionError, abort};
use sled::{Batch, Db, Tree};
use std::sync::Arc;
use tracing::{debug, info, warn};

pub const ORDERS_TREE: &str = "orders";

pub struct OrderService {
    instance: Arc<Db>,
    orders: Tree,
    config: FlowConfig,
    offset: FixedOffset,
}

// Records a commit writes back.
trait Records {
    fn records(&self) -> Vec<&Order>;
}

impl Records for Order {
    fn records(&self) -> Vec<&Order> {
        vec![self]
    }
}

impl Records for SplitOutcome {
    fn records(&self) -> Vec<&Order> {
        let mut records = vec![&self.original];
        records.extend(self.remainder.as_ref());
        records
    }
}

impl OrderService {
    /// Service with the default plant configuration.
    pub fn new(instance: Arc<Db>) -> Result<Self, FlowError> {
        Self::with_config(instance, FlowConfig::default())
    }

    /// Opens the `orders` tree and resolves the plant clock offset.
    pub fn with_config(instance: Arc<Db>, config: FlowConfig) -> Result<Self, FlowError> {
        let offset = config
            .plant_offset()
            .map_err(|e| FlowError::Config(e.to_string()))?;
        let orders = instance.open_tree(ORDERS_TREE)?;

        Ok(Self {
            instance,
            orders,
            config,
            offset,
        })
    }

    /// Configuration the service was opened with.
    pub fn config(&self) -> &FlowConfig {
        &self.config
    }

    /// Sales intake: validates the draft, assigns a new id and stores the order
    /// in the PCP queue with its two seed log entries.
    pub fn create_order(&self, draft: OrderDraft, creator: &User) -> Result<Order, FlowError> {
        let order = Order::create(draft, utils::new_order_id()?, creator, TimeStamp::new())?;

        // new id, nothing to re-validate
        let mut batch = Batch::default();
        batch.insert(order.id().as_bytes(), order.to_cbor()?);
        self.orders.apply_batch(batch)?;

        info!(
            order_id = order.id(),
            customer = order.customer_name(),
            total = order.total_value(),
            "order created"
        );
        Ok(order)
    }

    /// Current committed version of an order.
    pub fn get_order(&self, order_id: &str) -> Result<Order, FlowError> {
        let raw = self
            .orders
            .get(order_id.as_bytes())?
            .ok_or_else(|| FlowError::NotFound(order_id.to_string()))?;
        Order::from_cbor(&raw)
    }

    /// Generic status change, see [`engine::advance`].
    pub fn advance_order(
        &self,
        order_id: &str,
        transition: Transition,
        actor: &Actor<'_>,
    ) -> Result<Order, FlowError> {
        let at = TimeStamp::new();
        let result = self.commit(order_id, |current| {
            engine::advance(current, &transition, actor, at.clone())
        });

        match &result {
            Ok(order) => info!(
                order_id,
                to = %order.status(),
                user = actor.user.id.as_str(),
                role = %actor.effective_role(),
                "order advanced"
            ),
            Err(err) => warn!(order_id, to = %transition.to, %err, "advance refused"),
        }
        result
    }

    /// Batch number PCP would get if it confirmed right now.
    pub fn next_batch_number(&self) -> BatchNumber {
        let now = Utc::now().with_timezone(&self.offset);
        BatchNumber::generate(&self.config.batch_prefix, &now)
    }

    /// PCP converts the sales order into a production order under `batch`,
    /// or a freshly generated one.
    pub fn release_to_production(
        &self,
        order_id: &str,
        batch: Option<BatchNumber>,
        actor: &Actor<'_>,
    ) -> Result<Order, FlowError> {
        let batch = batch.unwrap_or_else(|| self.next_batch_number());
        let transition = Transition::to(Status::EmProducao)
            .expecting(Status::AnalisePcp)
            .with_note(format!("Lote gerado: {batch} - Enviado para Produção"))
            .with_field(FieldChange::BatchNumber(batch.into_string()));

        self.advance_order(order_id, transition, actor)
    }

    /// Production reports what it made. A short delivery needs `confirm_partial`
    /// and splits the order; a full one is a plain advance to quality.
    pub fn record_production(
        &self,
        order_id: &str,
        produced: &[Produced],
        confirm_partial: bool,
        actor: &Actor<'_>,
    ) -> Result<SplitOutcome, FlowError> {
        let at = TimeStamp::new();
        let remainder_id = utils::new_order_id()?;
        let suffix = self.config.remainder_suffix.as_str();

        let result = self.commit(order_id, |current| {
            if split::is_partial(current, produced)? && !confirm_partial {
                return Err(ValidationError::PartialNotConfirmed.into());
            }
            split::split(
                current,
                produced,
                actor,
                at.clone(),
                remainder_id.clone(),
                suffix,
            )
        });

        match &result {
            Ok(SplitOutcome {
                remainder: Some(remainder),
                ..
            }) => info!(
                order_id,
                remainder_id = remainder.id(),
                "partial delivery, remainder back in production"
            ),
            Ok(_) => info!(order_id, "production complete"),
            Err(err) => warn!(order_id, %err, "production report refused"),
        }
        result
    }

    /// Confirmed partial delivery.
    pub fn split_order(
        &self,
        order_id: &str,
        produced: &[Produced],
        actor: &Actor<'_>,
    ) -> Result<SplitOutcome, FlowError> {
        self.record_production(order_id, produced, true, actor)
    }

    /// Quality hold, the order goes to `REPROVADO`.
    pub fn reject_order(
        &self,
        order_id: &str,
        reason: &str,
        actor: &Actor<'_>,
    ) -> Result<Order, FlowError> {
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(ValidationError::MissingReason(Status::Reprovado).into());
        }
        let transition = Transition::to(Status::Reprovado)
            .expecting(Status::QualidadePendente)
            .with_note(format!("BLOQUEADO PELA QUALIDADE: {reason}"));

        self.advance_order(order_id, transition, actor)
    }

    /// Releases a held order back into production, never to its prior status.
    pub fn unblock_order(&self, order_id: &str, actor: &Actor<'_>) -> Result<Order, FlowError> {
        let transition = Transition::to(Status::EmProducao).expecting(Status::Reprovado);
        self.advance_order(order_id, transition, actor)
    }

    /// Montagem hands the order to packing, with an optional observation.
    pub fn finish_assembly(
        &self,
        order_id: &str,
        observation: Option<&str>,
        actor: &Actor<'_>,
    ) -> Result<Order, FlowError> {
        let observation = observation
            .map(str::trim)
            .filter(|o| !o.is_empty())
            .unwrap_or("Sem observações.");
        let transition = Transition::to(Status::EmEmbalagem)
            .expecting(Status::EmMontagem)
            .with_note(format!("Montagem Finalizada. Obs: {observation}"));

        self.advance_order(order_id, transition, actor)
    }

    /// Montagem sends the order back to quality, the observation is mandatory.
    pub fn return_to_quality(
        &self,
        order_id: &str,
        observation: &str,
        actor: &Actor<'_>,
    ) -> Result<Order, FlowError> {
        let observation = observation.trim();
        if observation.is_empty() {
            return Err(ValidationError::MissingReason(Status::QualidadePendente).into());
        }
        let transition = Transition::to(Status::QualidadePendente)
            .expecting(Status::EmMontagem)
            .with_note(format!("DEVOLVIDO DA MONTAGEM: {observation}"));

        self.advance_order(order_id, transition, actor)
    }

    /// Billing attaches the invoice and hands the order to transport.
    pub fn issue_invoice(
        &self,
        order_id: &str,
        invoice_number: &str,
        actor: &Actor<'_>,
    ) -> Result<Order, FlowError> {
        let invoice_number = invoice_number.trim();
        if invoice_number.is_empty() {
            return Err(ValidationError::MissingInvoiceNumber.into());
        }
        let transition = Transition::to(Status::EmTransporte)
            .expecting(Status::EmFaturamento)
            .with_note(format!("Nota Fiscal emitida: {invoice_number}"))
            .with_field(FieldChange::InvoiceNumber(invoice_number.to_string()));

        self.advance_order(order_id, transition, actor)
    }

    /// Every order, newest first.
    pub fn all_orders(&self) -> Result<Vec<Order>, FlowError> {
        let mut orders = self
            .orders
            .iter()
            .values()
            .map(|raw| Order::from_cbor(&raw?))
            .collect::<Result<Vec<_>, _>>()?;
        orders.sort_by(|a, b| b.created_at().cmp(a.created_at()));
        Ok(orders)
    }

    /// Orders in any of `statuses`, newest first.
    pub fn list_by_status(&self, statuses: &[Status]) -> Result<Vec<Order>, FlowError> {
        let orders: Vec<Order> = self
            .all_orders()?
            .into_iter()
            .filter(|o| statuses.contains(&o.status()))
            .collect();
        debug!(?statuses, found = orders.len(), "orders by status");
        Ok(orders)
    }

    /// Free-text match on customer name or order id.
    pub fn search(&self, term: &str) -> Result<Vec<Order>, FlowError> {
        let orders: Vec<Order> = self
            .all_orders()?
            .into_iter()
            .filter(|o| o.matches(term))
            .collect();
        debug!(term, found = orders.len(), "order search");
        Ok(orders)
    }

    /// What a department sees: the statuses it owns, optionally narrowed by search.
    pub fn department_queue(&self, role: Role, term: Option<&str>) -> Result<Vec<Order>, FlowError> {
        let queue = self.list_by_status(&role.owned_statuses())?;
        Ok(match term {
            Some(term) => queue.into_iter().filter(|o| o.matches(term)).collect(),
            None => queue,
        })
    }

    /// Live feed of committed order changes.
    pub fn watch(&self) -> sled::Subscriber {
        self.orders.watch_prefix(b"")
    }

    /// The order carried by a watch event, `None` for removals.
    pub fn decode_event(event: &sled::Event) -> Result<Option<Order>, FlowError> {
        match event {
            sled::Event::Insert { value, .. } => Ok(Some(Order::from_cbor(value)?)),
            sled::Event::Remove { .. } => Ok(None),
        }
    }

    /// Flushes pending writes to disk.
    pub fn flush(&self) -> Result<(), FlowError> {
        self.instance.flush()?;
        Ok(())
    }

    // Reads, validates and writes inside one transaction; sled re-runs `apply`
    // on a concurrent write so validation always sees the committed state.
    fn commit<T, F>(&self, order_id: &str, apply: F) -> Result<T, FlowError>
    where
        T: Records,
        F: Fn(&Order) -> Result<T, FlowError>,
    {
        let outcome = self.orders.transaction(|tx| {
            // validation runs on the committed record
            let Some(raw) = tx.get(order_id.as_bytes())? else {
                return abort(FlowError::NotFound(order_id.to_string()));
            };
            let current = Order::from_cbor(&raw).map_err(ConflictableTransactionError::Abort)?;
            let outcome = apply(&current).map_err(ConflictableTransactionError::Abort)?;

            // original and remainder land together or not at all
            for record in outcome.records() {
                let cbor = record.to_cbor().map_err(ConflictableTransactionError::Abort)?;
                tx.insert(record.id().as_bytes(), cbor)?;
            }
            Ok(outcome)
        })?;

        Ok(outcome)
    }
}

//! Partial delivery: keep the produced quantities on the original order and move
//! the rest to a new backlog order that goes straight back to production.
use crate::access::Actor;
use crate::engine::{self, Transition};
use crate::error::{FlowError, ValidationError};
use crate::log::{FieldChange, LogEntry, NOTE_FULL_PRODUCTION, NOTE_PARTIAL, NOTE_REMAINDER};
use crate::order::{LineItem, Order, TimeStamp};
use crate::status::Status;
use chrono::Utc;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Produced {
    pub product_id: String,
    pub quantity: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitOutcome {
    pub original: Order,
    pub remainder: Option<Order>,
}

impl Produced {
    pub fn new(product_id: &str, quantity: u32) -> Self {
        Self {
            product_id: product_id.to_string(),
            quantity,
        }
    }
}

/// Produced quantity per line, missing lines count as zero.
pub fn produced_per_line(order: &Order, produced: &[Produced]) -> Result<Vec<u32>, FlowError> {
    if let Some(unknown) = produced.iter().find(|p| order.item(&p.product_id).is_none()) {
        return Err(ValidationError::UnknownProduct(unknown.product_id.clone()).into());
    }

    order
        .items
        .iter()
        .map(|item| {
            let quantity = produced
                .iter()
                .find(|p| p.product_id == item.product_id)
                .map_or(0, |p| p.quantity);
            if quantity > item.quantity {
                return Err(ValidationError::ProducedOutOfRange {
                    product_id: item.product_id.clone(),
                    produced: quantity,
                    requested: item.quantity,
                }
                .into());
            }
            Ok(quantity)
        })
        .collect()
}

pub fn is_partial(order: &Order, produced: &[Produced]) -> Result<bool, FlowError> {
    let per_line = produced_per_line(order, produced)?;
    Ok(order
        .items
        .iter()
        .zip(per_line)
        .any(|(item, made)| made < item.quantity))
}

/// Splits `order` by produced quantity.
///
/// The original keeps its id and recorded total and moves to `QUALIDADE_PENDENTE`.
/// When something is left over a remainder order is built under `remainder_id` in
/// `EM_PRODUCAO`, carrying the original history plus its own seed entry.
pub fn split(
    order: &Order,
    produced: &[Produced],
    actor: &Actor<'_>,
    at: TimeStamp<Utc>,
    remainder_id: String,
    remainder_suffix: &str,
) -> Result<SplitOutcome, FlowError> {
    let per_line = produced_per_line(order, produced)?;

    let mut made = order.clone();
    let mut leftover = Vec::new();
    for (item, quantity) in made.items.iter_mut().zip(per_line) {
        let remaining = item.quantity - quantity;
        if remaining > 0 {
            leftover.push(LineItem {
                quantity: remaining,
                quantity_produced: None,
                ..item.clone()
            });
        }
        item.quantity = quantity;
        item.quantity_produced = Some(quantity);
    }

    let mut transition = Transition::to(Status::QualidadePendente).expecting(Status::EmProducao);
    if leftover.is_empty() {
        transition = transition.with_note(NOTE_FULL_PRODUCTION);
    } else {
        transition = transition
            .with_note(NOTE_PARTIAL)
            .with_field(FieldChange::RemainderOrder(remainder_id.clone()));
    }
    let original = engine::advance_with_lineage(&made, &transition, actor, at.clone())?;

    if leftover.is_empty() {
        return Ok(SplitOutcome {
            original,
            remainder: None,
        });
    }

    let total_value = leftover
        .iter()
        .try_fold(0u64, |acc, item| item.line_value().and_then(|v| acc.checked_add(v)))
        .ok_or(ValidationError::ValueOverflow)?;

    let seed = LogEntry::new(
        Status::EmProducao,
        at,
        actor.user,
        Some(NOTE_REMAINDER.to_string()),
    )
    .with_fields(vec![FieldChange::SplitFrom(order.id.clone())]);

    let remainder = Order {
        id: remainder_id,
        external_ref: Some(format!(
            "{}{}",
            order.external_ref.as_deref().unwrap_or(&order.id),
            remainder_suffix
        )),
        items: leftover,
        status: Status::EmProducao,
        total_value,
        invoice_number: None,
        log: order.log.prepend(seed)?,
        ..order.clone()
    };

    Ok(SplitOutcome {
        original,
        remainder: Some(remainder),
    })
}

//! Validates and applies a single status change to one order
//!
//! [`advance`] is pure: it reads an order and returns the next version of it, or an
//! error with the input untouched. Committing the result is the service's job.
use crate::access::Actor;
use crate::error::{FlowError, ValidationError};
use crate::log::{FieldChange, LogEntry};
use crate::order::{Order, TimeStamp};
use crate::status::{EdgeKind, Status};
use chrono::Utc;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    /// Status the caller saw when it decided to act.
    pub expected: Option<Status>,
    pub to: Status,
    pub note: Option<String>,
    pub fields: Vec<FieldChange>,
}

impl Transition {
    pub fn to(status: Status) -> Self {
        Self {
            expected: None,
            to: status,
            note: None,
            fields: vec![],
        }
    }
    pub fn expecting(mut self, status: Status) -> Self {
        self.expected = Some(status);
        self
    }
    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }
    pub fn with_field(mut self, field: FieldChange) -> Self {
        self.fields.push(field);
        self
    }
}

/// Moves `order` one edge along the status graph.
///
/// Companion fields are bound to their edge: a batch number only on the PCP release,
/// an invoice number only on billing. Split lineage is never accepted here.
pub fn advance(
    order: &Order,
    transition: &Transition,
    actor: &Actor<'_>,
    at: TimeStamp<Utc>,
) -> Result<Order, FlowError> {
    apply(order, transition, actor, at, false)
}

// Entry point for `split`, the only writer of lineage fields.
pub(crate) fn advance_with_lineage(
    order: &Order,
    transition: &Transition,
    actor: &Actor<'_>,
    at: TimeStamp<Utc>,
) -> Result<Order, FlowError> {
    apply(order, transition, actor, at, true)
}

fn apply(
    order: &Order,
    transition: &Transition,
    actor: &Actor<'_>,
    at: TimeStamp<Utc>,
    lineage: bool,
) -> Result<Order, FlowError> {
    let from = order.status;

    if let Some(expected) = transition.expected {
        if expected != from {
            return Err(FlowError::Conflict {
                order_id: order.id.clone(),
                expected,
                found: from,
            });
        }
    }

    let role = actor.effective_role();
    if !actor.owns(from) {
        return Err(FlowError::PermissionDenied { role, status: from });
    }

    let to = transition.to;
    let kind = from
        .edge_to(to)
        .ok_or(ValidationError::IllegalTransition { from, to })?;

    let note = match kind {
        EdgeKind::Reject | EdgeKind::Return => match transition.note.as_deref().map(str::trim) {
            Some(reason) if !reason.is_empty() => reason.to_string(),
            _ => return Err(ValidationError::MissingReason(to).into()),
        },
        EdgeKind::Unblock => transition
            .note
            .clone()
            .unwrap_or_else(|| format!("Desbloqueado/Liberado por {role}")),
        EdgeKind::Forward => transition
            .note
            .clone()
            .unwrap_or_else(|| format!("Aprovado por {role}")),
    };

    if from == Status::EmProducao
        && to == Status::QualidadePendente
        && order.items.iter().any(|i| i.quantity_produced.is_none())
    {
        return Err(ValidationError::ProductionNotRecorded.into());
    }

    let mut next = order.clone();
    for field in &transition.fields {
        let allowed = match field {
            FieldChange::BatchNumber(_) => from == Status::AnalisePcp && to == Status::EmProducao,
            FieldChange::InvoiceNumber(_) => {
                from == Status::EmFaturamento && to == Status::EmTransporte
            }
            FieldChange::RemainderOrder(_) | FieldChange::SplitFrom(_) => lineage,
        };
        if !allowed {
            return Err(ValidationError::FieldNotAllowed {
                field: field.name(),
                from,
                to,
            }
            .into());
        }

        match field {
            FieldChange::BatchNumber(batch) => {
                if batch.trim().is_empty() {
                    return Err(ValidationError::MissingBatchNumber.into());
                }
                next.batch_number = Some(batch.clone());
            }
            FieldChange::InvoiceNumber(invoice) => {
                if invoice.trim().is_empty() {
                    return Err(ValidationError::MissingInvoiceNumber.into());
                }
                next.invoice_number = Some(invoice.trim().to_string());
            }
            FieldChange::RemainderOrder(_) | FieldChange::SplitFrom(_) => {}
        }
    }

    if to == Status::EmProducao && next.batch_number.is_none() {
        return Err(ValidationError::MissingBatchNumber.into());
    }
    if to == Status::EmTransporte && next.invoice_number.is_none() {
        return Err(ValidationError::MissingInvoiceNumber.into());
    }

    // a released hold is produced again and reported again
    if kind == EdgeKind::Unblock {
        for item in &mut next.items {
            item.quantity_produced = None;
        }
    }

    let entry = LogEntry::new(to, at, actor.user, Some(note)).with_fields(transition.fields.clone());
    next.log = order.log.prepend(entry)?;
    next.status = to;

    Ok(next)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access::User;
    use crate::order::{LineItem, OrderDraft, Priority};
    use crate::status::Role;

    fn order() -> Order {
        let seller = User::new("u2", "João Vendas", Role::Vendas);
        let draft = OrderDraft::new()
            .set_customer("Casa das Tomadas")
            .add_item(LineItem::new("p1", "Tomada 3 Pinos 10A", 10, 850))
            .set_delivery_date(TimeStamp::new())
            .set_priority(Priority::Media);
        Order::create(draft, "order_test".into(), &seller, TimeStamp::new()).unwrap()
    }

    fn at(order: &Order, status: Status) -> Order {
        Order {
            status,
            batch_number: Some("LOTE-202501011200".into()),
            ..order.clone()
        }
    }

    #[test]
    fn pcp_release_attaches_batch() {
        let pcp = User::new("u3", "Maria PCP", Role::Pcp);
        let order = order();

        let next = advance(
            &order,
            &Transition::to(Status::EmProducao)
                .with_field(FieldChange::BatchNumber("LOTE-202501011200".into())),
            &pcp.actor(),
            TimeStamp::new(),
        )
        .unwrap();

        assert_eq!(next.status(), Status::EmProducao);
        assert_eq!(next.batch_number(), Some("LOTE-202501011200"));
        assert_eq!(next.log().len(), 3);
        assert_eq!(next.log().latest().unwrap().user_id, "u3");
        assert_eq!(
            next.log().latest().unwrap().note.as_deref(),
            Some("Aprovado por PCP")
        );
    }

    #[test]
    fn pcp_release_without_batch_fails() {
        let pcp = User::new("u3", "Maria PCP", Role::Pcp);
        let err = advance(
            &order(),
            &Transition::to(Status::EmProducao),
            &pcp.actor(),
            TimeStamp::new(),
        )
        .unwrap_err();

        assert!(matches!(
            err,
            FlowError::Validation(ValidationError::MissingBatchNumber)
        ));
    }

    #[test]
    fn wrong_department_is_denied() {
        let quality = User::new("u5", "Ana Qualidade", Role::Qualidade);
        let err = advance(
            &order(),
            &Transition::to(Status::EmProducao),
            &quality.actor(),
            TimeStamp::new(),
        )
        .unwrap_err();

        assert!(matches!(
            err,
            FlowError::PermissionDenied {
                role: Role::Qualidade,
                status: Status::AnalisePcp
            }
        ));
    }

    #[test]
    fn skipping_a_stage_is_illegal() {
        let pcp = User::new("u3", "Maria PCP", Role::Pcp);
        let err = advance(
            &order(),
            &Transition::to(Status::EmMontagem),
            &pcp.actor(),
            TimeStamp::new(),
        )
        .unwrap_err();

        assert!(matches!(
            err,
            FlowError::Validation(ValidationError::IllegalTransition { .. })
        ));
    }

    #[test]
    fn stale_expectation_conflicts() {
        let pcp = User::new("u3", "Maria PCP", Role::Pcp);
        let err = advance(
            &at(&order(), Status::EmProducao),
            &Transition::to(Status::EmProducao).expecting(Status::AnalisePcp),
            &pcp.actor(),
            TimeStamp::new(),
        )
        .unwrap_err();

        assert!(err.is_conflict());
    }

    #[test]
    fn reject_requires_reason() {
        let quality = User::new("u5", "Ana Qualidade", Role::Qualidade);
        let order = at(&order(), Status::QualidadePendente);

        let err = advance(
            &order,
            &Transition::to(Status::Reprovado).with_note("   "),
            &quality.actor(),
            TimeStamp::new(),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            FlowError::Validation(ValidationError::MissingReason(Status::Reprovado))
        ));

        let blocked = advance(
            &order,
            &Transition::to(Status::Reprovado).with_note("trinca na carcaça"),
            &quality.actor(),
            TimeStamp::new(),
        )
        .unwrap();
        assert_eq!(blocked.status(), Status::Reprovado);
    }

    #[test]
    fn unblock_is_labelled() {
        let production = User::new("u4", "Carlos Produção", Role::Producao);
        let order = at(&order(), Status::Reprovado);

        let released = advance(
            &order,
            &Transition::to(Status::EmProducao),
            &production.actor(),
            TimeStamp::new(),
        )
        .unwrap();

        assert_eq!(released.status(), Status::EmProducao);
        assert_eq!(
            released.log().latest().unwrap().note.as_deref(),
            Some("Desbloqueado/Liberado por PRODUCAO")
        );
    }

    #[test]
    fn production_needs_recorded_quantities() {
        let production = User::new("u4", "Carlos Produção", Role::Producao);
        let err = advance(
            &at(&order(), Status::EmProducao),
            &Transition::to(Status::QualidadePendente),
            &production.actor(),
            TimeStamp::new(),
        )
        .unwrap_err();

        assert!(matches!(
            err,
            FlowError::Validation(ValidationError::ProductionNotRecorded)
        ));
    }

    #[test]
    fn batch_only_on_pcp_release() {
        let manager = User::new("u12", "Carlos Gerente", Role::Gerente);
        let err = advance(
            &at(&order(), Status::Reprovado),
            &Transition::to(Status::EmProducao)
                .with_field(FieldChange::BatchNumber("LOTE-209901011200".into())),
            &manager.acting_as(Role::Producao),
            TimeStamp::new(),
        )
        .unwrap_err();

        assert!(matches!(
            err,
            FlowError::Validation(ValidationError::FieldNotAllowed {
                from: Status::Reprovado,
                to: Status::EmProducao,
                ..
            })
        ));
    }

    #[test]
    fn invoice_only_on_billing() {
        let pcp = User::new("u3", "Maria PCP", Role::Pcp);
        let err = advance(
            &order(),
            &Transition::to(Status::EmProducao)
                .with_field(FieldChange::BatchNumber("LOTE-202501011200".into()))
                .with_field(FieldChange::InvoiceNumber("NF-FAKE".into())),
            &pcp.actor(),
            TimeStamp::new(),
        )
        .unwrap_err();
        assert_eq!(
            err.to_string(),
            "invoice number cannot be set on ANALISE_PCP -> EM_PRODUCAO"
        );

        let shipped = Order {
            invoice_number: Some("NF-1020".into()),
            ..at(&order(), Status::EmTransporte)
        };
        let transport = User::new("u11", "Paulo Transporte", Role::Transporte);
        let err = advance(
            &shipped,
            &Transition::to(Status::Concluido)
                .with_field(FieldChange::InvoiceNumber("NF-9999".into())),
            &transport.actor(),
            TimeStamp::new(),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            FlowError::Validation(ValidationError::FieldNotAllowed { .. })
        ));
    }

    #[test]
    fn lineage_fields_are_refused() {
        let pcp = User::new("u3", "Maria PCP", Role::Pcp);
        for field in [
            FieldChange::SplitFrom("order_nonexistent".into()),
            FieldChange::RemainderOrder("order_nonexistent".into()),
        ] {
            let err = advance(
                &order(),
                &Transition::to(Status::EmProducao)
                    .with_field(FieldChange::BatchNumber("LOTE-202501011200".into()))
                    .with_field(field),
                &pcp.actor(),
                TimeStamp::new(),
            )
            .unwrap_err();

            assert!(matches!(
                err,
                FlowError::Validation(ValidationError::FieldNotAllowed { .. })
            ));
        }
    }

    #[test]
    fn unblock_requires_a_new_production_report() {
        let production = User::new("u4", "Carlos Produção", Role::Producao);
        let mut held = at(&order(), Status::Reprovado);
        for item in &mut held.items {
            item.quantity_produced = Some(item.quantity);
        }

        let released = advance(
            &held,
            &Transition::to(Status::EmProducao),
            &production.actor(),
            TimeStamp::new(),
        )
        .unwrap();
        assert!(released.items().iter().all(|i| i.quantity_produced.is_none()));

        let err = advance(
            &released,
            &Transition::to(Status::QualidadePendente),
            &production.actor(),
            TimeStamp::new(),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            FlowError::Validation(ValidationError::ProductionNotRecorded)
        ));
    }

    #[test]
    fn transport_needs_invoice() {
        let billing = User::new("u9", "Fernanda Faturamento", Role::Faturamento);
        let order = at(&order(), Status::EmFaturamento);

        let err = advance(
            &order,
            &Transition::to(Status::EmTransporte),
            &billing.actor(),
            TimeStamp::new(),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            FlowError::Validation(ValidationError::MissingInvoiceNumber)
        ));

        let shipped = advance(
            &order,
            &Transition::to(Status::EmTransporte)
                .with_field(FieldChange::InvoiceNumber("NF-1020".into())),
            &billing.actor(),
            TimeStamp::new(),
        )
        .unwrap();
        assert_eq!(shipped.invoice_number(), Some("NF-1020"));
    }
}

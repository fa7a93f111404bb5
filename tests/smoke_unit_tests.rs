//! Smoke unit tests for the factory workflow components
//!
//! Happy-path checks across the public API, each module in isolation from the
//! storage-backed scenarios.

use chrono::{TimeZone, Utc};
use factory_flow::{
    access::User,
    batch::{BatchNumber, DEFAULT_PREFIX},
    log::{AuditLog, LogEntry},
    order::{LineItem, Order, OrderDraft, Priority, TimeStamp},
    status::{EdgeKind, Role, Status},
    utils::{ORDER_HRP, new_order_id, new_uuid_to_bech32},
};

fn draft() -> OrderDraft {
    OrderDraft::new()
        .set_customer("  Casa das Tomadas ")
        .add_item(LineItem::new("p1", "Tomada 3 Pinos 10A", 10, 850))
        .add_item(LineItem::new("p2", "Interruptor Simples", 4, 1200))
        .set_delivery_date(TimeStamp::new_with(2025, 6, 1, 0, 0, 0).unwrap())
}

// UTILS MODULE TESTS
mod utils_tests {
    use super::*;

    /// Order ids carry the order prefix and are unique per call
    #[test]
    fn order_ids_are_prefixed_and_unique() {
        let a = new_order_id().unwrap();
        let b = new_order_id().unwrap();

        assert!(a.starts_with(ORDER_HRP));
        assert_ne!(a, b);
    }

    /// An empty prefix is not a valid bech32 hrp
    #[test]
    fn empty_hrp_fails() {
        assert!(new_uuid_to_bech32("").is_err());
    }
}

// ORDER MODULE TESTS
mod order_tests {
    use super::*;

    /// A valid draft becomes an order waiting for PCP
    #[test]
    fn create_routes_to_pcp() {
        let seller = User::new("u2", "João Vendas", Role::Vendas);
        let order = Order::create(draft(), "order_1".into(), &seller, TimeStamp::new()).unwrap();

        assert_eq!(order.status(), Status::AnalisePcp);
        assert_eq!(order.customer_name(), "Casa das Tomadas");
        assert_eq!(order.total_value(), 10 * 850 + 4 * 1200);
        assert_eq!(order.priority(), Priority::Media);
        assert_eq!(order.batch_number(), None);
        assert!(order.items().iter().all(|i| i.quantity_produced.is_none()));
    }

    /// Timestamps are comparable across the orders that carry them
    #[test]
    fn timestamps_order_chronologically() {
        let early = TimeStamp::new_with(2025, 1, 1, 8, 0, 0).unwrap();
        let late = TimeStamp::new_with(2025, 1, 1, 9, 0, 0).unwrap();
        assert!(early < late);
        assert_eq!(
            early.to_datetime_utc(),
            Utc.with_ymd_and_hms(2025, 1, 1, 8, 0, 0).unwrap()
        );
    }
}

// STATUS MODULE TESTS
mod status_tests {
    use super::*;

    /// Every department except intake owns a step of the chain
    #[test]
    fn every_working_status_has_an_owner() {
        for status in Status::ALL {
            match status {
                Status::Concluido => assert!(status.owner().is_none()),
                _ => assert!(status.owner().is_some(), "{status} has no owner"),
            }
        }
    }

    /// Codes are the upper snake case names shown on the floor
    #[test]
    fn codes() {
        assert_eq!(Status::QualidadePendente.to_string(), "QUALIDADE_PENDENTE");
        assert_eq!(Role::Faturamento.to_string(), "FATURAMENTO");
        assert_eq!(Role::Producao.label(), "Produção");
    }

    /// Montagem may hand an order back to quality
    #[test]
    fn assembly_return_edge() {
        assert_eq!(
            Status::EmMontagem.edge_to(Status::QualidadePendente),
            Some(EdgeKind::Return)
        );
        assert!(Status::Concluido.is_terminal());
    }
}

// BATCH MODULE TESTS
mod batch_tests {
    use super::*;

    /// Prefix, dash and the minute stamp
    #[test]
    fn batch_format() {
        let at = Utc.with_ymd_and_hms(2025, 5, 2, 14, 7, 33).unwrap();
        let batch = BatchNumber::generate(DEFAULT_PREFIX, &at);

        assert_eq!(batch.to_string(), "LOTE-202505021407");
        assert_eq!(String::from(batch), "LOTE-202505021407");
    }
}

// LOG MODULE TESTS
mod log_tests {
    use super::*;

    /// Prepending leaves the source log as it was
    #[test]
    fn prepend_is_persistent() {
        let pcp = User::new("u3", "Maria PCP", Role::Pcp);
        let log = AuditLog::seed(&pcp, TimeStamp::new()).unwrap();
        let longer = log
            .prepend(LogEntry::new(Status::EmProducao, TimeStamp::new(), &pcp, None))
            .unwrap();

        assert_eq!(log.len(), 2);
        assert_eq!(longer.len(), 3);
        assert_eq!(
            longer.latest().unwrap().prev_hash,
            Some(log.latest().unwrap().digest().unwrap())
        );
    }
}

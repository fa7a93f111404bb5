//! Walks one order across the factory floor, splitting it on a short delivery.
//!
//! `RUST_LOG=factory_flow=debug cargo run --example floor`
use factory_flow::{
    access::User,
    config::{DEFAULT_FILE, FlowConfig},
    order::{LineItem, OrderDraft, Priority, TimeStamp},
    service::OrderService,
    split::Produced,
    status::Role,
};
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("factory_flow=info")),
        )
        .init();

    // scratch database unless the plant config points somewhere
    let scratch = tempfile::tempdir()?;
    let mut config = FlowConfig::load(DEFAULT_FILE)?;
    if config == FlowConfig::default() {
        config.db_path = scratch.path().join("floor.db");
    }
    let service = OrderService::with_config(config.open_db()?, config)?;

    let sales = User::new("u2", "João Vendas", Role::Vendas);
    let pcp = User::new("u3", "Maria PCP", Role::Pcp);
    let production = User::new("u4", "Carlos Produção", Role::Producao);
    let quality = User::new("u5", "Ana Qualidade", Role::Qualidade);
    let manager = User::new("u12", "Carlos Gerente", Role::Gerente);

    let draft = OrderDraft::new()
        .set_customer("Casa das Tomadas")
        .set_external_ref("PO-2231")
        .add_item(LineItem::new("p1", "Tomada 3 Pinos 10A", 10, 850))
        .add_item(LineItem::new("p2", "Interruptor Simples", 4, 1200))
        .set_delivery_date(TimeStamp::new())
        .set_priority(Priority::Alta);

    let order = service.create_order(draft, &sales)?;
    service.release_to_production(order.id(), None, &pcp.actor())?;

    let outcome = service.record_production(
        order.id(),
        &[Produced::new("p1", 10), Produced::new("p2", 1)],
        true,
        &production.actor(),
    )?;
    service.reject_order(order.id(), "Interruptor com folga", &quality.actor())?;
    service.unblock_order(order.id(), &manager.acting_as(Role::Producao))?;

    let order = service.get_order(order.id())?;
    println!("{} {} batch {:?}", order.id(), order.status(), order.batch_number());
    for entry in order.log().iter() {
        println!(
            "  {:<20} {:<16} {}",
            entry.stage,
            entry.user_name,
            entry.note.as_deref().unwrap_or("")
        );
    }
    if let Some(remainder) = outcome.remainder {
        println!(
            "{} {} ref {:?}",
            remainder.id(),
            remainder.status(),
            remainder.external_ref()
        );
    }

    service.flush()?;
    Ok(())
}

//! The order aggregate: line items, money, dates and its audit log
use crate::access::User;
use crate::error::{FlowError, ValidationError};
use crate::log::AuditLog;
use crate::status::Status;
use chrono::{DateTime, TimeZone, Utc};
use std::cmp::Ordering;
use std::collections::HashSet;

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Priority {
    #[n(0)]
    Baixa,
    #[n(1)]
    Media,
    #[n(2)]
    Alta,
}

#[derive(Debug, PartialEq, Eq, Clone)]
pub struct TimeStamp<T: TimeZone>(DateTime<T>);

// Prices and totals are integer cents.
#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq, Eq)]
pub struct LineItem {
    #[n(0)]
    pub product_id: String,
    #[n(1)]
    pub product_name: String, // snapshot at order time
    #[n(2)]
    pub quantity: u32,
    #[n(3)]
    pub quantity_produced: Option<u32>,
    #[n(4)]
    pub unit_price: u64, // snapshot at order time
}

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq, Eq)]
pub struct Order {
    #[n(0)]
    pub(crate) id: String, // bech32 encoded uuid7
    #[n(1)]
    pub(crate) external_ref: Option<String>, // customer PO
    #[n(2)]
    pub(crate) batch_number: Option<String>,
    #[n(3)]
    pub(crate) customer_name: String,
    #[n(4)]
    pub(crate) items: Vec<LineItem>,
    #[n(5)]
    pub(crate) status: Status,
    #[n(6)]
    pub(crate) created_at: TimeStamp<Utc>,
    #[n(7)]
    pub(crate) delivery_date: TimeStamp<Utc>,
    #[n(8)]
    pub(crate) priority: Priority,
    #[n(9)]
    pub(crate) total_value: u64,
    #[n(10)]
    pub(crate) invoice_number: Option<String>,
    #[n(11)]
    pub(crate) log: AuditLog,
}

/// Sales intake form, validated into an [`Order`] on creation.
#[derive(Debug, Default, Clone)]
pub struct OrderDraft {
    customer_name: Option<String>,
    external_ref: Option<String>,
    items: Vec<LineItem>,
    delivery_date: Option<TimeStamp<Utc>>,
    priority: Option<Priority>,
}

impl TimeStamp<Utc> {
    pub fn new() -> Self {
        Self(Utc::now())
    }
    pub fn new_with(year: i32, month: u32, day: u32, hour: u32, min: u32, sec: u32) -> Option<Self> {
        Utc.with_ymd_and_hms(year, month, day, hour, min, sec)
            .single()
            .map(Self)
    }
    pub fn to_datetime_utc(&self) -> DateTime<Utc> {
        self.0
    }
}

impl Default for TimeStamp<Utc> {
    fn default() -> Self {
        Self::new()
    }
}

impl LineItem {
    pub fn new(product_id: &str, product_name: &str, quantity: u32, unit_price: u64) -> Self {
        Self {
            product_id: product_id.to_string(),
            product_name: product_name.to_string(),
            quantity,
            quantity_produced: None,
            unit_price,
        }
    }
    pub fn line_value(&self) -> Option<u64> {
        u64::from(self.quantity).checked_mul(self.unit_price)
    }
}

impl OrderDraft {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn set_customer(mut self, name: &str) -> Self {
        self.customer_name = Some(name.to_string());
        self
    }
    pub fn set_external_ref(mut self, reference: &str) -> Self {
        self.external_ref = Some(reference.to_string());
        self
    }
    pub fn add_item(mut self, item: LineItem) -> Self {
        self.items.push(item);
        self
    }
    pub fn set_delivery_date(mut self, date: TimeStamp<Utc>) -> Self {
        self.delivery_date = Some(date);
        self
    }
    pub fn set_priority(mut self, priority: Priority) -> Self {
        self.priority = Some(priority);
        self
    }

    /// Checks the form and returns the frozen total value.
    pub fn validate(&self) -> Result<u64, ValidationError> {
        match self.customer_name.as_deref() {
            Some(name) if !name.trim().is_empty() => {}
            _ => return Err(ValidationError::MissingCustomer),
        }
        if self.items.is_empty() {
            return Err(ValidationError::NoItems);
        }
        match &self.delivery_date {
            None => return Err(ValidationError::MissingDeliveryDate),
            // stored as i64 nanoseconds
            Some(date) if date.0.timestamp_nanos_opt().is_none() => {
                return Err(ValidationError::DeliveryDateOutOfRange);
            }
            Some(_) => {}
        }

        let mut seen = HashSet::new();
        let mut total: u64 = 0;
        for item in &self.items {
            if item.quantity == 0 {
                return Err(ValidationError::ZeroQuantity(item.product_id.clone()));
            }
            if !seen.insert(item.product_id.as_str()) {
                return Err(ValidationError::DuplicateProduct(item.product_id.clone()));
            }
            total = item
                .line_value()
                .and_then(|value| total.checked_add(value))
                .ok_or(ValidationError::ValueOverflow)?;
        }
        Ok(total)
    }
}

impl Order {
    /// Builds an order in `ANALISE_PCP` with the creation and routing entries.
    pub fn create(
        draft: OrderDraft,
        id: String,
        creator: &User,
        at: TimeStamp<Utc>,
    ) -> Result<Self, FlowError> {
        let total_value = draft.validate()?;
        let log = AuditLog::seed(creator, at.clone())?;

        let (Some(customer_name), Some(delivery_date)) = (draft.customer_name, draft.delivery_date)
        else {
            return Err(ValidationError::MissingCustomer.into());
        };

        let items = draft
            .items
            .into_iter()
            .map(|item| LineItem {
                quantity_produced: None,
                ..item
            })
            .collect();

        Ok(Self {
            id,
            external_ref: draft.external_ref.filter(|r| !r.trim().is_empty()),
            batch_number: None,
            customer_name: customer_name.trim().to_string(),
            items,
            status: Status::AnalisePcp,
            created_at: at,
            delivery_date,
            priority: draft.priority.unwrap_or(Priority::Media),
            total_value,
            invoice_number: None,
            log,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }
    pub fn external_ref(&self) -> Option<&str> {
        self.external_ref.as_deref()
    }
    pub fn batch_number(&self) -> Option<&str> {
        self.batch_number.as_deref()
    }
    pub fn customer_name(&self) -> &str {
        &self.customer_name
    }
    pub fn items(&self) -> &[LineItem] {
        &self.items
    }
    pub fn status(&self) -> Status {
        self.status
    }
    pub fn created_at(&self) -> &TimeStamp<Utc> {
        &self.created_at
    }
    pub fn delivery_date(&self) -> &TimeStamp<Utc> {
        &self.delivery_date
    }
    pub fn priority(&self) -> Priority {
        self.priority
    }
    /// Frozen at creation, a split does not recompute it.
    pub fn total_value(&self) -> u64 {
        self.total_value
    }
    pub fn invoice_number(&self) -> Option<&str> {
        self.invoice_number.as_deref()
    }
    pub fn log(&self) -> &AuditLog {
        &self.log
    }
    pub fn item(&self, product_id: &str) -> Option<&LineItem> {
        self.items.iter().find(|i| i.product_id == product_id)
    }

    /// Case-insensitive match on customer name or order id.
    pub fn matches(&self, term: &str) -> bool {
        let term = term.to_lowercase();
        self.customer_name.to_lowercase().contains(&term) || self.id.to_lowercase().contains(&term)
    }

    pub fn to_cbor(&self) -> Result<Vec<u8>, FlowError> {
        Ok(minicbor::to_vec(self)?)
    }
    pub fn from_cbor(bytes: &[u8]) -> Result<Self, FlowError> {
        Ok(minicbor::decode(bytes)?)
    }
}

impl PartialOrd for TimeStamp<Utc> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for TimeStamp<Utc> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.cmp(&other.0)
    }
}

impl<T: TimeZone> From<DateTime<T>> for TimeStamp<T> {
    fn from(value: DateTime<T>) -> Self {
        TimeStamp(value)
    }
}
impl<C> minicbor::Encode<C> for TimeStamp<Utc> {
    fn encode<W: minicbor::encode::Write>(
        &self,
        e: &mut minicbor::Encoder<W>,
        _: &mut C,
    ) -> Result<(), minicbor::encode::Error<W::Error>> {
        if let Some(nsec) = self.0.timestamp_nanos_opt() {
            return e.i64(nsec)?.ok();
        }

        Err(minicbor::encode::Error::message(
            "failed to encode timestamp. timestamp_nanos_opt returned None",
        ))
    }
}
impl<'b, C> minicbor::Decode<'b, C> for TimeStamp<Utc> {
    fn decode(d: &mut minicbor::Decoder<'b>, _: &mut C) -> Result<Self, minicbor::decode::Error> {
        let nsecs = d.i64()?;

        Ok(TimeStamp(DateTime::from_timestamp_nanos(nsecs)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::status::Role;

    fn draft() -> OrderDraft {
        OrderDraft::new()
            .set_customer("Eletro Center")
            .set_external_ref("PO-881")
            .add_item(LineItem::new("p1", "Tomada 3 Pinos 10A", 10, 850))
            .add_item(LineItem::new("p2", "Tomada 3 Pinos 20A Vermelha", 4, 1200))
            .set_delivery_date(TimeStamp::new_with(2025, 3, 10, 0, 0, 0).unwrap())
            .set_priority(Priority::Alta)
    }

    #[test]
    fn timestamp_encoding() {
        let original = TimeStamp::new();

        let encoding = minicbor::to_vec(original.clone()).unwrap();
        let decode: TimeStamp<Utc> = minicbor::decode(&encoding).unwrap();

        assert_eq!(original, decode);
    }

    #[test]
    fn create_freezes_total_and_seeds_log() {
        let seller = User::new("u2", "João Vendas", Role::Vendas);
        let order = Order::create(draft(), "order_1".into(), &seller, TimeStamp::new()).unwrap();

        assert_eq!(order.total_value(), 10 * 850 + 4 * 1200);
        assert_eq!(order.status(), Status::AnalisePcp);
        assert_eq!(order.priority(), Priority::Alta);
        assert_eq!(order.log().len(), 2);
        assert_eq!(order.log().creation().unwrap().stage, Status::Criado);
    }

    #[test]
    fn draft_rejects_duplicate_products() {
        let draft = draft().add_item(LineItem::new("p1", "Tomada 3 Pinos 10A", 1, 850));
        assert_eq!(
            draft.validate(),
            Err(ValidationError::DuplicateProduct("p1".into()))
        );
    }

    #[test]
    fn draft_rejects_missing_fields() {
        assert_eq!(
            OrderDraft::new().validate(),
            Err(ValidationError::MissingCustomer)
        );
        assert_eq!(
            OrderDraft::new().set_customer("  ").validate(),
            Err(ValidationError::MissingCustomer)
        );
        assert_eq!(
            OrderDraft::new().set_customer("ACME").validate(),
            Err(ValidationError::NoItems)
        );
        assert_eq!(
            OrderDraft::new()
                .set_customer("ACME")
                .add_item(LineItem::new("p3", "Chuveiro", 0, 15000))
                .set_delivery_date(TimeStamp::new())
                .validate(),
            Err(ValidationError::ZeroQuantity("p3".into()))
        );
    }

    #[test]
    fn draft_rejects_unstorable_delivery_date() {
        let far = TimeStamp::new_with(2300, 1, 1, 0, 0, 0).unwrap();
        assert_eq!(
            draft().set_delivery_date(far).validate(),
            Err(ValidationError::DeliveryDateOutOfRange)
        );

        let seller = User::new("u2", "João Vendas", Role::Vendas);
        let far = TimeStamp::new_with(2300, 1, 1, 0, 0, 0).unwrap();
        let err = Order::create(
            draft().set_delivery_date(far),
            "order_1".into(),
            &seller,
            TimeStamp::new(),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            FlowError::Validation(ValidationError::DeliveryDateOutOfRange)
        ));
    }

    #[test]
    fn timestamps_order_by_instant() {
        let early = TimeStamp::new_with(2025, 1, 1, 8, 0, 0).unwrap();
        let late = TimeStamp::new_with(2025, 1, 1, 8, 0, 1).unwrap();

        assert!(early < late);
        assert_eq!(early.cmp(&early.clone()), Ordering::Equal);
    }

    #[test]
    fn order_cbor_roundtrip() {
        let seller = User::new("u2", "João Vendas", Role::Vendas);
        let order = Order::create(draft(), "order_1".into(), &seller, TimeStamp::new()).unwrap();

        let decoded = Order::from_cbor(&order.to_cbor().unwrap()).unwrap();
        assert_eq!(order, decoded);
    }

    #[test]
    fn matches_customer_or_id() {
        let seller = User::new("u2", "João Vendas", Role::Vendas);
        let order = Order::create(draft(), "order_1abc".into(), &seller, TimeStamp::new()).unwrap();

        assert!(order.matches("eletro"));
        assert!(order.matches("1ABC"));
        assert!(!order.matches("acme"));
    }
}

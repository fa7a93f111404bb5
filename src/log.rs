//! Append-only audit trail of an order's transitions
//!
//! Entries are stored newest first. Every entry carries the sha256 digest of the
//! entry recorded before it, so history rewritten after the fact fails [`AuditLog::verify`].
use crate::access::User;
use crate::error::FlowError;
use crate::order::TimeStamp;
use crate::status::Status;
use chrono::Utc;

pub const NOTE_CREATED: &str = "Pedido Criado";
pub const NOTE_ROUTED_TO_PCP: &str = "Movido para o PCP";
pub const NOTE_PARTIAL: &str = "Entrega Parcial";
pub const NOTE_FULL_PRODUCTION: &str = "Produção concluída total.";
pub const NOTE_REMAINDER: &str = "Saldo remanescente";

/// Structured data committed together with a transition.
#[derive(Debug, PartialEq, Eq, minicbor::Encode, minicbor::Decode, Clone)]
pub enum FieldChange {
    #[n(0)]
    BatchNumber(#[n(0)] String),
    #[n(1)]
    InvoiceNumber(#[n(0)] String),
    #[n(2)]
    RemainderOrder(#[n(0)] String),
    #[n(3)]
    SplitFrom(#[n(0)] String),
}

#[derive(Debug, PartialEq, Eq, minicbor::Encode, minicbor::Decode, Clone)]
pub struct LogEntry {
    #[n(0)]
    pub stage: Status,
    #[n(1)]
    pub timestamp: TimeStamp<Utc>,
    #[n(2)]
    pub user_id: String,
    #[n(3)]
    pub user_name: String,
    #[n(4)]
    pub note: Option<String>,
    #[n(5)]
    pub fields: Vec<FieldChange>,
    #[n(6)]
    pub prev_hash: Option<String>, // digest of the previous entry, filled by prepend
}

#[derive(Debug, Default, PartialEq, Eq, minicbor::Encode, minicbor::Decode, Clone)]
pub struct AuditLog {
    #[n(0)]
    entries: Vec<LogEntry>,
}

impl FieldChange {
    pub fn name(&self) -> &'static str {
        match self {
            FieldChange::BatchNumber(_) => "batch number",
            FieldChange::InvoiceNumber(_) => "invoice number",
            FieldChange::RemainderOrder(_) => "remainder order",
            FieldChange::SplitFrom(_) => "split origin",
        }
    }
}

impl LogEntry {
    pub fn new(stage: Status, timestamp: TimeStamp<Utc>, user: &User, note: Option<String>) -> Self {
        Self {
            stage,
            timestamp,
            user_id: user.id.clone(),
            user_name: user.name.clone(),
            note,
            fields: vec![],
            prev_hash: None,
        }
    }
    pub fn with_fields(mut self, fields: Vec<FieldChange>) -> Self {
        self.fields = fields;
        self
    }
    pub fn digest(&self) -> Result<String, FlowError> {
        let cbor = minicbor::to_vec(self)?;
        Ok(sha256::digest(cbor))
    }
}

impl AuditLog {
    /// The two entries every new order starts with, creation at the tail.
    pub fn seed(creator: &User, at: TimeStamp<Utc>) -> Result<Self, FlowError> {
        AuditLog::default()
            .prepend(LogEntry::new(
                Status::Criado,
                at.clone(),
                creator,
                Some(NOTE_CREATED.to_string()),
            ))?
            .prepend(LogEntry::new(
                Status::AnalisePcp,
                at,
                creator,
                Some(NOTE_ROUTED_TO_PCP.to_string()),
            ))
    }

    /// Returns a new log with `entry` at the front; `self` is left untouched.
    pub fn prepend(&self, mut entry: LogEntry) -> Result<Self, FlowError> {
        entry.prev_hash = self.latest().map(LogEntry::digest).transpose()?;

        let mut entries = Vec::with_capacity(self.entries.len() + 1);
        entries.push(entry);
        entries.extend(self.entries.iter().cloned());

        Ok(Self { entries })
    }

    pub fn latest(&self) -> Option<&LogEntry> {
        self.entries.first()
    }
    pub fn creation(&self) -> Option<&LogEntry> {
        self.entries.last()
    }
    pub fn len(&self) -> usize {
        self.entries.len()
    }
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
    /// Newest first.
    pub fn iter(&self) -> impl Iterator<Item = &LogEntry> {
        self.entries.iter()
    }

    /// Checks the digest chain and that the oldest entry is the creation.
    pub fn verify(&self) -> Result<bool, FlowError> {
        for pair in self.entries.windows(2) {
            if pair[0].prev_hash.as_deref() != Some(pair[1].digest()?.as_str()) {
                return Ok(false);
            }
        }
        Ok(match self.creation() {
            Some(first) => first.stage == Status::Criado && first.prev_hash.is_none(),
            None => false,
        })
    }
}

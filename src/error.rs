use crate::status::{Role, Status};

#[derive(thiserror::Error, Debug)]
pub enum FlowError {
    #[error("Order {0} was not found")]
    NotFound(String),
    #[error("Access restricted: {role} does not own orders in {status}")]
    PermissionDenied { role: Role, status: Status },
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("Order {order_id} moved to {found} while {expected} was expected, refetch and retry")]
    Conflict {
        order_id: String,
        expected: Status,
        found: Status,
    },
    #[error("Storage failure: {0}")]
    Storage(#[from] sled::Error),
    #[error("Failed to encode record: {0}")]
    Encode(#[from] minicbor::encode::Error<std::convert::Infallible>),
    #[error("Failed to decode record: {0}")]
    Decode(#[from] minicbor::decode::Error),
    #[error("Invalid configuration: {0}")]
    Config(String),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum ValidationError {
    #[error("{from} cannot move to {to}")]
    IllegalTransition { from: Status, to: Status },
    #[error("A batch number is required before production")]
    MissingBatchNumber,
    #[error("{field} cannot be set on {from} -> {to}")]
    FieldNotAllowed {
        field: &'static str,
        from: Status,
        to: Status,
    },
    #[error("An invoice number is required before transport")]
    MissingInvoiceNumber,
    #[error("A reason is required to move {0}")]
    MissingReason(Status),
    #[error("Produced {produced} of {product_id} exceeds the requested {requested}")]
    ProducedOutOfRange {
        product_id: String,
        produced: u32,
        requested: u32,
    },
    #[error("Product {0} is not part of this order")]
    UnknownProduct(String),
    #[error("Produced quantities were not recorded for every line")]
    ProductionNotRecorded,
    #[error("Produced quantity is short of the request, partial delivery must be confirmed")]
    PartialNotConfirmed,
    #[error("Customer name is not set")]
    MissingCustomer,
    #[error("Order has no line items")]
    NoItems,
    #[error("Line {0} has a zero quantity")]
    ZeroQuantity(String),
    #[error("Product {0} appears on more than one line")]
    DuplicateProduct(String),
    #[error("Delivery date is not set")]
    MissingDeliveryDate,
    #[error("Delivery date is outside the storable range")]
    DeliveryDateOutOfRange,
    #[error("Order value overflows")]
    ValueOverflow,
}

impl FlowError {
    pub fn is_conflict(&self) -> bool {
        matches!(self, FlowError::Conflict { .. })
    }
}

impl From<sled::transaction::TransactionError<FlowError>> for FlowError {
    fn from(value: sled::transaction::TransactionError<FlowError>) -> Self {
        match value {
            sled::transaction::TransactionError::Abort(err) => err,
            sled::transaction::TransactionError::Storage(err) => FlowError::Storage(err),
        }
    }
}

use crate::adapters::AdapterError;
use crate::collaborators::CollaboratorError;
use crate::store::StoreError;
use thiserror::Error;
use uuid::Uuid;

pub mod intents;
pub mod notifications;
pub mod orders;
pub mod returns;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("order not found: {0}")]
    OrderNotFound(Uuid),

    #[error("payment not found: {0}")]
    PaymentNotFound(String),

    #[error("destination not found: {0}")]
    DestinationNotFound(String),

    #[error("merchant not found: {0}")]
    MerchantNotFound(String),

    #[error("unsupported payment destination: {0}")]
    UnsupportedDestination(String),

    #[error("no purchasable courses in request")]
    EmptyOrder,

    #[error("caller identity required")]
    Unauthorized,

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("adapter error: {0}")]
    Adapter(#[from] AdapterError),

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("collaborator error: {0}")]
    Collaborator(#[from] CollaboratorError),
}

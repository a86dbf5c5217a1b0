use derive_more::{Display, Error};

/// Reasons an [Order](crate::exchange::islay::Order) fails validation.
#[derive(Clone, Debug, Display, Error, PartialEq)]
pub enum OrderError {
    #[display("order has an empty product")]
    EmptyProduct,
    #[display("order has zero quantity")]
    ZeroQuantity,
    #[display("order has invalid limit price {price}")]
    InvalidPrice { price: f64 },
}

/// Errors returned by the matching engine. None of these mutate the ledger or the book.
#[derive(Clone, Debug, Display, Error, PartialEq)]
pub enum MatchError {
    #[display("invalid order: {reason}")]
    InvalidOrder {
        #[error(source)]
        reason: OrderError,
    },
    #[display("no position limit configured for {product}")]
    NoPositionLimit { product: String },
    #[display("no depth for {product} on this tick")]
    UnknownProduct { product: String },
}

impl From<OrderError> for MatchError {
    fn from(reason: OrderError) -> Self {
        MatchError::InvalidOrder { reason }
    }
}

/// Errors returned by inputs when a tick cannot be produced.
#[derive(Clone, Debug, Display, Error, PartialEq)]
pub enum FeedError {
    #[display("no depth recorded for tick {tick}")]
    MissingTick { tick: u64 },
}

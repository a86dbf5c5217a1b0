//! Exchanges cross orders against depth. [Islay](islay::Islay) is the only implementation: it
//! matches one order at a time against a single tick of depth and settles each fill into a
//! [Ledger](crate::portfolio::Ledger) as it happens.
pub mod islay;

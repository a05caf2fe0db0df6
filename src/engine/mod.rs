//! Engine — turns a priced ticket into a gateway order.

pub mod executor;

//! Realtime delivery: a shared push channel with polling as fallback.

mod poll;
mod push;
pub mod stomp;

pub use poll::{HistorySource, InFlight, InFlightGuard, PollConfig, Poller};
pub use push::{
    PushChannel, PushConfig, PushHub, PushSource, SubscriberId, Subscription,
    SubscriptionRegistry,
};

//! Event types for the deterministic state machine.

use phalanx_types::OrderInfo;

/// All possible inputs to the ordering state machine.
///
/// Events are **passive data** - they describe something that happened.
/// The state machine processes events and returns actions.
///
/// Evidence arrives already verified: signature and quorum-certificate
/// checks happen upstream of the state machine.
#[derive(Debug, Clone)]
pub enum Event {
    /// A single verified partial-order assertion.
    OrderReceived { info: OrderInfo },

    /// A batch of verified partial-order assertions, typically the unpacked
    /// content of one replica's partial order.
    ///
    /// The ordering loop runs once after the whole batch is collected.
    OrderStreamReceived { stream: Vec<OrderInfo> },
}

impl Event {
    /// Get the event type name for telemetry.
    pub fn type_name(&self) -> &'static str {
        match self {
            Event::OrderReceived { .. } => "OrderReceived",
            Event::OrderStreamReceived { .. } => "OrderStreamReceived",
        }
    }

    /// Number of `OrderInfo`s carried by this event.
    pub fn evidence_count(&self) -> usize {
        match self {
            Event::OrderReceived { .. } => 1,
            Event::OrderStreamReceived { stream } => stream.len(),
        }
    }
}

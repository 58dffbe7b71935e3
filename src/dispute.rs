// Bazaar Node: peer-to-peer decentralized marketplace
//
// SPDX-License-Identifier: Apache-2.0

//! Dispute flow (§4.5 distilled spec / C5). Opens and closes disputes via
//! the moderation subsystem, an external collaborator — this crate does
//! not implement moderator selection (see DESIGN.md Open Questions).

use crate::external::{Datastore, ModerationSink, NotificationSink};
use bazaarrpc::Guid;

#[derive(Debug, Display, Error)]
#[display(doc_comments)]
pub enum DisputeError {
    /// order {0} not found.
    OrderNotFound(String),
}

pub fn open_dispute(
    datastore: &dyn Datastore,
    moderation: &dyn ModerationSink,
    sink: &dyn NotificationSink,
    order_id: &str,
    claim: &[u8],
    counterparty_guid: Guid,
) -> Result<(), DisputeError> {
    datastore
        .load_order(order_id)
        .ok_or_else(|| DisputeError::OrderNotFound(order_id.to_string()))?;
    moderation.open(order_id, claim);
    sink.notify(counterparty_guid, String::new(), "dispute opened", order_id.to_string(), String::new(), String::new());
    Ok(())
}

pub fn close_dispute(
    datastore: &dyn Datastore,
    moderation: &dyn ModerationSink,
    sink: &dyn NotificationSink,
    order_id: &str,
    resolution: &[u8],
    counterparty_guid: Guid,
) -> Result<(), DisputeError> {
    datastore
        .load_order(order_id)
        .ok_or_else(|| DisputeError::OrderNotFound(order_id.to_string()))?;
    moderation.close(order_id, resolution);
    sink.notify(counterparty_guid, String::new(), "dispute closed", order_id.to_string(), String::new(), String::new());
    Ok(())
}

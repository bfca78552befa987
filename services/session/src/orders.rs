//! Order lifecycle tracker
//!
//! One authoritative record per order id, merged from four sources:
//! local submission, broker acknowledgment (open order), broker status
//! events and broker errors. Records are replaced, never edited in
//! place, so a record already delivered to subscribers stays as it was.

use std::collections::BTreeMap;
use std::sync::Arc;

use market_data::register::{Register, Topic};
use tracing::{debug, info, warn};
use types::contract::ContractSpec;
use types::ids::OrderId;
use types::order::{BrokerOrder, OrderRecord, OrderStatus, OrderTicket, StatusUpdate};

#[derive(Debug)]
pub struct OrderTracker {
    records: BTreeMap<OrderId, Arc<OrderRecord>>,
    topic: Register<OrderRecord>,
}

impl OrderTracker {
    pub fn new() -> Self {
        Self {
            records: BTreeMap::new(),
            topic: Register::new(Topic::Order),
        }
    }

    /// Store the initial record for a local submission. Not published.
    pub fn submit(
        &mut self,
        order_id: OrderId,
        ticket: &OrderTicket,
        account: &str,
        contract: &ContractSpec,
        connected: bool,
        now_ms: i64,
    ) -> Arc<OrderRecord> {
        let record = Arc::new(OrderRecord::submitted(
            order_id, ticket, account, contract, connected, now_ms,
        ));
        info!(
            %order_id,
            action = %ticket.action,
            order_type = ticket.order_type.as_str(),
            quantity = %ticket.quantity,
            status = ?record.status,
            "Order submitted"
        );
        self.records.insert(order_id, Arc::clone(&record));
        record
    }

    /// Apply a broker acknowledgment; creates the record if unknown.
    pub fn acknowledge(
        &mut self,
        order_id: OrderId,
        broker: &BrokerOrder,
        now_ms: i64,
    ) -> Arc<OrderRecord> {
        let existing = self.records.get(&order_id);
        let status = match OrderStatus::from_broker(&broker.status) {
            Some(status) => status,
            None => {
                warn!(%order_id, status = %broker.status, "Unknown broker status on acknowledgment");
                existing.map_or(OrderStatus::PendingNew, |r| r.status)
            }
        };
        let record = match existing {
            Some(current) => current.acknowledged(broker, status, now_ms),
            None => OrderRecord::from_broker(order_id, broker, status, now_ms),
        };
        debug!(%order_id, perm_id = broker.perm_id, status = ?status, "Order acknowledged");
        self.store_and_publish(record)
    }

    /// Merge a status event. Unknown ids and statuses are ignored.
    pub fn update_status(
        &mut self,
        order_id: OrderId,
        update: &StatusUpdate,
    ) -> Option<Arc<OrderRecord>> {
        let Some(current) = self.records.get(&order_id) else {
            debug!(%order_id, "Status for unknown order ignored");
            return None;
        };
        let record = current.with_status(update);
        debug!(
            %order_id,
            status = ?update.status,
            filled = %update.filled_quantity,
            avg_fill_price = %update.avg_fill_price,
            "Order status"
        );
        Some(self.store_and_publish(record))
    }

    /// Mark a known order Cancelled or Rejected from a broker error.
    ///
    /// Request ids and order ids share one namespace, so a match here is
    /// a best guess that the error concerns the order.
    pub fn report_error(
        &mut self,
        order_id: OrderId,
        error_text: &str,
        now_ms: i64,
    ) -> Option<Arc<OrderRecord>> {
        let current = self.records.get(&order_id)?;
        let record = current.with_error(error_text, now_ms);
        warn!(%order_id, status = ?record.status, error = error_text, "Order failed at broker");
        Some(self.store_and_publish(record))
    }

    pub fn query(&self, order_id: OrderId) -> Option<Arc<OrderRecord>> {
        self.records.get(&order_id).cloned()
    }

    pub fn contains(&self, order_id: OrderId) -> bool {
        self.records.contains_key(&order_id)
    }

    /// Records still working at the broker, in id order.
    pub fn list_open(&self) -> Vec<Arc<OrderRecord>> {
        self.records
            .values()
            .filter(|record| record.is_open())
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn topic(&mut self) -> &mut Register<OrderRecord> {
        &mut self.topic
    }

    fn store_and_publish(&mut self, record: OrderRecord) -> Arc<OrderRecord> {
        let record = Arc::new(record);
        self.records.insert(record.order_id, Arc::clone(&record));
        self.topic.publish(Arc::clone(&record));
        record
    }
}

impl Default for OrderTracker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use market_data::register::DeliveryError;
    use rust_decimal::Decimal;
    use std::sync::Mutex;
    use types::numeric::UNSET_DOUBLE;
    use types::order::OrderAction;

    fn contract() -> ContractSpec {
        ContractSpec::from_instrument("SMART.XAU_USD.SPOT").unwrap()
    }

    fn ticket() -> OrderTicket {
        OrderTicket::parse("BUY", "LMT", "1.15", "10").unwrap()
    }

    fn broker(status: &str) -> BrokerOrder {
        BrokerOrder {
            perm_id: 1538198311,
            action: OrderAction::Buy,
            total_quantity: 10.0,
            order_type: types::order::OrderType::Limit,
            limit_price: 1.15,
            aux_price: 0.0,
            time_in_force: "DAY".into(),
            account: "DU228384".into(),
            contract: contract(),
            status: status.into(),
            commission: UNSET_DOUBLE,
            completed_status: String::new(),
            filled_quantity: UNSET_DOUBLE,
            avg_fill_price: 0.0,
        }
    }

    fn collect(tracker: &mut OrderTracker) -> Arc<Mutex<Vec<Arc<OrderRecord>>>> {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        tracker.topic().register(move |record: Arc<OrderRecord>| -> Result<(), DeliveryError> {
            sink.lock().unwrap().push(record);
            Ok(())
        });
        seen
    }

    #[test]
    fn test_submit_does_not_publish() {
        let mut tracker = OrderTracker::new();
        let seen = collect(&mut tracker);
        let id = OrderId::new(3);
        let record = tracker.submit(id, &ticket(), "DU228384", &contract(), true, 1_000);
        assert_eq!(record.status, OrderStatus::PendingNew);
        assert!(seen.lock().unwrap().is_empty());
        assert!(tracker.contains(id));
    }

    #[test]
    fn test_submit_while_disconnected_rejected() {
        let mut tracker = OrderTracker::new();
        let record = tracker.submit(OrderId::new(4), &ticket(), "DU1", &contract(), false, 0);
        assert_eq!(record.status, OrderStatus::Rejected);
    }

    #[test]
    fn test_acknowledge_creates_unknown_order() {
        let mut tracker = OrderTracker::new();
        let seen = collect(&mut tracker);
        let record = tracker.acknowledge(OrderId::new(9), &broker("PreSubmitted"), 5);
        assert_eq!(record.status, OrderStatus::PreSubmitted);
        assert_eq!(record.commission, None);
        assert_eq!(seen.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_status_update_copy_on_write() {
        let mut tracker = OrderTracker::new();
        let seen = collect(&mut tracker);
        let id = OrderId::new(5);
        tracker.submit(id, &ticket(), "DU1", &contract(), true, 0);
        tracker.acknowledge(id, &broker("Submitted"), 10);

        tracker.update_status(
            id,
            &StatusUpdate {
                status: OrderStatus::Filled,
                filled_quantity: Decimal::from(10),
                avg_fill_price: Decimal::new(1174, 3),
                timestamp: 20,
            },
        );

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0].status, OrderStatus::Submitted);
        assert_eq!(seen[1].status, OrderStatus::Filled);
        assert_eq!(tracker.query(id).unwrap().avg_fill_price, Decimal::new(1174, 3));
    }

    #[test]
    fn test_status_for_unknown_order_ignored() {
        let mut tracker = OrderTracker::new();
        let update = StatusUpdate {
            status: OrderStatus::Filled,
            filled_quantity: Decimal::ONE,
            avg_fill_price: Decimal::ONE,
            timestamp: 0,
        };
        assert!(tracker.update_status(OrderId::new(77), &update).is_none());
        assert!(tracker.is_empty());
    }

    #[test]
    fn test_report_error_only_for_known_ids() {
        let mut tracker = OrderTracker::new();
        let seen = collect(&mut tracker);
        assert!(tracker.report_error(OrderId::new(1), "No security definition", 0).is_none());
        assert!(seen.lock().unwrap().is_empty());

        let id = OrderId::new(2);
        tracker.submit(id, &ticket(), "DU1", &contract(), true, 0);
        let cancelled = tracker
            .report_error(id, "Order Canceled - reason:", 50)
            .unwrap();
        assert_eq!(cancelled.status, OrderStatus::Cancelled);
        assert_eq!(cancelled.last_update_ts, 50);

        let rejected = tracker.report_error(id, "Order rejected", 60).unwrap();
        assert_eq!(rejected.status, OrderStatus::Rejected);
        assert_eq!(seen.lock().unwrap().len(), 2);
    }

    #[test]
    fn test_list_open_filters_submitted() {
        let mut tracker = OrderTracker::new();
        tracker.acknowledge(OrderId::new(1), &broker("Submitted"), 0);
        tracker.acknowledge(OrderId::new(2), &broker("Filled"), 0);
        tracker.acknowledge(OrderId::new(3), &broker("PendingCancel"), 0);
        tracker.acknowledge(OrderId::new(4), &broker("PreSubmitted"), 0);

        let open: Vec<i64> = tracker.list_open().iter().map(|r| r.order_id.value()).collect();
        assert_eq!(open, vec![1, 3]);
    }

    #[test]
    fn test_unknown_ack_status_keeps_previous() {
        let mut tracker = OrderTracker::new();
        let id = OrderId::new(8);
        tracker.acknowledge(id, &broker("Submitted"), 0);
        let record = tracker.acknowledge(id, &broker("Mystery"), 1);
        assert_eq!(record.status, OrderStatus::Submitted);
    }
}

use crate::error::{Result, RuntimeError};
use podmender_core::{PodEvent, PodUid};
use std::collections::hash_map::DefaultHasher;
use std::collections::{HashMap, VecDeque};
use std::hash::{Hash, Hasher};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::Notify;

/// Lane a UID is routed to. Stable for the lifetime of the process.
pub fn lane_index(uid: &PodUid, lanes: usize) -> usize {
    let mut hasher = DefaultHasher::new();
    uid.hash(&mut hasher);
    (hasher.finish() % lanes.max(1) as u64) as usize
}

#[derive(Default)]
struct LaneState {
    /// UIDs with a pending event, oldest first
    order: VecDeque<PodUid>,
    /// Latest undelivered event per UID
    pending: HashMap<PodUid, PodEvent>,
    closed: bool,
    receiver_gone: bool,
}

#[derive(Default)]
struct Lane {
    state: Mutex<LaneState>,
    ready: Notify,
}

impl Lane {
    fn lock(&self) -> MutexGuard<'_, LaneState> {
        // Critical sections only touch the maps, so a poisoned lock is still consistent
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Fixed pool of event lanes keyed by pod UID
///
/// All events for one UID land on the same lane and are consumed in order by
/// that lane's single worker. Dispatch never waits: while an event for a UID
/// is still pending, a newer one replaces it in place. Pending state is
/// therefore bounded by the number of distinct pods, and a lane stuck on a
/// slow delete never holds up the others.
pub struct KeyedWorkQueue {
    lanes: Vec<Arc<Lane>>,
}

impl KeyedWorkQueue {
    /// Create `lanes` lanes, returning the receiving ends in lane order
    pub fn new(lanes: usize) -> (Self, Vec<LaneReceiver>) {
        let lanes: Vec<Arc<Lane>> = (0..lanes.max(1)).map(|_| Arc::default()).collect();
        let receivers = lanes
            .iter()
            .map(|lane| LaneReceiver { lane: lane.clone() })
            .collect();
        (Self { lanes }, receivers)
    }

    pub fn lane_for(&self, uid: &PodUid) -> usize {
        lane_index(uid, self.lanes.len())
    }

    /// Route an event to its lane
    pub fn dispatch(&self, event: PodEvent) -> Result<()> {
        let lane = &self.lanes[self.lane_for(event.uid())];
        {
            let mut state = lane.lock();
            if state.receiver_gone {
                return Err(RuntimeError::ShuttingDown);
            }
            let uid = event.uid().clone();
            if state.pending.insert(uid.clone(), event).is_none() {
                state.order.push_back(uid);
            }
        }
        lane.ready.notify_one();
        Ok(())
    }
}

impl Drop for KeyedWorkQueue {
    fn drop(&mut self) {
        for lane in &self.lanes {
            lane.lock().closed = true;
            lane.ready.notify_one();
        }
    }
}

/// Consuming end of one lane
pub struct LaneReceiver {
    lane: Arc<Lane>,
}

impl LaneReceiver {
    /// Next pending event, or `None` once the queue is dropped and the lane is empty
    pub async fn recv(&mut self) -> Option<PodEvent> {
        loop {
            {
                let mut state = self.lane.lock();
                while let Some(uid) = state.order.pop_front() {
                    if let Some(event) = state.pending.remove(&uid) {
                        return Some(event);
                    }
                }
                if state.closed {
                    return None;
                }
            }
            // Single consumer, so a notify_one between the check and here leaves a permit
            self.lane.ready.notified().await;
        }
    }
}

impl Drop for LaneReceiver {
    fn drop(&mut self) {
        self.lane.lock().receiver_gone = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use podmender_core::PodSnapshot;
    use std::collections::BTreeMap;
    use std::time::Duration;

    fn applied(uid: &str, name: &str) -> PodEvent {
        PodEvent::Applied(PodSnapshot {
            uid: PodUid::new(uid),
            name: name.to_string(),
            namespace: "default".to_string(),
            labels: BTreeMap::new(),
            annotations: BTreeMap::new(),
            node_name: None,
            init_container_statuses: vec![],
            container_statuses: vec![],
        })
    }

    #[test]
    fn test_lane_index_is_stable_and_in_range() {
        for i in 0..100 {
            let uid = PodUid::new(format!("uid-{}", i));
            let lane = lane_index(&uid, 4);
            assert!(lane < 4);
            assert_eq!(lane, lane_index(&uid, 4));
        }
        assert_eq!(lane_index(&PodUid::new("x"), 0), 0);
    }

    #[tokio::test]
    async fn test_events_stay_on_their_lane_in_order() {
        let (queue, mut receivers) = KeyedWorkQueue::new(1);
        queue.dispatch(applied("uid-1", "first")).unwrap();
        queue.dispatch(applied("uid-2", "second")).unwrap();
        queue.dispatch(PodEvent::Deleted(PodUid::new("uid-3"))).unwrap();
        drop(queue);

        let rx = &mut receivers[0];
        let mut seen = Vec::new();
        while let Some(event) = rx.recv().await {
            seen.push(event.uid().to_string());
        }
        assert_eq!(seen, vec!["uid-1", "uid-2", "uid-3"]);
    }

    #[tokio::test]
    async fn test_same_uid_lands_on_one_lane_only() {
        let (queue, mut receivers) = KeyedWorkQueue::new(3);
        let uid = PodUid::new("uid-1");
        let lane = queue.lane_for(&uid);

        queue.dispatch(PodEvent::Deleted(uid.clone())).unwrap();
        drop(queue);

        assert_eq!(receivers[lane].recv().await.unwrap().uid(), &uid);
        for (i, rx) in receivers.iter_mut().enumerate() {
            assert!(rx.recv().await.is_none(), "lane {} should be drained", i);
        }
    }

    #[tokio::test]
    async fn test_pending_event_is_replaced_by_newer_one() {
        let (queue, mut receivers) = KeyedWorkQueue::new(1);
        for name in ["old", "older-status", "latest"] {
            queue.dispatch(applied("uid-1", name)).unwrap();
        }
        queue.dispatch(applied("uid-2", "other")).unwrap();
        drop(queue);

        let rx = &mut receivers[0];
        let Some(PodEvent::Applied(first)) = rx.recv().await else {
            panic!("expected applied event");
        };
        assert_eq!(first.name, "latest");
        assert_eq!(rx.recv().await.unwrap().uid(), &PodUid::new("uid-2"));
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_receiver_wakes_on_dispatch() {
        let (queue, mut receivers) = KeyedWorkQueue::new(1);
        let mut rx = receivers.remove(0);
        let consumer = tokio::spawn(async move { rx.recv().await });

        tokio::time::sleep(Duration::from_millis(20)).await;
        queue.dispatch(PodEvent::Deleted(PodUid::new("uid-1"))).unwrap();

        let event = tokio::time::timeout(Duration::from_secs(5), consumer)
            .await
            .expect("receiver should wake")
            .unwrap();
        assert_eq!(event.unwrap().uid(), &PodUid::new("uid-1"));
    }

    #[test]
    fn test_dispatch_after_receivers_dropped() {
        let (queue, receivers) = KeyedWorkQueue::new(1);
        drop(receivers);
        let err = queue
            .dispatch(PodEvent::Deleted(PodUid::new("uid-1")))
            .unwrap_err();
        assert!(matches!(err, RuntimeError::ShuttingDown));
    }
}

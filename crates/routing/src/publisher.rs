//! Atomic routing table publication
//!
//! The current table sits in a `tokio::sync::watch` channel. Publishing
//! replaces the whole `Arc<RoutingTable>` in one step, so a reader sees
//! either the previous table or the complete new one. Subscribers wake on
//! `changed()` instead of polling.

use std::sync::Arc;

use tokio::sync::watch;

use crate::table::RoutingTable;

/// Write side of the routing table channel
#[derive(Debug, Clone)]
pub struct RoutingTablePublisher {
    sender: Arc<watch::Sender<Arc<RoutingTable>>>,
}

impl Default for RoutingTablePublisher {
    fn default() -> Self {
        Self::new()
    }
}

impl RoutingTablePublisher {
    /// Create a publisher holding an empty generation-0 table
    #[must_use]
    pub fn new() -> Self {
        let (sender, _) = watch::channel(Arc::new(RoutingTable::new()));
        Self {
            sender: Arc::new(sender),
        }
    }

    /// Swap in a new table and notify subscribers
    ///
    /// The table is stamped with the next generation number, which is
    /// returned. Reading the previous generation and swapping happen under
    /// the channel's write lock, so concurrent publishers never share one.
    pub fn publish(&self, mut table: RoutingTable) -> u64 {
        let mut generation = 0;
        self.sender.send_modify(|current| {
            generation = current.generation() + 1;
            table.set_generation(generation);
            *current = Arc::new(table);
        });
        generation
    }

    /// Table currently served
    pub fn current(&self) -> Arc<RoutingTable> {
        self.sender.borrow().clone()
    }

    /// Register a reader
    pub fn subscribe(&self) -> RoutingTableSubscriber {
        RoutingTableSubscriber {
            receiver: self.sender.subscribe(),
        }
    }
}

/// Read side of the routing table channel, held by the proxy engine
#[derive(Debug, Clone)]
pub struct RoutingTableSubscriber {
    receiver: watch::Receiver<Arc<RoutingTable>>,
}

impl RoutingTableSubscriber {
    /// Table currently served, marking it seen
    pub fn current(&mut self) -> Arc<RoutingTable> {
        self.receiver.borrow_and_update().clone()
    }

    /// Wait for the next publish
    ///
    /// Returns `false` once every publisher has been dropped.
    pub async fn changed(&mut self) -> bool {
        self.receiver.changed().await.is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use crate::entry::{ClusterEntry, RouteEntry};
    use crate::table::RoutingTableBuilder;

    fn table_for(tenant: &str) -> RoutingTable {
        let mut builder = RoutingTableBuilder::new();
        builder
            .add(
                RouteEntry {
                    route_id: format!("{tenant}-1"),
                    cluster_id: format!("{tenant}-1"),
                    match_path: format!("/{tenant}/{{**catchall}}"),
                    methods: vec!["GET".into()],
                    path_prefix_to_strip: format!("/{tenant}"),
                    cors_policy: "default".into(),
                    auth_policy: "OnlyThirdParties".into(),
                },
                ClusterEntry {
                    cluster_id: format!("{tenant}-1"),
                    backend_address: format!("http://api.{tenant}"),
                    request_timeout: Duration::from_secs(1),
                },
            )
            .unwrap();
        builder.build(0)
    }

    #[test]
    fn test_initial_table_is_empty() {
        let publisher = RoutingTablePublisher::new();
        let table = publisher.current();
        assert!(table.is_empty());
        assert_eq!(table.generation(), 0);
    }

    #[test]
    fn test_publish_increments_generation() {
        let publisher = RoutingTablePublisher::new();
        assert_eq!(publisher.publish(table_for("a")), 1);
        assert_eq!(publisher.publish(table_for("b")), 2);
        assert_eq!(publisher.current().generation(), 2);
        assert_eq!(publisher.current().routes()[0].route_id, "b-1");
    }

    #[test]
    fn test_concurrent_publishers_get_distinct_generations() {
        let publisher = RoutingTablePublisher::new();

        let mut generations: Vec<u64> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..8)
                .map(|t| {
                    let publisher = publisher.clone();
                    scope.spawn(move || {
                        (0..25)
                            .map(|i| publisher.publish(table_for(&format!("t{t}x{i}"))))
                            .collect::<Vec<_>>()
                    })
                })
                .collect();
            handles
                .into_iter()
                .flat_map(|h| h.join().unwrap())
                .collect()
        });

        generations.sort_unstable();
        assert_eq!(generations, (1..=200).collect::<Vec<u64>>());
        assert_eq!(publisher.current().generation(), 200);
    }

    #[test]
    fn test_old_snapshot_survives_publish() {
        let publisher = RoutingTablePublisher::new();
        publisher.publish(table_for("a"));
        let held = publisher.current();

        publisher.publish(table_for("b"));
        assert_eq!(held.routes()[0].route_id, "a-1");
        assert_eq!(publisher.current().routes()[0].route_id, "b-1");
    }

    #[tokio::test]
    async fn test_subscriber_notified() {
        let publisher = RoutingTablePublisher::new();
        let mut subscriber = publisher.subscribe();
        assert_eq!(subscriber.current().generation(), 0);

        let reader = tokio::spawn(async move {
            assert!(subscriber.changed().await);
            subscriber.current()
        });

        publisher.publish(table_for("a"));
        let seen = reader.await.unwrap();
        assert_eq!(seen.generation(), 1);
        assert_eq!(seen.route_count(), 1);
    }

    #[tokio::test]
    async fn test_subscriber_sees_close() {
        let publisher = RoutingTablePublisher::new();
        let mut subscriber = publisher.subscribe();
        drop(publisher);
        assert!(!subscriber.changed().await);
    }
}

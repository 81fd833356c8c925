//! End-to-end ring scenarios.
//!
//! The small rings run on 3 bits with forced identifiers and pools wired
//! together through in-process handles; the wire-level tests route real
//! verbs between pools through a loopback transport.

use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;

use crate::config::RingConfig;
use crate::dht::interval::in_open_closed;
use crate::dht::RingId;
use crate::error::Error;
use crate::error::Result;
use crate::node::NodeHandle;
use crate::node::NodePool;
use crate::storage::MemStore;
use crate::storage::RingStore;
use crate::transport::Request;
use crate::transport::Response;
use crate::transport::Transport;

/// Refuses every exchange. Rings built over directly-registered local
/// handles never reach it.
struct NoTransport;

#[async_trait]
impl Transport for NoTransport {
    async fn exchange(&self, target: SocketAddr, _request: Request) -> Result<Response> {
        Err(Error::Unreachable(target))
    }
}

/// Routes each exchange to the pool registered under the target address.
#[derive(Default)]
struct LoopbackTransport {
    nodes: DashMap<SocketAddr, Arc<NodePool>>,
}

#[async_trait]
impl Transport for LoopbackTransport {
    async fn exchange(&self, target: SocketAddr, request: Request) -> Result<Response> {
        let pool = self
            .nodes
            .get(&target)
            .map(|entry| entry.value().clone())
            .ok_or(Error::Unreachable(target))?;
        pool.serve(request).await
    }
}

fn id3(value: u64) -> RingId {
    RingId::from_u64(value, 3)
}

fn addr_of(id: u64) -> SocketAddr {
    format!("127.0.0.1:{}", 7000 + id).parse().unwrap()
}

/// Pools with forced 3-bit ids, each holding direct handles to all others.
fn build_pools(ids: &[u64]) -> Vec<Arc<NodePool>> {
    let config = RingConfig {
        ring_bit_width: 3,
        ..Default::default()
    };
    let pools: Vec<Arc<NodePool>> = ids
        .iter()
        .map(|&id| {
            NodePool::builder(addr_of(id), Arc::new(NoTransport))
                .config(config.clone())
                .local_id(id3(id))
                .build()
                .unwrap()
        })
        .collect();
    for pool in &pools {
        for other in &pools {
            pool.register(other.local_peer());
        }
    }
    pools
}

/// `0.join(nil)`, then each node joins through the previous one, then
/// every node runs a full fix-fingers pass.
async fn join_in_sequence(pools: &[Arc<NodePool>]) {
    pools[0].local().join(None).await.unwrap();
    for i in 1..pools.len() {
        let gateway = pools[i - 1].local().peer_ref().clone();
        pools[i].local().join(Some(&gateway)).await.unwrap();
    }
    for pool in pools {
        pool.local().fix_all_fingers().await.unwrap();
    }
}

async fn finger_ids(pool: &Arc<NodePool>) -> Vec<RingId> {
    let local = pool.local();
    let mut ids = vec![];
    for i in 1..=local.bits() {
        ids.push(local.finger_node(i).await.unwrap().id);
    }
    ids
}

async fn assert_fingers(pool: &Arc<NodePool>, expected: &[u64]) {
    let expected: Vec<RingId> = expected.iter().map(|&v| id3(v)).collect();
    let actual = finger_ids(pool).await;
    assert_eq!(
        actual,
        expected,
        "finger table of {}",
        pool.local().peer_ref()
    );
}

async fn assert_predecessor(pool: &Arc<NodePool>, expected: u64) {
    let pred = pool.local().predecessor().await.unwrap();
    assert_eq!(
        pred.map(|p| p.id),
        Some(id3(expected)),
        "predecessor of {}",
        pool.local().peer_ref()
    );
}

#[tokio::test]
async fn test_single_node_ring() {
    let pools = build_pools(&[5]);
    pools[0].local().join(None).await.unwrap();

    assert_fingers(&pools[0], &[5, 5, 5]).await;
    assert_predecessor(&pools[0], 5).await;
    let succs = pools[0].local().successor_list().await.unwrap();
    assert_eq!(succs.first().map(|p| p.id.clone()), Some(id3(5)));

    // Every lookup lands on the only member.
    for key in 0u64..8 {
        let owner = pools[0].local().find_successor(&id3(key)).await.unwrap();
        assert_eq!(owner.id, id3(5));
    }
}

#[tokio::test]
async fn test_two_node_join() {
    let pools = build_pools(&[0, 1]);
    join_in_sequence(&pools).await;

    assert_predecessor(&pools[0], 1).await;
    assert_fingers(&pools[0], &[1, 0, 0]).await;
    assert_predecessor(&pools[1], 0).await;
    assert_fingers(&pools[1], &[0, 0, 0]).await;
}

#[tokio::test]
async fn test_three_node_join() {
    let pools = build_pools(&[0, 1, 3]);
    join_in_sequence(&pools).await;

    assert_fingers(&pools[0], &[1, 3, 0]).await;
    assert_predecessor(&pools[0], 3).await;
    assert_fingers(&pools[1], &[3, 3, 0]).await;
    assert_predecessor(&pools[1], 0).await;
    assert_fingers(&pools[2], &[0, 0, 0]).await;
    assert_predecessor(&pools[2], 1).await;
}

#[tokio::test]
async fn test_four_node_join() {
    let pools = build_pools(&[0, 1, 3, 6]);
    join_in_sequence(&pools).await;

    assert_fingers(&pools[0], &[1, 3, 6]).await;
    assert_fingers(&pools[1], &[3, 3, 6]).await;
    assert_fingers(&pools[2], &[6, 6, 0]).await;
    assert_fingers(&pools[3], &[0, 0, 3]).await;

    // Predecessors close the ring 6 -> 0 -> 1 -> 3 -> 6.
    assert_predecessor(&pools[0], 6).await;
    assert_predecessor(&pools[1], 0).await;
    assert_predecessor(&pools[2], 1).await;
    assert_predecessor(&pools[3], 3).await;
}

#[tokio::test]
async fn test_eight_node_ring() {
    let ids: Vec<u64> = (0..8).collect();
    let pools = build_pools(&ids);
    join_in_sequence(&pools).await;

    for (n, pool) in pools.iter().enumerate() {
        let n = n as u64;
        assert_fingers(pool, &[(n + 1) % 8, (n + 2) % 8, (n + 4) % 8]).await;
        assert_predecessor(pool, (n + 7) % 8).await;
    }
}

#[tokio::test]
async fn test_lookup_soundness() {
    let pools = build_pools(&[0, 1, 2, 3, 4, 5, 6, 7]);
    join_in_sequence(&pools).await;

    let probes = [(0usize, 5u64, 5u64), (3, 7, 7), (6, 2, 2)];
    for (from, key, owner) in probes {
        let found = pools[from].local().find_successor(&id3(key)).await.unwrap();
        assert_eq!(found.id, id3(owner), "{}.find_successor({})", from, key);
    }

    // Full ring: every key resolves to itself from every node.
    for pool in &pools {
        for key in 0u64..8 {
            let found = pool.local().find_successor(&id3(key)).await.unwrap();
            assert_eq!(found.id, id3(key));
        }
    }
}

#[tokio::test]
async fn test_lookup_from_sparse_ring() {
    let pools = build_pools(&[0, 1, 3, 6]);
    join_in_sequence(&pools).await;

    // The successor of a key is the smallest member id at or after it.
    let owners = [0u64, 1, 3, 3, 6, 6, 6, 0];
    for pool in &pools {
        for (key, owner) in owners.iter().enumerate() {
            let found = pool
                .local()
                .find_successor(&id3(key as u64))
                .await
                .unwrap();
            assert_eq!(found.id, id3(*owner), "key {key}");
        }
    }
}

#[tokio::test]
async fn test_successor_correctness_after_stabilization() {
    let pools = build_pools(&[0, 1, 3, 6]);
    join_in_sequence(&pools).await;

    for _ in 0..3 {
        for pool in &pools {
            pool.local().stabilize().await.unwrap();
        }
    }

    for pool in &pools {
        let local = pool.local();
        let succ = local.successor().await.unwrap();
        let pred = local.predecessor().await.unwrap().unwrap();

        // Our successor's predecessor is us.
        let succ_handle = pool.get(succ.addr).unwrap();
        let back = succ_handle.predecessor().await.unwrap().unwrap();
        assert_eq!(&back.id, local.id());

        // We sit inside (predecessor, successor].
        assert!(in_open_closed(&pred.id, &succ.id, local.id()));
    }
}

#[tokio::test]
async fn test_failure_and_repair() {
    let ids: Vec<u64> = (0..8).collect();
    let pools = build_pools(&ids);
    join_in_sequence(&pools).await;

    // Node 2 dies; every survivor drops it from its pool, then runs one
    // maintenance tick.
    let dead = addr_of(2);
    let survivors: Vec<(u64, &Arc<NodePool>)> = pools
        .iter()
        .enumerate()
        .filter(|(n, _)| *n != 2)
        .map(|(n, p)| (n as u64, p))
        .collect();
    for (_, pool) in &survivors {
        pool.remove(dead);
    }
    for (_, pool) in &survivors {
        pool.tick().await;
    }

    let gone = id3(2);
    for (n, pool) in &survivors {
        let local = pool.local();
        for i in 1..=local.bits() {
            assert_ne!(local.finger_node(i).await.unwrap().id, gone);
        }
        let succs = local.successor_list().await.unwrap();
        assert!(succs.iter().all(|p| p.id != gone));
        let pred = local.predecessor().await.unwrap();
        assert_ne!(pred.map(|p| p.id), Some(gone.clone()));

        // The successor is the next surviving id on the ring.
        let next = (n + 1) % 8;
        let expected = if next == 2 { 3 } else { next };
        assert_eq!(
            local.successor().await.unwrap().id,
            id3(expected),
            "successor of {n}"
        );
    }
}

#[tokio::test]
async fn test_join_over_loopback_wire_migrates_keys() {
    // Two full-width nodes talking through real verbs.
    let loopback = Arc::new(LoopbackTransport::default());
    let addr_a: SocketAddr = "127.0.0.1:7101".parse().unwrap();
    let addr_b: SocketAddr = "127.0.0.1:7102".parse().unwrap();

    let store_a = Arc::new(MemStore::new());
    let store_b = Arc::new(MemStore::new());
    let pool_a = NodePool::builder(addr_a, loopback.clone())
        .store(store_a.clone())
        .build()
        .unwrap();
    let pool_b = NodePool::builder(addr_b, loopback.clone())
        .store(store_b.clone())
        .build()
        .unwrap();
    loopback.nodes.insert(addr_a, pool_a.clone());
    loopback.nodes.insert(addr_b, pool_b.clone());

    pool_a.local().join(None).await.unwrap();

    // Seed node A with one key it owns and one that will belong to B.
    let key_a = pool_a.local().id().clone();
    let key_b = pool_b.local().id().clone();
    store_a.set(&key_a, b"kept".to_vec()).await.unwrap();
    store_a.set(&key_b, b"moved".to_vec()).await.unwrap();

    let gateway = pool_a.local().peer_ref().clone();
    pool_b.local().join(Some(&gateway)).await.unwrap();

    // The two nodes are mutual neighbours now.
    let succ_of_b = pool_b.local().successor().await.unwrap();
    assert_eq!(succ_of_b.addr, addr_a);
    let succ_of_a = pool_a.local().successor().await.unwrap();
    assert_eq!(succ_of_a.addr, addr_b);
    let pred_of_a = pool_a.local().predecessor().await.unwrap().unwrap();
    assert_eq!(pred_of_a.addr, addr_b);

    // B pulled its key range during the join.
    assert_eq!(store_b.get(&key_b).await.unwrap(), Some(b"moved".to_vec()));
    assert_eq!(store_b.get(&key_a).await.unwrap(), None);
    assert_eq!(store_a.get(&key_a).await.unwrap(), Some(b"kept".to_vec()));

    // A prunes the migrated key on its next maintenance round.
    pool_a.local().prune_keys().await.unwrap();
    assert_eq!(store_a.get(&key_b).await.unwrap(), None);
}

#[tokio::test]
async fn test_disassociate_verb_over_loopback_wire() {
    let loopback = Arc::new(LoopbackTransport::default());
    let addr_a: SocketAddr = "127.0.0.1:7111".parse().unwrap();
    let addr_b: SocketAddr = "127.0.0.1:7112".parse().unwrap();

    let pool_a = NodePool::builder(addr_a, loopback.clone()).build().unwrap();
    let pool_b = NodePool::builder(addr_b, loopback.clone()).build().unwrap();
    loopback.nodes.insert(addr_a, pool_a.clone());
    loopback.nodes.insert(addr_b, pool_b.clone());

    pool_a.local().join(None).await.unwrap();
    let gateway = pool_a.local().peer_ref().clone();
    pool_b.local().join(Some(&gateway)).await.unwrap();

    // A third party died; A announces it to B over the wire.
    let ghost = RingId::from_bytes(b"127.0.0.1:7113", 160);
    let phantom = crate::dht::PeerRef::new(ghost.clone(), "127.0.0.1:7113".parse().unwrap());
    pool_b.local().set_finger_node(3, &phantom).await.unwrap();

    let crate::node::Peer::Remote(b_handle) = pool_a.get_or_create_addr(addr_b) else {
        panic!("expected a remote handle");
    };
    b_handle.disassociate(&ghost).await.unwrap();

    let row = pool_b.local().finger_node(3).await.unwrap();
    assert_ne!(row.id, ghost);
}

#[tokio::test(start_paused = true)]
async fn test_remote_deadline_revokes_peer() {
    /// Never answers inside any deadline.
    struct StalledTransport;

    #[async_trait]
    impl Transport for StalledTransport {
        async fn exchange(&self, _target: SocketAddr, _request: Request) -> Result<Response> {
            tokio::time::sleep(std::time::Duration::from_secs(3600)).await;
            Ok(Response::Ack)
        }
    }

    let pool = NodePool::builder("127.0.0.1:7201".parse().unwrap(), Arc::new(StalledTransport))
        .build()
        .unwrap();
    pool.local().join(None).await.unwrap();

    let peer_addr: SocketAddr = "127.0.0.1:7202".parse().unwrap();
    let peer = pool.get_or_create_addr(peer_addr);
    let result = peer.successor().await;
    assert!(matches!(result, Err(Error::Timeout(_))));

    // The mailbox task reports the failure to the pool.
    for _ in 0..32 {
        if pool.get(peer_addr).is_none() {
            break;
        }
        tokio::task::yield_now().await;
    }
    assert!(pool.get(peer_addr).is_none());

    // The revoked handle refuses further work without touching the wire.
    let result = peer.successor().await;
    assert!(matches!(result, Err(Error::Unreachable(_))));
}

#[tokio::test]
async fn test_unreachable_peer_is_disassociated() {
    let pool = NodePool::builder("127.0.0.1:7301".parse().unwrap(), Arc::new(NoTransport))
        .build()
        .unwrap();
    pool.local().join(None).await.unwrap();

    // Plant the doomed peer in the routing tables.
    let peer_addr: SocketAddr = "127.0.0.1:7302".parse().unwrap();
    let peer = pool.get_or_create_addr(peer_addr);
    let peer_ref = peer.peer_ref();
    pool.local().set_finger_node(2, &peer_ref).await.unwrap();

    let result = peer.successor().await;
    assert!(matches!(result, Err(Error::Unreachable(_))));

    for _ in 0..32 {
        if pool.get(peer_addr).is_none() {
            break;
        }
        tokio::task::yield_now().await;
    }
    assert!(pool.get(peer_addr).is_none());

    // Disassociation wiped the planted finger; the row falls back to self.
    let row = pool.local().finger_node(2).await.unwrap();
    assert_ne!(row.id, peer_ref.id);
}

#[tokio::test]
async fn test_serve_validates_finger_index() {
    let pool = NodePool::builder("127.0.0.1:7401".parse().unwrap(), Arc::new(NoTransport))
        .build()
        .unwrap();
    pool.local().join(None).await.unwrap();

    let result = pool.serve(Request::GetFingerNode(0)).await;
    assert!(matches!(result, Err(Error::IndexOutOfRange { .. })));
    let result = pool.serve(Request::GetFingerNode(161)).await;
    assert!(matches!(result, Err(Error::IndexOutOfRange { .. })));
    let result = pool.serve(Request::GetFingerNode(1)).await;
    assert!(matches!(result, Ok(Response::Addr(_))));

    let result = pool.serve(Request::SetSuccessorList(vec![])).await;
    assert!(matches!(result, Err(Error::InvariantViolated(_))));
}

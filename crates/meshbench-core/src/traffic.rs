//! Traffic generation: who sends to whom, and how fast.
//!
//! Every node is the source of exactly one constant-bit-rate flow towards a randomly chosen
//! peer. The aggregate offered load is split evenly across flows, regardless of topology.

use std::net::Ipv4Addr;

use rand::Rng;

use crate::{
    engine::NodeId,
    units::{BitsPerSec, Bytes, Nanosecs},
};

identifier!(
    /// A flow, numbered by its source node's position.
    FlowId,
    usize
);

/// Assigns a destination to every node in `[0, node_count)`.
///
/// For node `i`, a uniformly distributed integer in `[0, node_count - 1]` is drawn until it
/// differs from `i`. Peers are neither symmetric nor unique: several nodes may pick the same
/// peer and some nodes may receive no flow at all.
///
/// Returns an error if `node_count < 2`, for which no valid assignment exists.
pub fn assign_peers<R>(node_count: usize, rng: &mut R) -> Result<Vec<NodeId>, TrafficError>
where
    R: Rng + ?Sized,
{
    if node_count < 2 {
        return Err(TrafficError::TooFewNodes(node_count));
    }
    let peers = (0..node_count)
        .map(|i| loop {
            let peer = rng.gen_range(0..node_count);
            if peer != i {
                break NodeId::new(peer);
            }
        })
        .collect();
    Ok(peers)
}

/// Per-flow send rate: `(intensity * network_rate) / node_count`.
///
/// This divides the target aggregate load evenly; it says nothing about the throughput the
/// network will actually achieve. `intensity` is not range-checked. Negative or NaN results
/// become zero, and a zero `node_count` yields zero.
pub fn flow_rate(intensity: f64, network_rate: BitsPerSec, node_count: usize) -> BitsPerSec {
    if node_count == 0 {
        return BitsPerSec::ZERO;
    }
    BitsPerSec::from_f64_saturating((intensity * network_rate.into_f64()) / node_count as f64)
}

/// A constant-bit-rate flow from `src` to the sink at `dst_addr:port` on `dst`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct FlowSpec {
    pub id: FlowId,
    pub src: NodeId,
    pub dst: NodeId,
    pub dst_addr: Ipv4Addr,
    pub port: u16,
    pub rate: BitsPerSec,
    pub packet_size: Bytes,
    pub start: Nanosecs,
    pub stop: Nanosecs,
}

impl FlowSpec {
    /// Time between consecutive packets, or `None` if the flow never sends.
    pub fn interval(&self) -> Option<Nanosecs> {
        self.rate
            .transmission_time(self.packet_size)
            .filter(|&interval| interval > Nanosecs::ZERO)
    }

    /// The instants at which the source hands a packet to the network.
    ///
    /// The first packet leaves one interval after `start`; the last one strictly before `stop`.
    pub fn send_times(&self) -> impl Iterator<Item = Nanosecs> + '_ {
        let interval = self.interval();
        (1u64..)
            .map_while(move |k| {
                let offset = interval?.into_u64().checked_mul(k)?;
                self.start.into_u64().checked_add(offset).map(Nanosecs::new)
            })
            .take_while(move |&t| t < self.stop)
    }

    /// The number of packets the source will send.
    pub fn nr_packets(&self) -> u64 {
        match self.interval() {
            Some(interval) if self.stop > self.start => {
                let span = (self.stop - self.start).into_u64();
                // Packets at start + k * interval for k >= 1, strictly before stop.
                (span - 1) / interval.into_u64()
            }
            _ => 0,
        }
    }
}

/// Builds one flow per node, from node `i` to `peers[i]`.
///
/// `nodes` and `addrs` are indexed by node position; `peers` holds positions into them.
///
/// Fails if the template's rate is so high that packets would be less than a nanosecond apart.
pub fn build_flows(
    nodes: &[NodeId],
    addrs: &[Ipv4Addr],
    peers: &[NodeId],
    template: FlowTemplate,
) -> Result<Vec<FlowSpec>, TrafficError> {
    if nodes.len() != peers.len() || addrs.len() != nodes.len() {
        return Err(TrafficError::LengthMismatch {
            nodes: nodes.len(),
            addrs: addrs.len(),
            peers: peers.len(),
        });
    }
    // CORRECTNESS: A sending flow needs a nonzero gap between packets.
    if template.rate.transmission_time(template.packet_size) == Some(Nanosecs::ZERO) {
        return Err(TrafficError::RateTooHigh {
            rate: template.rate,
            packet_size: template.packet_size,
        });
    }
    peers
        .iter()
        .enumerate()
        .map(|(i, &peer)| {
            let j = peer.inner();
            let (&dst, &dst_addr) = nodes
                .get(j)
                .zip(addrs.get(j))
                .ok_or(TrafficError::InvalidPeer { src: nodes[i], peer })?;
            Ok(FlowSpec {
                id: FlowId::new(i),
                src: nodes[i],
                dst,
                dst_addr,
                port: template.port,
                rate: template.rate,
                packet_size: template.packet_size,
                start: template.start,
                stop: template.stop,
            })
        })
        .collect()
}

/// The parameters shared by every flow of an experiment.
#[derive(Debug, Clone, Copy, typed_builder::TypedBuilder)]
pub struct FlowTemplate {
    pub rate: BitsPerSec,
    pub packet_size: Bytes,
    #[builder(default = crate::constants::SINK_PORT)]
    pub port: u16,
    #[builder(default)]
    pub start: Nanosecs,
    pub stop: Nanosecs,
}

/// Traffic generation error.
#[derive(Debug, thiserror::Error)]
pub enum TrafficError {
    /// Fewer than two nodes, so some node cannot pick a peer other than itself.
    #[error("nodeCount must be >= 2 (got {0})")]
    TooFewNodes(usize),

    /// A peer index is out of range.
    #[error("node {src} was assigned nonexistent peer {peer}")]
    InvalidPeer { src: NodeId, peer: NodeId },

    /// The per-flow rate sends packets of this size less than a nanosecond apart.
    #[error("a flow rate of {rate} sends {packet_size} packets less than 1ns apart")]
    RateTooHigh { rate: BitsPerSec, packet_size: Bytes },

    /// The node, address and peer lists disagree in length.
    #[error("expected equal lengths (nodes: {nodes}, addresses: {addrs}, peers: {peers})")]
    LengthMismatch {
        nodes: usize,
        addrs: usize,
        peers: usize,
    },
}

#[cfg(test)]
mod tests {
    use rand::{rngs::StdRng, SeedableRng};

    use super::*;

    #[test]
    fn peers_never_self() {
        let mut rng = StdRng::seed_from_u64(0);
        for node_count in 2..50 {
            let peers = assign_peers(node_count, &mut rng).unwrap();
            assert_eq!(peers.len(), node_count);
            for (i, peer) in peers.iter().enumerate() {
                assert_ne!(peer.inner(), i, "node {i} paired with itself");
                assert!(peer.inner() < node_count);
            }
        }
    }

    #[test]
    fn two_nodes_pair_with_each_other() {
        let mut rng = StdRng::seed_from_u64(42);
        let peers = assign_peers(2, &mut rng).unwrap();
        assert_eq!(peers, vec![NodeId::new(1), NodeId::new(0)]);
    }

    #[test]
    fn peers_are_deterministic() {
        let a = assign_peers(20, &mut StdRng::seed_from_u64(7)).unwrap();
        let b = assign_peers(20, &mut StdRng::seed_from_u64(7)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn degenerate_node_counts_fail() {
        let mut rng = StdRng::seed_from_u64(0);
        assert!(matches!(
            assign_peers(1, &mut rng),
            Err(TrafficError::TooFewNodes(1))
        ));
        assert!(matches!(
            assign_peers(0, &mut rng),
            Err(TrafficError::TooFewNodes(0))
        ));
    }

    #[test]
    fn default_flow_rate() {
        let rate = flow_rate(0.1, BitsPerSec::new(1_000_000), 20);
        assert_eq!(rate, BitsPerSec::new(5_000));
    }

    #[test]
    fn flow_rate_monotone_in_intensity() {
        let network_rate = BitsPerSec::new(1_000_000);
        let mut prev = BitsPerSec::ZERO;
        for step in 0..=100 {
            let rate = flow_rate(step as f64 / 100.0, network_rate, 17);
            assert!(rate >= prev);
            prev = rate;
        }
    }

    #[test]
    fn flow_rate_monotone_in_node_count() {
        let network_rate = BitsPerSec::new(1_000_000);
        let mut prev = BitsPerSec::MAX;
        for node_count in 1..200 {
            let rate = flow_rate(0.3, network_rate, node_count);
            assert!(rate <= prev);
            prev = rate;
        }
    }

    #[test]
    fn out_of_range_intensity_is_not_clamped() {
        let network_rate = BitsPerSec::new(1_000_000);
        assert_eq!(flow_rate(2.0, network_rate, 10), BitsPerSec::new(200_000));
        assert_eq!(flow_rate(-0.5, network_rate, 10), BitsPerSec::ZERO);
        assert_eq!(flow_rate(0.5, network_rate, 0), BitsPerSec::ZERO);
    }

    fn flow(rate: u64, stop: Nanosecs) -> FlowSpec {
        FlowSpec {
            id: FlowId::ZERO,
            src: NodeId::ZERO,
            dst: NodeId::ONE,
            dst_addr: Ipv4Addr::new(10, 0, 0, 2),
            port: 9,
            rate: BitsPerSec::new(rate),
            packet_size: Bytes::new(32),
            start: Nanosecs::ZERO,
            stop,
        }
    }

    #[test]
    fn send_times_stay_inside_the_window() {
        let f = flow(5_000, Nanosecs::from_secs(5));
        let times = f.send_times().collect::<Vec<_>>();
        // 51.2 ms apart: 97 packets before 5 s
        assert_eq!(times.len(), 97);
        assert_eq!(f.nr_packets(), 97);
        assert_eq!(times[0], Nanosecs::from_micros(51_200));
        assert!(*times.last().unwrap() < Nanosecs::from_secs(5));
    }

    #[test]
    fn packet_exactly_at_stop_is_not_sent() {
        // 256 bits at 256 bps: one packet per second
        let f = flow(256, Nanosecs::from_secs(3));
        assert_eq!(f.send_times().count(), 2);
        assert_eq!(f.nr_packets(), 2);
    }

    #[test]
    fn silent_flows_send_nothing() {
        let f = flow(0, Nanosecs::from_secs(5));
        assert_eq!(f.interval(), None);
        assert_eq!(f.send_times().count(), 0);
        assert_eq!(f.nr_packets(), 0);
        let f = flow(5_000, Nanosecs::ZERO);
        assert_eq!(f.send_times().count(), 0);
        assert_eq!(f.nr_packets(), 0);
    }

    #[test]
    fn sub_nanosecond_intervals_are_rejected() {
        let nodes = [NodeId::new(0), NodeId::new(1)];
        let addrs = [Ipv4Addr::new(10, 0, 0, 1), Ipv4Addr::new(10, 0, 0, 2)];
        let peers = [NodeId::new(1), NodeId::new(0)];
        let template = |rate| {
            FlowTemplate::builder()
                .rate(flow_rate(rate, BitsPerSec::new(1_000_000), 4))
                .packet_size(Bytes::new(32))
                .stop(Nanosecs::from_secs(5))
                .build()
        };
        // 256 bits every 1.024 us
        let flows = build_flows(&nodes, &addrs, &peers, template(1000.0)).unwrap();
        assert_eq!(flows[0].interval(), Some(Nanosecs::new(1_024)));
        assert!(matches!(
            build_flows(&nodes, &addrs, &peers, template(1e12)),
            Err(TrafficError::RateTooHigh { .. })
        ));
    }

    #[test]
    fn flows_follow_peers() {
        let nodes = (0..3).map(NodeId::new).collect::<Vec<_>>();
        let addrs = (1..=3).map(|i| Ipv4Addr::new(10, 0, 0, i)).collect::<Vec<_>>();
        let peers = vec![NodeId::new(2), NodeId::new(0), NodeId::new(0)];
        let template = FlowTemplate::builder()
            .rate(BitsPerSec::new(1_000))
            .packet_size(Bytes::new(32))
            .stop(Nanosecs::from_secs(5))
            .build();
        let flows = build_flows(&nodes, &addrs, &peers, template).unwrap();
        let pairs = flows
            .iter()
            .map(|f| (f.id.inner(), f.src.inner(), f.dst.inner(), f.dst_addr.to_string()))
            .collect::<Vec<_>>();
        insta::assert_yaml_snapshot!(pairs, @r###"
        ---
        - - 0
          - 0
          - 2
          - 10.0.0.3
        - - 1
          - 1
          - 0
          - 10.0.0.1
        - - 2
          - 2
          - 0
          - 10.0.0.1
        "###);
        assert!(flows.iter().all(|f| f.port == 9));
    }

    #[test]
    fn out_of_range_peer_fails() {
        let nodes = vec![NodeId::new(0), NodeId::new(1)];
        let addrs = vec![Ipv4Addr::new(10, 0, 0, 1), Ipv4Addr::new(10, 0, 0, 2)];
        let peers = vec![NodeId::new(1), NodeId::new(5)];
        let template = FlowTemplate::builder()
            .rate(BitsPerSec::new(1_000))
            .packet_size(Bytes::new(32))
            .stop(Nanosecs::from_secs(5))
            .build();
        assert!(matches!(
            build_flows(&nodes, &addrs, &peers, template),
            Err(TrafficError::InvalidPeer { .. })
        ));
    }
}

//! Byte accounting on both ends of the experiment's flows.

use crate::{traffic::FlowId, units::Bytes};

/// Observes packets as flow sources hand them to the network.
///
/// Engines call [`TxObserver::on_transmit`] exactly once per packet, sequentially and in
/// nondecreasing simulated time, from the thread that called [`crate::Engine::run`]. The
/// observer is borrowed mutably for the whole run, so it needs no synchronization.
pub trait TxObserver {
    fn on_transmit(&mut self, flow: FlowId, size: Bytes);
}

impl<F> TxObserver for F
where
    F: FnMut(FlowId, Bytes),
{
    fn on_transmit(&mut self, flow: FlowId, size: Bytes) {
        self(flow, size)
    }
}

/// The experiment-wide transmit counter: the sum of every packet any source transmitted.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct TxByteCounter {
    total: Bytes,
    packets: u64,
}

impl TxByteCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn total(&self) -> Bytes {
        self.total
    }

    pub fn packets(&self) -> u64 {
        self.packets
    }
}

impl TxObserver for TxByteCounter {
    fn on_transmit(&mut self, _: FlowId, size: Bytes) {
        self.total += size;
        self.packets += 1;
    }
}

/// Fans one transmit event out to two observers, in order.
#[derive(Debug)]
pub struct Tee<A, B>(pub A, pub B);

impl<A: TxObserver, B: TxObserver> TxObserver for Tee<A, B> {
    fn on_transmit(&mut self, flow: FlowId, size: Bytes) {
        self.0.on_transmit(flow, size);
        self.1.on_transmit(flow, size);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counter_starts_at_zero() {
        let counter = TxByteCounter::new();
        assert_eq!(counter.total(), Bytes::ZERO);
        assert_eq!(counter.packets(), 0);
    }

    #[test]
    fn counter_sums_every_flow() {
        let mut counter = TxByteCounter::new();
        for flow in 0..4 {
            for _ in 0..10 {
                counter.on_transmit(FlowId::new(flow), Bytes::new(32));
            }
        }
        assert_eq!(counter.total(), Bytes::new(1280));
        assert_eq!(counter.packets(), 40);
    }

    #[test]
    fn closures_observe() {
        let mut seen = Vec::new();
        let mut observer = |flow: FlowId, size: Bytes| seen.push((flow, size));
        observer.on_transmit(FlowId::new(3), Bytes::new(32));
        observer.on_transmit(FlowId::new(1), Bytes::new(64));
        assert_eq!(
            seen,
            vec![
                (FlowId::new(3), Bytes::new(32)),
                (FlowId::new(1), Bytes::new(64))
            ]
        );
    }

    #[test]
    fn tee_feeds_both() {
        let mut packets = 0;
        let mut tee = Tee(TxByteCounter::new(), |_: FlowId, _: Bytes| packets += 1);
        tee.on_transmit(FlowId::ZERO, Bytes::new(10));
        tee.on_transmit(FlowId::ONE, Bytes::new(20));
        assert_eq!(tee.0.total(), Bytes::new(30));
        drop(tee);
        assert_eq!(packets, 2);
    }
}

use std::fmt;

/// Why a packet never reached its sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DropReason {
    /// No usable route at a node.
    NoRoute,
    /// A transmit queue was full.
    QueueOverflow,
    /// The route discovery buffer was full.
    BufferOverflow,
    /// Route discovery gave up.
    DiscoveryFailed,
    /// The hop limit was reached.
    TtlExpired,
    /// Still queued, buffered or on the air when the run stopped.
    InFlight,
}

/// Packet drops by reason.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct Drops {
    pub no_route: u64,
    pub queue_overflow: u64,
    pub buffer_overflow: u64,
    pub discovery_failed: u64,
    pub ttl_expired: u64,
    pub in_flight: u64,
}

impl Drops {
    pub fn record(&mut self, reason: DropReason) {
        self.add(reason, 1);
    }

    pub fn add(&mut self, reason: DropReason, n: u64) {
        let counter = match reason {
            DropReason::NoRoute => &mut self.no_route,
            DropReason::QueueOverflow => &mut self.queue_overflow,
            DropReason::BufferOverflow => &mut self.buffer_overflow,
            DropReason::DiscoveryFailed => &mut self.discovery_failed,
            DropReason::TtlExpired => &mut self.ttl_expired,
            DropReason::InFlight => &mut self.in_flight,
        };
        *counter += n;
    }

    pub fn total(&self) -> u64 {
        self.no_route
            + self.queue_overflow
            + self.buffer_overflow
            + self.discovery_failed
            + self.ttl_expired
            + self.in_flight
    }
}

/// Packet counters for one run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct Stats {
    /// Packets handed to the network by sources.
    pub generated: u64,
    /// Packets that reached their sink.
    pub delivered: u64,
    /// Hop-by-hop transmissions, including the first.
    pub transmissions: u64,
    /// Completed route discoveries.
    pub discoveries: u64,
    pub drops: Drops,
}

impl fmt::Display for Stats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let d = &self.drops;
        write!(
            f,
            "generated {}, delivered {}, transmissions {}, discoveries {}, dropped {} \
            (no route {}, queue overflow {}, buffer overflow {}, discovery failed {}, \
            ttl expired {}, in flight {})",
            self.generated,
            self.delivered,
            self.transmissions,
            self.discoveries,
            d.total(),
            d.no_route,
            d.queue_overflow,
            d.buffer_overflow,
            d.discovery_failed,
            d.ttl_expired,
            d.in_flight,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drops_add_up() {
        let mut drops = Drops::default();
        drops.record(DropReason::NoRoute);
        drops.record(DropReason::NoRoute);
        drops.add(DropReason::InFlight, 5);
        drops.record(DropReason::TtlExpired);
        assert_eq!(drops.no_route, 2);
        assert_eq!(drops.total(), 8);
    }

    #[test]
    fn summary_line() {
        let stats = Stats {
            generated: 10,
            delivered: 7,
            transmissions: 12,
            discoveries: 1,
            drops: Drops {
                queue_overflow: 1,
                in_flight: 2,
                ..Default::default()
            },
        };
        insta::assert_snapshot!(stats.to_string(), @"generated 10, delivered 7, transmissions 12, discoveries 1, dropped 3 (no route 0, queue overflow 1, buffer overflow 0, discovery failed 0, ttl expired 0, in flight 2)");
    }
}

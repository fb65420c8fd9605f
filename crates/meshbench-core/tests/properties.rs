use meshbench_core::{
    random::{Stream, Streams},
    testing::LoopbackEngine,
    traffic,
    units::{BitsPerSec, Bytes, Meters},
    Experiment, Scenario,
};

#[test]
fn peers_are_never_self() -> anyhow::Result<()> {
    for n in 2..40 {
        for seed in 0..25 {
            let mut rng = Streams::new(seed, 1).rng(Stream::Peers);
            let peers = traffic::assign_peers(n, &mut rng)?;
            assert_eq!(peers.len(), n);
            for (i, peer) in peers.iter().enumerate() {
                assert_ne!(peer.inner(), i, "n = {n}, seed = {seed}");
                assert!(peer.inner() < n);
            }
        }
    }
    Ok(())
}

#[test]
fn rate_grows_with_intensity() {
    let capacity = BitsPerSec::new(1_000_000);
    let intensities = [-1.0, 0.0, 0.01, 0.1, 0.5, 1.0, 2.5, 10.0];
    for n in [2, 3, 20, 100] {
        let rates = intensities
            .iter()
            .map(|&i| traffic::flow_rate(i, capacity, n))
            .collect::<Vec<_>>();
        assert!(rates.windows(2).all(|w| w[0] <= w[1]), "{rates:?}");
    }
}

#[test]
fn rate_shrinks_with_node_count() {
    let capacity = BitsPerSec::new(1_000_000);
    for intensity in [0.0, 0.1, 1.0, 3.0] {
        let rates = (2..200)
            .map(|n| traffic::flow_rate(intensity, capacity, n))
            .collect::<Vec<_>>();
        assert!(rates.windows(2).all(|w| w[0] >= w[1]), "{rates:?}");
    }
}

#[test]
fn experiments_are_reusable() -> anyhow::Result<()> {
    let scenario = Scenario::builder()
        .node_count(6)
        .area(Meters::new(300))
        .traffic_intensity(0.25)
        .build();
    let experiment = Experiment::new(scenario)?;
    let a = experiment.run(&mut LoopbackEngine::delivering_every(4))?;
    let b = experiment.run(&mut LoopbackEngine::delivering_every(4))?;
    assert_eq!(a, b);
    assert!(a.rx <= a.tx);
    assert!((0.0..=1.0).contains(&a.efficiency()));
    Ok(())
}

#[test]
fn run_number_changes_the_pairing() -> anyhow::Result<()> {
    let flows = |run| -> anyhow::Result<Vec<_>> {
        let scenario = Scenario::builder().node_count(30).run(run).build();
        let mut engine = LoopbackEngine::lossless();
        Experiment::new(scenario)?.run(&mut engine)?;
        Ok(engine.flows().iter().map(|f| f.dst).collect())
    };
    assert_ne!(flows(1)?, flows(2)?);
    Ok(())
}

#[test]
fn larger_packets_keep_the_offered_load() -> anyhow::Result<()> {
    let tx = |size| -> anyhow::Result<Bytes> {
        let scenario = Scenario::builder()
            .node_count(4)
            .packet_size(Bytes::new(size))
            .build();
        Ok(Experiment::new(scenario)?
            .run(&mut LoopbackEngine::lossless())?
            .tx)
    };
    // 25 kb/s per flow for just under 5 s
    let (small, large) = (tx(32)?, tx(500)?);
    assert!(small.into_u64().abs_diff(large.into_u64()) <= 4 * 500);
    Ok(())
}

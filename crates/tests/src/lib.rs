//! # Integration Tests
//!
//! 集成测试与端到端测试。
//!
//! 负责：
//! - 线格式合约测试
//! - 配置 → 仿真 → 分发 → sink 的端到端测试
//! - TCP transport 往返测试（本地回环）

#[cfg(test)]
mod contract_tests {
    use contracts::{frame_len, ScanConfig, HEADER_LEN, MAGIC, WIRE_VERSION};

    #[test]
    fn test_wire_constants() {
        assert_eq!(&MAGIC, b"LIDR");
        assert_eq!(WIRE_VERSION, 2);
        assert_eq!(HEADER_LEN, 46);
        assert_eq!(frame_len(450), 46 + 1800);
    }

    #[test]
    fn test_default_config_is_already_sane() {
        let (_, adjustments) = ScanConfig::default().sanitized();
        assert!(adjustments.is_empty());
    }
}

#[cfg(test)]
mod e2e_tests {
    use std::collections::HashMap;
    use std::time::Duration;

    use bytes::Bytes;
    use config_loader::{ConfigFormat, ConfigLoader};
    use contracts::{
        decode, peek_frame_len, ScanFrame, ScanMessage, SimBlueprint, SinkConfig, SinkType,
    };
    use dispatcher::{create_dispatcher, TransportEvent};
    use observability::ScanMetricsAggregator;
    use scan_engine::Simulation;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::sync::mpsc;
    use tokio::time::timeout;

    const WAIT: Duration = Duration::from_secs(5);

    /// One sensor at the origin facing a wall 2.9 m ahead
    const SCENE_TOML: &str = r#"
[simulation]
step_hz = 100.0
realtime = false

[[sensors]]
id = "front"
[sensors.scan]
field_of_view_deg = 180.0
scan_rate_hz = 10.0
measurement_rate_hz = 1800.0

[[scene.obstacles]]
id = "wall"
shape = { kind = "box", half_extents = [0.1, 5.0, 1.0] }
[scene.obstacles.transform.location]
x = 3.0
"#;

    fn blueprint(sinks: Vec<SinkConfig>) -> SimBlueprint {
        let mut blueprint = ConfigLoader::load_from_str(SCENE_TOML, ConfigFormat::Toml).unwrap();
        blueprint.sinks = sinks;
        blueprint
    }

    fn sink(name: &str, sink_type: SinkType, params: &[(&str, String)]) -> SinkConfig {
        SinkConfig {
            name: name.to_string(),
            sink_type,
            queue_capacity: 64,
            params: params
                .iter()
                .map(|(k, v)| (k.to_string(), v.clone()))
                .collect::<HashMap<_, _>>(),
        }
    }

    /// Split a byte stream into decoded frames
    fn split_frames(mut buf: &[u8]) -> Vec<ScanMessage> {
        let mut messages = Vec::new();
        while let Some(len) = peek_frame_len(buf) {
            if buf.len() < len {
                break;
            }
            messages.push(decode(&buf[..len]).unwrap());
            buf = &buf[len..];
        }
        messages
    }

    fn assert_wall_ahead(message: &ScanMessage) {
        assert_eq!(message.len(), 180);
        // index 90 points along +x
        assert!(message.angle_at(90).abs() < 1e-5);
        assert!((message.ranges[90] - 2.9).abs() < 1e-3, "range {}", message.ranges[90]);
        // rays pointing sideways miss and are encoded as range_max
        assert_eq!(message.ranges[0], message.range_max);
    }

    /// Config -> Simulation -> Dispatcher -> FileSink (lidr) -> decode
    #[tokio::test]
    async fn test_e2e_file_sink_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let bp = blueprint(vec![
            sink(
                "recorder",
                SinkType::File,
                &[
                    ("base_path", dir.path().display().to_string()),
                    ("format", "lidr".to_string()),
                ],
            ),
            sink("log", SinkType::Log, &[]),
        ]);

        let mut simulation = Simulation::from_blueprint(&bp).unwrap();
        let (scan_tx, scan_rx) = mpsc::channel::<ScanFrame>(64);
        let dispatcher = create_dispatcher(bp.sinks.clone(), scan_rx).await.unwrap();
        let metrics = dispatcher.metrics_handles();
        let handle = dispatcher.spawn();

        let mut aggregator = ScanMetricsAggregator::new();
        let mut produced = Vec::new();
        for _ in 0..50 {
            for frame in simulation.step(bp.simulation.step_dt()).frames {
                aggregator.update(&frame);
                produced.push((frame.sequence, frame.sim_time));
                scan_tx.send(frame).await.unwrap();
            }
        }
        drop(scan_tx);
        timeout(WAIT, handle).await.unwrap().unwrap();

        // first step plus every 0.1s boundary up to 0.5s
        assert_eq!(produced.len(), 6);
        assert!(produced.windows(2).all(|w| w[1].0 == w[0].0 + 1));

        let summary = aggregator.summary();
        assert_eq!(summary.total_scans, 6);
        assert_eq!(summary.total_points, 6 * 180);
        assert_eq!(summary.sensors["front"].last_sequence, produced[5].0);

        for (_, m) in &metrics {
            assert_eq!(m.write_count(), 6);
            assert_eq!(m.failure_count(), 0);
        }

        let bytes = std::fs::read(dir.path().join("front.lidr")).unwrap();
        let messages = split_frames(&bytes);
        assert_eq!(messages.len(), 6);
        for (message, (_, sim_time)) in messages.iter().zip(&produced) {
            assert_wall_ahead(message);
            assert!((message.header.stamp.as_seconds() - sim_time).abs() < 1e-6);
            assert!((message.scan_time - 0.1).abs() < 1e-6);
        }
    }

    /// Frames streamed over TCP; bytes sent back reach the step loop
    #[tokio::test]
    async fn test_e2e_tcp_transport() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let bp = blueprint(vec![sink(
            "stream",
            SinkType::Tcp,
            &[("addr", addr.to_string()), ("reconnect_ms", "50".to_string())],
        )]);

        let mut simulation = Simulation::from_blueprint(&bp).unwrap();
        let (scan_tx, scan_rx) = mpsc::channel::<ScanFrame>(64);
        let mut dispatcher = create_dispatcher(bp.sinks.clone(), scan_rx).await.unwrap();
        let (name, mut events) = dispatcher.take_transport_events().pop().unwrap();
        assert_eq!(name, "stream");
        let handle = dispatcher.spawn();

        let (mut socket, _) = timeout(WAIT, listener.accept()).await.unwrap().unwrap();
        assert_eq!(
            timeout(WAIT, events.recv()).await.unwrap(),
            Some(TransportEvent::Connected)
        );

        // Inbound: server -> transport event -> simulation
        let (inbound_tx, inbound_rx) = mpsc::channel::<Bytes>(8);
        simulation.attach_inbound(inbound_rx);
        socket.write_all(b"ping").await.unwrap();
        match timeout(WAIT, events.recv()).await.unwrap() {
            Some(TransportEvent::BinaryReceived(bytes)) => inbound_tx.send(bytes).await.unwrap(),
            other => panic!("unexpected event: {other:?}"),
        }

        // Outbound: simulation -> dispatcher -> TCP
        let mut sent = 0;
        let mut inbound = Vec::new();
        for _ in 0..30 {
            let report = simulation.step(bp.simulation.step_dt());
            inbound.extend(report.inbound);
            for frame in report.frames {
                scan_tx.send(frame).await.unwrap();
                sent += 1;
            }
        }
        assert_eq!(inbound, vec![Bytes::from_static(b"ping")]);
        assert_eq!(sent, 4);

        let mut received = Vec::new();
        let mut buf = vec![0u8; 4096];
        while split_frames(&received).len() < sent {
            let n = timeout(WAIT, socket.read(&mut buf)).await.unwrap().unwrap();
            assert!(n > 0, "transport closed early");
            received.extend_from_slice(&buf[..n]);
        }

        let messages = split_frames(&received);
        assert_eq!(messages.len(), sent);
        messages.iter().for_each(assert_wall_ahead);

        drop(scan_tx);
        timeout(WAIT, handle).await.unwrap().unwrap();
    }

    /// Push subscribers see each scan before the step returns and can encode it
    #[test]
    fn test_subscriber_receives_scans_synchronously() {
        let bp = blueprint(Vec::new());
        let mut simulation = Simulation::from_blueprint(&bp).unwrap();
        let mut pushed = simulation.sensor_mut("front").unwrap().subscribe(1);

        let mut published = 0;
        for _ in 0..30 {
            let report = simulation.step(bp.simulation.step_dt());
            match report.frames.first() {
                Some(frame) => {
                    let seen = pushed.try_recv().unwrap();
                    assert_eq!(seen.sequence, frame.sequence);
                    assert!(std::sync::Arc::ptr_eq(&seen.scan, &frame.scan));
                    assert_wall_ahead(&decode(&seen.encode()).unwrap());
                    published += 1;
                }
                None => assert!(pushed.try_recv().is_err()),
            }
        }
        assert_eq!(published, 4);

        // an unread subscriber fills up; later scans are counted as dropped
        for _ in 0..20 {
            simulation.step(bp.simulation.step_dt());
        }
        let stats = simulation.sensor("front").unwrap().stats();
        assert_eq!(stats.notifications_dropped, 1);

        drop(pushed);
        for _ in 0..10 {
            simulation.step(bp.simulation.step_dt());
        }
        assert_eq!(simulation.sensor("front").unwrap().stats().notifications_dropped, 1);
    }

    /// Missing environment: scans are skipped without consuming cadence
    #[test]
    fn test_scene_free_simulation_skips() {
        let mut simulation = Simulation::new();
        let sensor = scan_engine::LidarSensor::new(
            "front",
            contracts::ScanConfig::default(),
            simulation.clock(),
        );
        simulation.add_sensor(sensor).unwrap();

        let report = simulation.step(0.01);
        assert!(report.frames.is_empty());
        assert_eq!(report.skipped.len(), 1);

        simulation.set_environment(std::sync::Arc::new(scan_engine::EmptyEnvironment));
        let report = simulation.step(0.01);
        assert_eq!(report.frames.len(), 1);
        assert_eq!(report.frames[0].hits, 0);
    }
}

//! Sensing loop integration tests
//!
//! Runs the periodic sensing task against the simulated sensor and an
//! in-process bus, then checks what reached the bus.

use std::sync::Arc;
use std::time::Duration;

use thrm_common::bus::{LocalBus, MessageBus};
use thrm_common::config::SensingConfig;
use thrm_common::events::BusMessage;
use thrm_sensor::{SensorNode, SimulatedSensor};
use tokio::sync::watch;

fn drain(rx: &mut tokio::sync::broadcast::Receiver<BusMessage>) -> Vec<BusMessage> {
    let mut out = Vec::new();
    while let Ok(msg) = rx.try_recv() {
        out.push(msg);
    }
    out
}

#[tokio::test]
async fn test_run_publishes_until_shutdown() {
    let bus = LocalBus::new(1024);
    let mut rx = bus.subscribe();

    let config = SensingConfig {
        publish_rate_hz: 100.0,
        ..SensingConfig::default()
    };
    let sensor = SimulatedSensor::new(config.pot_max_raw, 0.0);
    let node = SensorNode::new(sensor, Arc::new(bus.clone()), &config);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let handle = tokio::spawn(node.run(shutdown_rx));

    tokio::time::sleep(Duration::from_millis(150)).await;
    shutdown_tx.send(true).unwrap();
    let stats = tokio::time::timeout(Duration::from_secs(2), handle)
        .await
        .expect("sensing loop did not stop")
        .unwrap();

    let messages = drain(&mut rx);
    assert!(stats.published >= 3, "only {} cycles published", stats.published);
    assert_eq!(stats.skipped, 0);

    assert_eq!(messages.first().unwrap().topic, "control/status");
    assert_eq!(messages.first().unwrap().payload, "sensor node online");
    assert_eq!(messages.last().unwrap().payload, "sensor node offline");

    let distances: Vec<f64> = messages
        .iter()
        .filter(|m| m.topic == "sensors/distance")
        .map(|m| m.payload.parse().unwrap())
        .collect();
    let volumes: Vec<f64> = messages
        .iter()
        .filter(|m| m.topic == "sensors/volume")
        .map(|m| m.payload.parse().unwrap())
        .collect();

    assert_eq!(distances.len() as u64, stats.published);
    assert_eq!(volumes.len(), distances.len());
    assert!(volumes.iter().all(|v| (0.0..=1.0).contains(v)));
    assert!(distances.iter().all(|d| d.is_finite() && *d >= 0.0));
}

#[tokio::test]
async fn test_failing_sensor_publishes_no_readings() {
    let bus = LocalBus::new(1024);
    let mut rx = bus.subscribe();

    let config = SensingConfig {
        publish_rate_hz: 100.0,
        ..SensingConfig::default()
    };
    let sensor = SimulatedSensor::new(config.pot_max_raw, 1.0);
    let node = SensorNode::new(sensor, Arc::new(bus.clone()), &config);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let handle = tokio::spawn(node.run(shutdown_rx));

    tokio::time::sleep(Duration::from_millis(80)).await;
    shutdown_tx.send(true).unwrap();
    let stats = handle.await.unwrap();

    assert_eq!(stats.published, 0);
    assert!(stats.skipped >= 1);
    assert!(drain(&mut rx).iter().all(|m| m.topic == "control/status"));
}

#[tokio::test]
async fn test_dropped_shutdown_sender_stops_loop() {
    let bus: Arc<dyn MessageBus> = Arc::new(LocalBus::new(16));
    let config = SensingConfig::default();
    let node = SensorNode::new(SimulatedSensor::new(1023, 0.0), bus, &config);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let handle = tokio::spawn(node.run(shutdown_rx));
    drop(shutdown_tx);

    tokio::time::timeout(Duration::from_secs(2), handle)
        .await
        .expect("sensing loop did not stop")
        .unwrap();
}

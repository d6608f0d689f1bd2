//! Tests for Router module

use super::*;
use crate::command::Command;
use crate::devices::mock::MockBackend;
use crate::error::DeviceError;
use crate::mapping::NoteOffAction;
use std::collections::HashMap;

fn cc(controller: u8, value: Option<u8>) -> Command {
    Command::SendCc { controller, value }
}

fn make_test_mapping() -> MappingTable {
    MappingTable {
        note_on: HashMap::from([(60, cc(10, Some(127)))]),
        note_off: NoteOffAction::Send(cc(11, Some(0))),
        controls: HashMap::from([(7, cc(20, None))]),
    }
}

fn make_test_router() -> (Router, MockBackend) {
    let backend = MockBackend::new(&["Piano"], &["Synth", "Lights"]);
    let router = Router::new(Arc::new(backend.clone()));
    (router, backend)
}

#[tokio::test]
async fn test_stop_when_stopped_is_noop() {
    let (router, _backend) = make_test_router();

    router.stop().await;
    router.stop().await;
    assert!(!router.is_running().await);
}

#[tokio::test]
async fn test_start_twice_is_rejected() {
    let (router, _backend) = make_test_router();

    router.start(0, 0, make_test_mapping()).await.unwrap();
    let err = router.start(0, 1, make_test_mapping()).await.unwrap_err();
    assert!(matches!(err, RouterError::AlreadyRunning));

    // The first session is untouched
    assert_eq!(
        router.active_ports().await,
        Some(("Piano".to_string(), "Synth".to_string()))
    );
    router.stop().await;
}

#[tokio::test]
async fn test_invalid_indices_leave_router_stopped() {
    let (router, backend) = make_test_router();

    let err = router.start(1, 0, make_test_mapping()).await.unwrap_err();
    assert!(matches!(
        err,
        RouterError::InvalidDeviceIndex {
            direction: PortDirection::Input,
            index: 1,
            available: 1
        }
    ));

    let err = router.start(0, 2, make_test_mapping()).await.unwrap_err();
    assert!(matches!(
        err,
        RouterError::InvalidDeviceIndex {
            direction: PortDirection::Output,
            index: 2,
            available: 2
        }
    ));

    assert!(!router.is_running().await);
    let state = backend.state.lock();
    assert!(!state.input_open && !state.output_open);
}

#[tokio::test]
async fn test_failed_input_open_closes_output() {
    let (router, backend) = make_test_router();
    backend.state.lock().fail_input = true;

    let err = router.start(0, 0, make_test_mapping()).await.unwrap_err();
    assert!(matches!(err, RouterError::DeviceOpen(DeviceError::Open { .. })));
    assert!(!router.is_running().await);
    assert!(!backend.state.lock().output_open);

    // Recovers once the device is available again
    backend.state.lock().fail_input = false;
    router.start(0, 0, make_test_mapping()).await.unwrap();
    assert!(router.is_running().await);
    router.stop().await;
}

#[tokio::test]
async fn test_failed_output_open_is_reported() {
    let (router, backend) = make_test_router();
    backend.state.lock().fail_output = true;

    let err = router.start(0, 0, make_test_mapping()).await.unwrap_err();
    assert!(matches!(err, RouterError::DeviceOpen(_)));
    assert!(!router.is_running().await);
    assert!(!backend.state.lock().input_open);
}

#[tokio::test]
async fn test_routes_frames_in_order() {
    let (router, backend) = make_test_router();
    router.start(0, 0, make_test_mapping()).await.unwrap();

    assert!(backend.inject(&[0x90, 60, 100])); // mapped note on
    assert!(backend.inject(&[0x90, 61, 100])); // unmapped note
    assert!(backend.inject(&[0x90, 60, 0])); // zero velocity release
    assert!(backend.inject(&[0x80, 60, 64])); // note off
    assert!(backend.inject(&[0xB0, 7, 99])); // forwarded controller
    assert!(backend.inject(&[0xB0, 7])); // short frame
    assert!(backend.inject(&[0xE0, 0, 64])); // pitch bend is not routed

    // Stop drains everything queued before closing the output
    router.stop().await;

    assert_eq!(
        backend.sent(),
        vec![
            vec![0xB0, 10, 127],
            vec![0xB0, 11, 0],
            vec![0xB0, 11, 0],
            vec![0xB0, 20, 99],
        ]
    );
    let state = backend.state.lock();
    assert!(!state.input_open && !state.output_open);
}

#[tokio::test]
async fn test_no_delivery_after_stop() {
    let (router, backend) = make_test_router();
    router.start(0, 0, make_test_mapping()).await.unwrap();
    router.stop().await;

    assert!(!backend.inject(&[0x90, 60, 100]));
    assert!(backend.sent().is_empty());
}

#[tokio::test]
async fn test_send_failure_does_not_stop_routing() {
    let (router, backend) = make_test_router();
    router.start(0, 0, make_test_mapping()).await.unwrap();

    backend.state.lock().fail_send = true;
    backend.inject(&[0x90, 60, 100]);
    // Let the worker reach the failing write before the output recovers
    while backend.state.lock().failed_sends == 0 {
        tokio::task::yield_now().await;
    }
    backend.state.lock().fail_send = false;
    backend.inject(&[0xB0, 7, 5]);

    router.stop().await;
    assert_eq!(backend.sent(), vec![vec![0xB0, 20, 5]]);
}

#[tokio::test]
async fn test_restart_with_new_mapping() {
    let (router, backend) = make_test_router();

    router.start(0, 0, make_test_mapping()).await.unwrap();
    backend.inject(&[0x90, 60, 100]);
    router.stop().await;

    let mapping = MappingTable {
        note_on: HashMap::from([(60, cc(1, Some(1)))]),
        ..Default::default()
    };
    router.start(0, 1, mapping).await.unwrap();
    assert_eq!(
        router.active_ports().await,
        Some(("Piano".to_string(), "Lights".to_string()))
    );
    backend.inject(&[0x90, 60, 100]);
    backend.inject(&[0x80, 60, 0]); // no note off action in this mapping
    router.stop().await;

    assert_eq!(backend.sent(), vec![vec![0xB0, 10, 127], vec![0xB0, 1, 1]]);
}

#[tokio::test]
async fn test_full_queue_drops_frames_without_blocking() {
    let (router, backend) = make_test_router();

    let mapping = MappingTable {
        controls: HashMap::from([(1, cc(2, None))]),
        ..Default::default()
    };
    router.start(0, 0, mapping).await.unwrap();

    // The current-thread test runtime cannot run the worker while we inject
    let total = FRAME_QUEUE_CAPACITY + 50;
    for i in 0..total {
        backend.inject(&[0xB0, 1, (i % 128) as u8]);
    }
    router.stop().await;

    assert_eq!(backend.sent().len(), FRAME_QUEUE_CAPACITY);
}

#[tokio::test]
async fn test_high_bit_data_bytes_route_unmasked() {
    let (router, backend) = make_test_router();
    router.start(0, 0, make_test_mapping()).await.unwrap();

    // Note 188 is unmapped, velocity 128 is a press of note 60
    assert!(backend.inject(&[0x90, 0xBC, 100]));
    assert!(backend.inject(&[0x90, 60, 0x80]));

    router.stop().await;
    assert_eq!(backend.sent(), vec![vec![0xB0, 10, 127]]);
}

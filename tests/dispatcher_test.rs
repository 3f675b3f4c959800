use bytes::Bytes;
use event_courier::codec::{decode_batch_file, decode_records, drop_marker, encode_record};
use event_courier::domain::{BatchMeta, CustomEventTable, DropReason, unix_time_now};
use event_courier::profile::{IdentityStore, TestUserMarker};
use event_courier::reliability::{BatchStore, parse_batch_file_name};
use event_courier::{
    CustomEventDef, CustomEventType, DispatcherConfig, EventDispatcher, EventKind, EventRecord,
    Payload, TuningConfig,
};
use std::path::Path;
use std::time::Duration;
use tempfile::TempDir;
use uuid::Uuid;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Nothing listens on the discard port, so every delivery fails fast.
const UNREACHABLE: &str = "http://127.0.0.1:9";

fn config(work_dir: &Path, endpoint: &str) -> DispatcherConfig {
    let tuning = TuningConfig {
        idle_wait: Duration::from_millis(100),
        request_timeout: Duration::from_secs(2),
        connect_timeout: Duration::from_secs(1),
        ..TuningConfig::default()
    };
    DispatcherConfig::new(
        work_dir,
        endpoint,
        "test-secret",
        Uuid::new_v4(),
        Uuid::new_v4(),
        Uuid::new_v4(),
    )
    .with_tuning(tuning)
}

/// Queue files in delivery order.
fn queued(dir: &Path) -> Vec<(u32, i32)> {
    let mut keys: Vec<(u32, i32)> = std::fs::read_dir(dir)
        .unwrap()
        .filter_map(|entry| parse_batch_file_name(entry.ok()?.file_name().to_str()?))
        .collect();
    keys.sort_unstable();
    keys
}

fn read_queued(
    dir: &Path,
    install_id: Uuid,
    custom: Option<&CustomEventTable>,
) -> Vec<(BatchMeta, Vec<EventRecord>)> {
    queued(dir)
        .into_iter()
        .map(|(end_time, batch_num)| {
            let data = std::fs::read(dir.join(format!("{end_time}_{batch_num}.kwub"))).unwrap();
            let (meta, payload) = decode_batch_file(Bytes::from(data), install_id).unwrap();
            (meta, decode_records(&payload, custom).unwrap())
        })
        .collect()
}

async fn wait_for_files(dir: &Path, count: usize) {
    for _ in 0..100 {
        if queued(dir).len() >= count {
            return;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    panic!("expected {count} queued files in {}", dir.display());
}

async fn wait_for_empty_queue(dir: &Path) {
    for _ in 0..100 {
        if queued(dir).is_empty() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    panic!("queue in {} never drained", dir.display());
}

async fn wait_for_requests(server: &MockServer, count: usize) -> Vec<wiremock::Request> {
    for _ in 0..100 {
        let requests = server.received_requests().await.unwrap_or_default();
        if requests.len() >= count {
            return requests;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    panic!("expected {count} requests");
}

#[tokio::test]
async fn test_flush_persists_one_file_with_all_records() {
    let temp_dir = TempDir::new().unwrap();
    let config = config(temp_dir.path(), UNREACHABLE);
    let install_id = config.install_id;
    let dispatcher = EventDispatcher::start(config).await.unwrap();

    for _ in 0..3 {
        dispatcher.add_event(EventKind::ButtonClick, Payload::from("x"));
    }
    dispatcher.flush_now();
    wait_for_files(temp_dir.path(), 1).await;

    let files = read_queued(temp_dir.path(), install_id, None);
    assert_eq!(files.len(), 1);
    let (meta, records) = &files[0];
    assert_eq!(meta.batch_num, 0);
    assert!(meta.end_time >= meta.start_time);
    assert_eq!(
        records,
        &vec![EventRecord::new(EventKind::ButtonClick, Payload::from("x")); 3]
    );

    dispatcher.stop().await;
}

#[tokio::test]
async fn test_stop_persists_buffered_events() {
    let temp_dir = TempDir::new().unwrap();
    let config = config(temp_dir.path(), UNREACHABLE);
    let install_id = config.install_id;
    let dispatcher = EventDispatcher::start(config).await.unwrap();

    dispatcher.report_scene_loaded("Forest");
    dispatcher.log_error("texture missing");
    dispatcher.stop().await;
    assert!(!dispatcher.is_running());

    let files = read_queued(temp_dir.path(), install_id, None);
    let records: Vec<EventRecord> = files.into_iter().flat_map(|(_, records)| records).collect();
    assert_eq!(
        records,
        vec![
            EventRecord::new(EventKind::SceneLoaded, Payload::from("Forest")),
            EventRecord::new(EventKind::ErrorMsg, Payload::from("texture missing")),
        ]
    );

    // A second stop is a no-op.
    dispatcher.stop().await;
}

#[tokio::test]
async fn test_stop_with_empty_buffer_writes_nothing() {
    let temp_dir = TempDir::new().unwrap();
    let dispatcher = EventDispatcher::start(config(temp_dir.path(), UNREACHABLE))
        .await
        .unwrap();
    dispatcher.stop().await;
    assert!(queued(temp_dir.path()).is_empty());
}

#[tokio::test]
async fn test_events_keep_order_across_cuts_and_swaps() {
    let temp_dir = TempDir::new().unwrap();
    let mut config = config(temp_dir.path(), UNREACHABLE);
    config.tuning.min_signal_size = 64;
    config.tuning.cutting_threshold = 64;
    let install_id = config.install_id;
    let dispatcher = EventDispatcher::start(config).await.unwrap();

    for i in 0..200 {
        dispatcher.log_error(&format!("error {i}"));
        if i % 50 == 0 {
            tokio::task::yield_now().await;
        }
    }
    dispatcher.stop().await;

    let files = read_queued(temp_dir.path(), install_id, None);
    assert!(files.len() > 1);

    let messages: Vec<Payload> = files
        .into_iter()
        .flat_map(|(_, records)| records)
        .map(|record| record.payload)
        .collect();
    let expected: Vec<Payload> = (0..200).map(|i| Payload::from(format!("error {i}"))).collect();
    assert_eq!(messages, expected);
}

#[tokio::test]
async fn test_mismatched_payloads_are_dropped() {
    let temp_dir = TempDir::new().unwrap();
    let config = config(temp_dir.path(), UNREACHABLE).with_custom_events(vec![
        CustomEventDef::new("LevelUp", CustomEventType::UnsignedInt),
        CustomEventDef::new("Tapped", CustomEventType::UnsignedShortVec2),
    ]);
    let install_id = config.install_id;
    let dispatcher = EventDispatcher::start(config).await.unwrap();
    let table = dispatcher.custom_events().clone();

    dispatcher.report_custom("LevelUp", Payload::from("not a number"));
    dispatcher.report_custom("Unknown", Payload::U32(1));
    dispatcher.add_event(EventKind::ButtonClick, Payload::U32(1));
    dispatcher.add_event(9999_u16, Payload::Empty);
    dispatcher.report_custom("LevelUp", Payload::U32(7));
    dispatcher.report_custom("Tapped", Payload::Coord { x: 3, y: 4 });
    dispatcher.stop().await;

    let files = read_queued(temp_dir.path(), install_id, Some(&table));
    assert_eq!(files.len(), 1);
    let (meta, records) = &files[0];
    assert_ne!(meta.custom_events_version, 0);
    assert_eq!(
        records,
        &vec![
            EventRecord::new(2500_u16, Payload::U32(7)),
            EventRecord::new(2501_u16, Payload::Coord { x: 3, y: 4 }),
        ]
    );

    let schema_file = temp_dir
        .path()
        .join(format!("{}.map.gz", meta.custom_events_version));
    assert!(schema_file.exists());
}

#[tokio::test]
async fn test_in_app_purchase_writes_three_adjacent_records() {
    let temp_dir = TempDir::new().unwrap();
    let config = config(temp_dir.path(), UNREACHABLE);
    let install_id = config.install_id;
    let dispatcher = EventDispatcher::start(config).await.unwrap();

    dispatcher.report_in_app_purchase("gems_500", 499);
    dispatcher.stop().await;

    let records: Vec<EventRecord> = read_queued(temp_dir.path(), install_id, None)
        .into_iter()
        .flat_map(|(_, records)| records)
        .collect();
    assert_eq!(records.len(), 3);
    assert_eq!(records[0].kind(), Some(EventKind::PurchaseTimestamp));
    assert!(matches!(records[0].payload, Payload::Timestamp(t) if t > 0));
    assert_eq!(
        records[1],
        EventRecord::new(EventKind::PurchaseProductId, Payload::from("gems_500"))
    );
    assert_eq!(
        records[2],
        EventRecord::new(EventKind::PurchaseProductPriceUsdCents, Payload::U32(499))
    );
}

#[tokio::test]
async fn test_set_user_id_is_recorded_and_persisted() {
    let temp_dir = TempDir::new().unwrap();
    let config = config(temp_dir.path(), UNREACHABLE);
    let install_id = config.install_id;
    let dispatcher = EventDispatcher::start(config).await.unwrap();

    let user_id = Uuid::new_v4();
    dispatcher.set_user_id(user_id);
    dispatcher.stop().await;

    let files = read_queued(temp_dir.path(), install_id, None);
    assert_eq!(files.len(), 1);
    assert_eq!(files[0].0.user_id, user_id);
    assert_eq!(
        files[0].1,
        vec![EventRecord::new(EventKind::UserIdAssigned, Payload::Empty)]
    );
    assert_eq!(
        IdentityStore::new(temp_dir.path()).load_or_init().user_id,
        user_id
    );
}

#[tokio::test]
async fn test_onboarding_milestones_are_numbered() {
    let temp_dir = TempDir::new().unwrap();
    let config = config(temp_dir.path(), UNREACHABLE);
    let install_id = config.install_id;
    let dispatcher = EventDispatcher::start(config).await.unwrap();

    dispatcher.report_onboarding_milestone("tutorial");
    dispatcher.report_onboarding_milestone("tutorial");
    dispatcher.stop().await;

    let payloads: Vec<Payload> = read_queued(temp_dir.path(), install_id, None)
        .into_iter()
        .flat_map(|(_, records)| records)
        .map(|record| record.payload)
        .collect();
    assert_eq!(
        payloads,
        vec![Payload::from("tutorial"), Payload::from("tutorial (#2)")]
    );
}

#[tokio::test]
async fn test_flushed_batch_reaches_collector() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/in"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let temp_dir = TempDir::new().unwrap();
    let config = config(temp_dir.path(), &server.uri());
    let install_id = config.install_id;
    let dispatcher = EventDispatcher::start(config).await.unwrap();

    dispatcher.set_test_user("qa-phone");
    dispatcher.report_button_click("play");
    dispatcher.report_button_click("settings");
    dispatcher.flush_now();

    let requests = wait_for_requests(&server, 1).await;
    let request = &requests[0];
    assert_eq!(
        request.headers.get("k-installid").unwrap(),
        install_id.hyphenated().to_string().as_str()
    );
    assert_eq!(request.headers.get("k-tester").unwrap(), "qa-phone");
    assert_eq!(
        decode_records(&request.body, None).unwrap(),
        vec![
            EventRecord::new(EventKind::ButtonClick, Payload::from("play")),
            EventRecord::new(EventKind::ButtonClick, Payload::from("settings")),
        ]
    );

    wait_for_empty_queue(temp_dir.path()).await;
    dispatcher.stop().await;
    assert_eq!(
        TestUserMarker::new(temp_dir.path()).read().as_deref(),
        Some("qa-phone")
    );
}

#[tokio::test]
async fn test_queue_from_previous_run_is_sent_on_start() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/in"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let temp_dir = TempDir::new().unwrap();
    let offline = EventDispatcher::start(config(temp_dir.path(), UNREACHABLE))
        .await
        .unwrap();
    offline.report_app_pause();
    offline.stop().await;
    assert_eq!(queued(temp_dir.path()).len(), 1);

    let online = EventDispatcher::start(config(temp_dir.path(), &server.uri()))
        .await
        .unwrap();
    wait_for_empty_queue(temp_dir.path()).await;
    online.stop().await;
    assert_eq!(server.received_requests().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_restart_does_not_overwrite_queued_files() {
    let temp_dir = TempDir::new().unwrap();
    let config = config(temp_dir.path(), UNREACHABLE);
    let install_id = config.install_id;

    let store = BatchStore::open(temp_dir.path()).await;
    let now = unix_time_now();
    let mut earlier = Vec::new();
    for offset in 0..5 {
        let mut payload = Vec::new();
        encode_record(
            &mut payload,
            EventKind::ButtonClick.code(),
            &Payload::from(format!("earlier-{offset}")),
        );
        let meta = BatchMeta {
            end_time: now + offset,
            start_time: now,
            ..BatchMeta::new(install_id, Uuid::new_v4(), Uuid::new_v4())
        };
        store.save_batch(&meta, &payload).await.unwrap();
        earlier.push((now + offset, format!("earlier-{offset}")));
    }

    let dispatcher = EventDispatcher::start(config).await.unwrap();
    dispatcher.report_button_click("after-restart");
    dispatcher.stop().await;

    let files = read_queued(temp_dir.path(), install_id, None);
    assert_eq!(files.len(), 6);
    for (end_time, label) in &earlier {
        let (_, records) = files
            .iter()
            .find(|(meta, _)| meta.end_time == *end_time && meta.batch_num == 0)
            .unwrap();
        assert_eq!(
            records,
            &vec![EventRecord::new(EventKind::ButtonClick, Payload::from(label.as_str()))]
        );
    }
    let (meta, records) = files
        .iter()
        .find(|(_, records)| {
            records == &vec![EventRecord::new(EventKind::ButtonClick, Payload::from("after-restart"))]
        })
        .unwrap();
    assert_eq!(meta.batch_num, 1);
    assert_eq!(records.len(), 1);
}

#[tokio::test]
async fn test_full_queue_persists_single_drop_marker() {
    let temp_dir = TempDir::new().unwrap();
    let mut config = config(temp_dir.path(), UNREACHABLE);
    config.tuning.storage_cap_bytes = 100;
    let install_id = config.install_id;
    let user_id = config.user_id;
    let data_session_id = config.data_session_id;

    // Markers are already as small as a file gets, so the reducer cannot
    // bring the queue under the cap.
    let store = BatchStore::open(temp_dir.path()).await;
    for end_time in 1000..1003 {
        let meta = BatchMeta {
            end_time,
            start_time: end_time,
            ..BatchMeta::new(install_id, Uuid::new_v4(), Uuid::new_v4())
        };
        store
            .save_batch(&meta, &drop_marker(DropReason::TooManyUnsentEvents))
            .await
            .unwrap();
    }

    let dispatcher = EventDispatcher::start(config).await.unwrap();
    for _ in 0..10 {
        dispatcher.report_button_click("buy");
    }
    dispatcher.flush_now();
    wait_for_files(temp_dir.path(), 4).await;
    dispatcher.stop().await;

    let new_files: Vec<(u32, i32)> = queued(temp_dir.path())
        .into_iter()
        .filter(|(end_time, _)| !(1000..1003).contains(end_time))
        .collect();
    assert_eq!(new_files.len(), 1);
    let (end_time, batch_num) = new_files[0];
    let file = temp_dir.path().join(format!("{end_time}_{batch_num}.kwub"));
    assert_eq!(std::fs::metadata(&file).unwrap().len(), 66);

    let data = std::fs::read(&file).unwrap();
    let (meta, payload) = decode_batch_file(Bytes::from(data), install_id).unwrap();
    assert_eq!(meta.user_id, user_id);
    assert_eq!(meta.data_session_id, data_session_id);
    assert_eq!(meta.batch_num, 1);
    assert_eq!(
        decode_records(&payload, None).unwrap(),
        vec![EventRecord::new(
            EventKind::BatchDropped,
            Payload::U32(DropReason::TooManyUnsentEvents.code())
        )]
    );
}

#[tokio::test]
async fn test_invalid_endpoint_is_rejected() {
    let temp_dir = TempDir::new().unwrap();
    let result = EventDispatcher::start(config(temp_dir.path(), "not a url")).await;
    assert!(result.is_err());
}

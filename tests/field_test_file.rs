use fieldtest_parser::metrics::{Derived, VideoQuality};
use fieldtest_parser::types::{DeviceType, Direction, PingDialect, NA};
use fieldtest_parser::{
    extractor_for, Endpoint, ErrorKind, FileKind, FileParser, FileRecord, ParserConfig, TestFilters,
    TestKey, TestKind,
};
use std::path::PathBuf;

fn fixture(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures").join(name)
}

fn parse(name: &str) -> FileRecord {
    FileParser::new(ParserConfig::default())
        .parse_path(fixture(name))
        .unwrap()
        .unwrap()
}

const COMPLETE: &str = "99000348242368_060914_102155.txt";
const PARTIAL: &str = "99000348242368_061014_091500.txt";
const NO_SERVICE: &str = "WBBDTest2_061114.txt";
const TRACEROUTE: &str = "99000348242368_060914_traceroute.txt";

#[test]
fn test_complete_file_has_every_test() {
    let record = parse(COMPLETE);

    assert_eq!(record.kind, FileKind::FieldTest);
    assert!(record.error.is_none(), "{:?}", record.error);
    assert_eq!(record.test_count(), 14);
    assert_eq!(record.tests(TestKind::Ping).len(), 2);
    assert_eq!(record.tests(TestKind::Tcp).len(), 4);
    assert_eq!(record.tests(TestKind::Udp).len(), 8);
    assert!(record.tests.iter().all(|t| !t.has_error()));

    let keys: Vec<String> = record.tests_by_number().keys().map(|k| k.to_string()).collect();
    assert_eq!(
        keys,
        ["1", "2", "3", "4", "5.1", "5.2", "5.3", "6.1", "6.2", "6.3", "7", "8", "9", "10"]
    );
}

#[test]
fn test_complete_file_header() {
    let record = parse(COMPLETE);
    let device = &record.device;

    assert_eq!(record.filename, COMPLETE);
    assert_eq!(record.date, "06/09/2014");
    assert_eq!(record.time, "10:21:55");
    assert_eq!(device.app_version, "Beta v2.1");
    assert_eq!(device.device_id, "99000348242368");
    assert_eq!(device.device_type, DeviceType::Phone);
    assert_eq!(device.tester, "Tester 1");
    assert_eq!(device.network_carrier, "Verizon");
    assert_eq!(device.location_id, "1042");
    assert_eq!((device.latitude, device.longitude), (36.6521, -121.7988));
}

#[test]
fn test_complete_file_tests() {
    let record = parse(COMPLETE);

    let ping = record.ping_test_for(Endpoint::West).unwrap();
    assert_eq!(ping.header.test_number, 3);
    assert_eq!(ping.dialect, PingDialect::Unix);
    assert_eq!(ping.packets.len(), 10);
    assert_eq!(ping.stats.rtt_avg, 45.4);
    assert_eq!(ping.stats.loss_percent, 0);

    let tcp = record.tcp_tests_for(Endpoint::East);
    assert_eq!(tcp.len(), 2);
    assert_eq!(tcp[0].header.test_number, 2);
    assert_eq!(tcp[1].header.test_number, 10);
    assert_eq!(tcp[0].threads(Direction::Up).len(), 2);
    assert_eq!(tcp[0].threads(Direction::Down).len(), 2);
    assert_eq!(tcp[0].up_threads[0].measurements.len(), 10);
    assert_eq!(tcp[0].up_threads[0].final_measurement.speed, 400.0);

    let sub = record.test_by_key(TestKey::with_sub(6, 3)).unwrap().as_udp().unwrap();
    assert_eq!(sub.header.endpoint, Endpoint::East);
    assert_eq!(sub.duration_secs, 1);
    assert_eq!(sub.server_report().unwrap().jitter_ms, 6.6);

    let five = record.find_tests(TestKind::Udp, &TestFilters::endpoint(Endpoint::East).with_interval(5));
    assert_eq!(five.len(), 1);
    let report = five[0].as_udp().unwrap().server_report().unwrap();
    assert_eq!(report.datagrams_lost, 5);
    assert_eq!(report.loss_percent, 2.0);
}

#[test]
fn test_complete_file_derived_metrics() {
    let record = parse(COMPLETE);
    let west = &record.derived.west;
    let east = &record.derived.east;

    let r = *west.r_value.value().unwrap();
    assert!((r - 91.655625).abs() < 1e-6, "{}", r);
    assert!(*west.mos.value().unwrap() > 4.0);
    assert_eq!(west.video.down.value().unwrap().quality, VideoQuality::HD);
    assert_eq!(west.video.up.value().unwrap().hd_count, 20);
    assert_eq!(west.video.conference, Derived::Value(VideoQuality::HD));

    assert!(east.r_value.value().unwrap() < &r);
    assert_eq!(east.video.up.value().unwrap().quality, VideoQuality::SD);
    assert_eq!(east.video.conference, Derived::Value(VideoQuality::SD));
}

#[test]
fn test_parsing_is_repeatable() {
    let parser = FileParser::default();
    let text = std::fs::read_to_string(fixture(COMPLETE)).unwrap();
    let first = parser.parse_text(COMPLETE, &text).unwrap();
    let second = parser.parse_text(COMPLETE, &text).unwrap();
    assert_eq!(first, second);
    assert_eq!(parse(COMPLETE), parse(COMPLETE));
}

#[test]
fn test_partial_file_flags_errors() {
    let record = parse(PARTIAL);

    let error = record.error.as_ref().unwrap();
    assert_eq!(error.kind, ErrorKind::MissingTests);
    assert!(error.message.contains("There are 1 tests missing."), "{}", error.message);
    assert_eq!(record.test_count(), 13);

    let failed = record.test_by_key(TestKey::new(10)).unwrap();
    assert_eq!(failed.header().error_kind(), Some(ErrorKind::WriteFailure));
    assert!(!record.test_by_key(TestKey::new(2)).unwrap().has_error());

    let east = &record.derived.east;
    assert!(east.r_value.is_value());
    assert_eq!(east.video.up, Derived::TestError(ErrorKind::WriteFailure));
    assert_eq!(east.video.conference, Derived::TestError(ErrorKind::WriteFailure));
    assert!(record.derived.west.video.conference.is_value());
}

#[test]
fn test_connectivity_failure_file() {
    let record = parse(NO_SERVICE);

    assert_eq!(record.error.as_ref().unwrap().kind, ErrorKind::ConnectivityFailed);
    assert!(record.tests.is_empty());
    assert_eq!(record.date, "06/11/2014");
    assert_eq!(record.device.device_type, DeviceType::Netbook);
    assert_eq!(record.device.device_id, "WBBDTest2");
    assert_eq!(record.device.network_carrier, "AT&T");
    assert_eq!(
        record.derived.east.mos,
        Derived::TestError(ErrorKind::ConnectivityFailed)
    );
    assert!(record.to_string().contains("No viable network speed tests"));
}

#[test]
fn test_traceroute_file() {
    let record = parse(TRACEROUTE);

    assert_eq!(record.kind, FileKind::Traceroute);
    assert!(record.error.is_none());
    assert_eq!(record.device.app_version, "v1.0");

    let traces = record.tests(TestKind::Traceroute);
    assert_eq!(traces.len(), 2);
    let west = traces[0].as_traceroute().unwrap();
    assert_eq!(west.location, "California");
    assert_eq!(west.hop_count, 4);
    assert_eq!(west.hops.len(), 6);
    let east = traces[1].as_traceroute().unwrap();
    assert_eq!(east.header.endpoint, Endpoint::East);
    assert_eq!(east.hops[2].latency_ms, Some(78.9));
}

#[test]
fn test_unrecognised_file_is_rejected() {
    let parser = FileParser::default();
    assert!(parser.parse_path(fixture("notes.txt")).unwrap().is_none());
}

#[test]
fn test_batch_sorted_by_timestamp() {
    let paths: Vec<PathBuf> = [NO_SERVICE, PARTIAL, "notes.txt", TRACEROUTE, COMPLETE, "missing.txt"]
        .iter()
        .map(|n| fixture(n))
        .collect();
    let parser = FileParser::default();

    let outcomes = parser.parse_batch(&paths);
    assert_eq!(outcomes.len(), paths.len());
    assert_eq!(outcomes[0].0, paths[0]);
    assert!(outcomes[5].1.is_err());

    let names: Vec<String> = parser
        .parse_batch_sorted(&paths)
        .into_iter()
        .map(|r| r.filename)
        .collect();
    assert_eq!(names, [COMPLETE, TRACEROUTE, PARTIAL, NO_SERVICE]);
}

#[test]
fn test_report_rows() {
    let record = parse(COMPLETE);
    let extractor = extractor_for(record.kind);
    let headers = extractor.headers();
    let row = extractor.extract(&record);
    assert_eq!(headers.len(), row.len());

    let cell = |name: &str| row[headers.iter().position(|h| h == name).unwrap()].clone();
    assert_eq!(cell("FileError"), NA);
    assert_eq!(cell("West_TCP1_Up"), "2900");
    assert_eq!(cell("East_TCP2_Down"), "1700");
    assert_eq!(cell("West_UDP1_2_Jitter"), "3.5");
    assert_eq!(cell("East_UDP5_Loss"), "2");
    assert_eq!(cell("West_VideoConference"), "HD");

    let partial = parse(PARTIAL);
    let row = extractor.extract(&partial);
    let cell = |name: &str| row[headers.iter().position(|h| h == name).unwrap()].clone();
    assert_eq!(cell("East_TCP2_Up"), ErrorKind::WriteFailure.tag());
    assert_eq!(cell("East_UDP5_Jitter"), ErrorKind::MissingTests.tag());
}

#[test]
fn test_record_serializes_to_json() {
    let record = parse(COMPLETE);
    let json: serde_json::Value = serde_json::from_str(&record.to_json().unwrap()).unwrap();
    assert_eq!(json["filename"], COMPLETE);
    assert_eq!(json["tests"].as_array().unwrap().len(), 14);
    assert_eq!(json["tests"][0]["type"], "tcp");
}

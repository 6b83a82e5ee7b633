use super::*;
use crate::error::DeviceError;
use crate::reading_log::Reading;
use std::io::{Cursor, ErrorKind, Write};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

const POLL: Duration = Duration::from_millis(10);

#[test]
fn test_device_ids_from_path() {
    let paths = [
        "/dev/input/by-path/platform-usb-0:1:1.0-mouse",
        "/dev/input/mouse1",
    ];
    assert_eq!(
        derive_device_ids(&paths, true),
        vec!["platform-usb-0:1:1.0-mouse", "mouse1"]
    );
}

#[test]
fn test_device_ids_from_index() {
    let paths = ["/dev/input/mouse3", "/dev/input/mouse1"];
    assert_eq!(derive_device_ids(&paths, false), vec!["0", "1"]);
}

#[test]
fn test_registry_preserves_order_and_rejects_duplicates() {
    let registry = DeviceRegistry::new(vec![
        DeviceStream::new("b", None),
        DeviceStream::new("a", None),
    ])
    .unwrap();
    assert_eq!(registry.ids(), vec!["b", "a"]);
    assert_eq!(registry.get("a").unwrap().id(), "a");
    assert!(registry.get("c").is_none());
    assert!(registry.get("a").unwrap().path().is_none());

    let bound = DeviceStream::new("mouse2", Some("/dev/input/mouse2".into()));
    assert_eq!(bound.path(), Some(std::path::Path::new("/dev/input/mouse2")));

    let duplicate = DeviceRegistry::new(vec![
        DeviceStream::new("mouse0", None),
        DeviceStream::new("mouse0", None),
    ]);
    assert!(matches!(duplicate, Err(DeviceError::DuplicateId(id)) if id == "mouse0"));
}

#[tokio::test]
async fn test_reader_decodes_until_short_read() {
    let stream = DeviceStream::new("0", None);
    let log = stream.log();
    // Two whole packets followed by a truncated one
    let bytes = vec![0u8, 1, 254, 0, 0, 0, 9, 9];
    let source = ReadSource::new(Cursor::new(bytes));

    let outcome = DeviceReader::new(&stream, CancellationToken::new(), POLL)
        .start(Box::new(source))
        .await
        .unwrap();

    assert_eq!(outcome.device_id, "0");
    assert_eq!(outcome.readings, 2);
    match outcome.exit {
        ReaderExit::Failed(DeviceError::Read { device, source }) => {
            assert_eq!(device, "0");
            assert_eq!(source.kind(), ErrorKind::UnexpectedEof);
        }
        other => panic!("Expected read failure, got {:?}", other),
    }

    let readings = log.snapshot_all();
    assert_eq!(readings.len(), 2);
    assert_eq!((readings[0].dx, readings[0].dy), (1, -2));
    assert_eq!((readings[1].dx, readings[1].dy), (0, 0));
    assert!(readings[0].t_ms <= readings[1].t_ms);
}

#[tokio::test]
async fn test_reader_observes_stop_while_idle() {
    let stream = DeviceStream::new("idle", None);
    let stop = CancellationToken::new();
    let (_sender, source) = ChannelSource::channel();

    let handle = DeviceReader::new(&stream, stop.clone(), POLL).start(Box::new(source));
    tokio::time::sleep(Duration::from_millis(30)).await;
    stop.cancel();

    let outcome = tokio::time::timeout(Duration::from_secs(2), handle)
        .await
        .expect("reader should exit after stop")
        .unwrap();
    assert!(matches!(outcome.exit, ReaderExit::Stopped));
    assert_eq!(outcome.readings, 0);
    assert!(stream.log().is_empty());
}

#[tokio::test]
async fn test_reader_discards_packet_read_after_stop() {
    let stream = DeviceStream::new("late", None);
    let stop = CancellationToken::new();
    let (sender, source) = ChannelSource::channel();

    stop.cancel();
    sender.send([0, 5, 5]).unwrap();

    let outcome = DeviceReader::new(&stream, stop, POLL)
        .start(Box::new(source))
        .await
        .unwrap();
    assert!(matches!(outcome.exit, ReaderExit::Stopped));
    assert!(stream.log().is_empty());
}

#[tokio::test]
async fn test_reader_appends_channel_packets_in_order() {
    let stream = DeviceStream::new("0", None);
    let (sender, source) = ChannelSource::channel();

    for packet in [[0u8, 1, 1], [0, 2, 2], [0, 255, 128]] {
        sender.send(packet).unwrap();
    }
    drop(sender);

    let outcome = DeviceReader::new(&stream, CancellationToken::new(), POLL)
        .with_print_readings(true)
        .start(Box::new(source))
        .await
        .unwrap();
    assert_eq!(outcome.readings, 3);
    assert!(matches!(outcome.exit, ReaderExit::Failed(_)));

    let deltas: Vec<(i32, i32)> = stream
        .log()
        .drain_since()
        .iter()
        .map(|r: &Reading| (r.dx, r.dy))
        .collect();
    assert_eq!(deltas, vec![(1, 1), (2, 2), (-1, -128)]);
}

#[test]
fn test_device_file_open_missing() {
    let result = DeviceFile::open("/nonexistent/input/mouse9");
    assert!(matches!(result, Err(DeviceError::Open { .. })));
}

#[test]
fn test_device_file_reads_packets_then_fails_at_eof() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(&[8, 1, 254, 8, 0, 0]).unwrap();
    file.flush().unwrap();

    let mut device = DeviceFile::open(file.path()).unwrap();
    assert_eq!(device.path(), file.path());
    assert_eq!(device.next_packet(POLL).unwrap(), Some([8, 1, 254]));
    assert_eq!(device.next_packet(POLL).unwrap(), Some([8, 0, 0]));
    assert!(device.next_packet(POLL).is_err());
}

//! Integration tests for ringcast.

use ringcast::{
    ByteReader, ByteStreamError, ByteWriter, ReadStatus, ReaderOptions, Ring, RingConfig,
    RingError, StreamExt,
};
use std::time::Duration;
use tokio::time::timeout;

const PATIENCE: Duration = Duration::from_secs(5);

async fn drain<T: Clone + Send + 'static>(reader: &mut ringcast::Reader<T>) -> Vec<T> {
    let mut out = Vec::new();
    while let Some(item) = timeout(PATIENCE, reader.recv())
        .await
        .expect("reader hung")
    {
        out.push(item);
    }
    out
}

#[tokio::test]
async fn test_fifo_single_reader() {
    let ring = Ring::<u64>::with_capacity(128).expect("ring");
    let mut reader = ring.reader();

    for i in 0..100 {
        ring.write(i).await.expect("write failed");
    }
    ring.end_of_writes().await.expect("end_of_writes failed");

    assert_eq!(drain(&mut reader).await, (0..100).collect::<Vec<_>>());
    assert!(reader.is_exhausted());
    assert_eq!(reader.recv().await, None);
}

#[tokio::test]
async fn test_concurrent_readers_each_see_everything() {
    let ring = Ring::<String>::with_capacity(3).expect("ring");
    let mut handles = Vec::new();

    for _ in 0..2 {
        let mut reader = ring.reader();
        handles.push(tokio::spawn(async move { drain(&mut reader).await }));
    }

    let writer = ring.clone();
    tokio::spawn(async move {
        writer.write("test0".to_string()).await.expect("write");
        writer.write("test1".to_string()).await.expect("write");
        writer.end_of_writes().await.expect("end_of_writes");
    });

    for handle in handles {
        assert_eq!(handle.await.expect("reader task"), vec!["test0", "test1"]);
    }
    ring.cancel().await.expect("cancel");
    timeout(PATIENCE, ring.stopped()).await.expect("ring did not stop");
}

#[tokio::test]
async fn test_lapped_reader_resynchronizes() {
    let ring = Ring::<&'static str>::with_capacity(3).expect("ring");
    let mut reader = ring.reader();

    for value in ["a", "b", "c", "d"] {
        ring.write(value).await.expect("write");
    }

    assert_eq!(reader.recv().await, Some("b"));
    assert_eq!(reader.recv().await, Some("c"));
    assert_eq!(reader.recv().await, Some("d"));
}

#[tokio::test]
async fn test_heavily_lapped_reader_keeps_the_tail() {
    let ring = Ring::<u32>::with_capacity(8).expect("ring");
    let mut reader = ring.reader();

    for i in 0..100 {
        ring.write(i).await.expect("write");
    }
    ring.end_of_writes().await.expect("end_of_writes");

    assert_eq!(drain(&mut reader).await, (92..100).collect::<Vec<_>>());
}

#[tokio::test]
async fn test_fresh_reader_after_end_of_writes() {
    let ring = Ring::<String>::with_capacity(1024).expect("ring");

    for i in 0..20 {
        ring.write(format!("Some data {}", i)).await.expect("write");
    }
    ring.end_of_writes().await.expect("end_of_writes");

    let mut reader = ring.reader();
    let expected: Vec<String> = (0..20).map(|i| format!("Some data {}", i)).collect();
    assert_eq!(drain(&mut reader).await, expected);
}

#[tokio::test]
async fn test_writes_after_end_of_writes_are_dropped() {
    let ring = Ring::<u8>::with_capacity(8).expect("ring");
    ring.write(1).await.expect("write");
    ring.end_of_writes().await.expect("end_of_writes");
    ring.write(2).await.expect("write to read-only ring is not an error");
    assert!(!ring.write_or_starve(3, None).await.expect("write_or_starve"));

    let mut reader = ring.reader();
    assert_eq!(drain(&mut reader).await, vec![1]);
}

#[tokio::test]
async fn test_starving_reader_woken_by_write() {
    let ring = Ring::<u32>::with_capacity(4).expect("ring");
    let mut reader = ring.reader();

    let task = tokio::spawn(async move { reader.recv().await });
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(!task.is_finished());

    ring.write(42).await.expect("write");
    let got = timeout(PATIENCE, task).await.expect("reader hung");
    assert_eq!(got.expect("reader task"), Some(42));
}

#[tokio::test]
async fn test_end_of_writes_wakes_starving_readers() {
    let ring = Ring::<u32>::with_capacity(4).expect("ring");
    let mut tasks = Vec::new();
    for _ in 0..3 {
        let mut reader = ring.reader();
        tasks.push(tokio::spawn(async move { reader.recv().await }));
    }
    tokio::time::sleep(Duration::from_millis(20)).await;

    ring.end_of_writes().await.expect("end_of_writes");
    for task in tasks {
        let got = timeout(PATIENCE, task).await.expect("reader hung");
        assert_eq!(got.expect("reader task"), None);
    }
}

#[tokio::test]
async fn test_try_recv_reports_each_status() {
    let ring = Ring::<u32>::with_capacity(4).expect("ring");
    let mut reader = ring.reader();

    assert_eq!(reader.try_recv().await, ReadStatus::Starving);
    ring.write(7).await.expect("write");
    assert_eq!(reader.try_recv().await, ReadStatus::Value(7));
    ring.end_of_writes().await.expect("end_of_writes");
    assert_eq!(reader.try_recv().await, ReadStatus::EndOfStream);
    assert!(reader.is_exhausted());
}

#[tokio::test]
async fn test_cancel_without_readers_stops_immediately() {
    let ring = Ring::<u32>::with_capacity(4).expect("ring");
    ring.write(1).await.expect("write");
    ring.cancel().await.expect("cancel");

    timeout(PATIENCE, ring.stopped()).await.expect("ring did not stop");
    assert!(ring.is_stopped());
    assert_eq!(ring.write(2).await, Err(RingError::Stopped));
    assert_eq!(ring.end_of_writes().await, Err(RingError::Stopped));
    // Cancelling twice is harmless.
    assert_eq!(ring.cancel().await, Ok(()));
}

#[tokio::test]
async fn test_cancel_waits_for_starving_readers_to_unregister() {
    let ring = Ring::<u32>::with_capacity(4).expect("ring");
    let mut a = ring.reader();
    let mut b = ring.reader();

    assert_eq!(a.try_recv().await, ReadStatus::Starving);
    assert_eq!(b.try_recv().await, ReadStatus::Starving);

    ring.cancel().await.expect("cancel");
    assert_eq!(a.recv().await, None);
    assert!(
        timeout(Duration::from_millis(50), ring.stopped()).await.is_err(),
        "ring stopped while a woken reader was still registered"
    );

    assert_eq!(b.recv().await, None);
    timeout(PATIENCE, ring.stopped()).await.expect("ring did not stop");
}

#[tokio::test]
async fn test_reader_sees_end_of_stream_after_ring_stops() {
    let ring = Ring::<u32>::with_capacity(4).expect("ring");
    let mut reader = ring.reader();
    ring.cancel().await.expect("cancel");
    ring.stopped().await;
    assert_eq!(reader.recv().await, None);
}

#[tokio::test]
async fn test_cancel_starving_reader() {
    let ring = Ring::<u32>::with_capacity(4).expect("ring");
    let mut reader = ring.reader();
    let canceller = reader.canceller();

    let task = tokio::spawn(async move { reader.recv().await });
    tokio::time::sleep(Duration::from_millis(20)).await;

    canceller.cancel().await.expect("cancel");
    let got = timeout(PATIENCE, task).await.expect("reader hung");
    assert_eq!(got.expect("reader task"), None);
}

#[tokio::test]
async fn test_canceled_reader_stops_before_remaining_data() {
    let ring = Ring::<u32>::with_capacity(8).expect("ring");
    let mut reader = ring.reader();
    for i in 0..4 {
        ring.write(i).await.expect("write");
    }

    assert_eq!(reader.recv().await, Some(0));
    assert!(reader.canceller().try_cancel());
    assert_eq!(reader.recv().await, None);
}

#[tokio::test]
async fn test_no_starve_reader_drains_and_exits() {
    let ring = Ring::<u32>::with_capacity(8).expect("ring");
    for i in 0..3 {
        ring.write(i).await.expect("write");
    }

    let mut reader = ring.reader_with_options(ReaderOptions::no_starve());
    assert!(reader.options().no_starve);
    assert_eq!(drain(&mut reader).await, vec![0, 1, 2]);

    // The ring was never told end-of-writes, yet nothing is holding it open.
    ring.cancel().await.expect("cancel");
    timeout(PATIENCE, ring.stopped()).await.expect("ring did not stop");
}

#[tokio::test]
async fn test_write_or_starve_follows_slowest_reader() {
    let ring = Ring::<u32>::with_capacity(2).expect("ring");
    let mut fast = ring.reader();
    let mut slow = ring.reader();
    let readers = [fast.id(), slow.id()];

    let watched = ring.slowest_reader(&readers).await.expect("slowest");
    assert_eq!(watched, Some(fast.id()));
    assert!(ring.write_or_starve(0, watched).await.expect("write"));
    assert!(ring.write_or_starve(1, watched).await.expect("write"));
    assert!(!ring.write_or_starve(2, watched).await.expect("write"));

    assert_eq!(fast.recv().await, Some(0));
    let watched = ring.slowest_reader(&readers).await.expect("slowest");
    assert_eq!(watched, Some(slow.id()));
    assert!(!ring.write_or_starve(2, watched).await.expect("write"));

    assert_eq!(slow.recv().await, Some(0));
    assert!(ring.write_or_starve(2, watched).await.expect("write"));

    ring.end_of_writes().await.expect("end_of_writes");
    assert_eq!(drain(&mut fast).await, vec![1, 2]);
    assert_eq!(drain(&mut slow).await, vec![1, 2]);
}

#[tokio::test]
async fn test_departed_watched_reader_releases_writer() {
    let ring = Ring::<u32>::with_capacity(4).expect("ring");
    let mut watched = ring.reader_with_options(ReaderOptions::no_starve());
    let other = ring.reader();
    let id = watched.id();

    for i in 0..4 {
        assert!(ring.write_or_starve(i, Some(id)).await.expect("write"));
    }
    assert!(!ring.write_or_starve(4, Some(id)).await.expect("write"));

    // Reads all four, finds nothing more and unregisters.
    assert_eq!(drain(&mut watched).await, vec![0, 1, 2, 3]);

    assert!(ring.write_or_starve(4, Some(id)).await.expect("write"));
    assert_eq!(ring.slowest_reader(&[id]).await, Ok(None));
    assert_eq!(
        ring.slowest_reader(&[id, other.id()]).await,
        Ok(Some(other.id()))
    );
}

#[tokio::test]
async fn test_reader_is_known_before_its_first_pull() {
    let ring = Ring::<u32>::with_capacity(2).expect("ring");
    let idle = ring.reader();

    // Never pulled, yet already holds the writer back.
    assert!(ring.write_or_starve(0, Some(idle.id())).await.expect("write"));
    assert!(ring.write_or_starve(1, Some(idle.id())).await.expect("write"));
    assert!(!ring.write_or_starve(2, Some(idle.id())).await.expect("write"));
}

#[tokio::test]
async fn test_cancel_after_reader_finished_is_harmless() {
    let ring = Ring::<u32>::with_capacity(4).expect("ring");
    let mut reader = ring.reader();
    let canceller = reader.canceller();
    ring.write(1).await.expect("write");
    ring.end_of_writes().await.expect("end_of_writes");
    assert_eq!(drain(&mut reader).await, vec![1]);

    canceller.cancel().await.expect("cancel");
    let mut late = ring.reader();
    assert_eq!(drain(&mut late).await, vec![1]);
}

#[tokio::test]
async fn test_slowest_of_nothing() {
    let ring = Ring::<u32>::with_capacity(2).expect("ring");
    assert_eq!(ring.slowest_reader(&[]).await, Ok(None));
}

#[tokio::test]
async fn test_zero_capacity_rejected() {
    assert_eq!(
        Ring::<u32>::with_capacity(0).unwrap_err(),
        RingError::ZeroCapacity
    );
    assert_eq!(
        Ring::<u32>::new(RingConfig::new(8, 0)).unwrap_err(),
        RingError::ZeroMailbox
    );
}

#[tokio::test]
async fn test_ring_identity() {
    let a = Ring::<u32>::with_capacity(2).expect("ring");
    let b = Ring::<u32>::with_capacity(2).expect("ring");
    assert_eq!(a, a.clone());
    assert_ne!(a, b);
    assert_ne!(a.id(), b.id());
    assert_eq!(a.capacity(), 2);
    assert_ne!(a.reader().id(), a.reader().id());
}

#[tokio::test]
async fn test_reader_stream() {
    let ring = Ring::<u64>::with_capacity(16).expect("ring");
    let stream = ring.reader().into_stream();

    for i in 0..10 {
        ring.write(i).await.expect("write");
    }
    ring.end_of_writes().await.expect("end_of_writes");

    let collected: Vec<u64> = timeout(PATIENCE, stream.collect())
        .await
        .expect("stream hung");
    assert_eq!(collected, (0..10).collect::<Vec<_>>());
}

#[tokio::test]
async fn test_reader_cursor_tracks_progress() {
    let ring = Ring::<u8>::with_capacity(2).expect("ring");
    let mut reader = ring.reader();
    for i in 0..3 {
        ring.write(i).await.expect("write");
    }

    assert_eq!(reader.recv().await, Some(1));
    assert_eq!(reader.cursor().sequence(ring.capacity()), 2);
    assert_eq!(reader.recv().await, Some(2));
    assert_eq!(reader.cursor().cycles(), 1);
    assert_eq!(reader.cursor().pos(), 1);
}

#[tokio::test]
async fn test_bytes_writer_and_reader() {
    let writer = ByteWriter::with_capacity(1024).expect("ring");

    for i in 0..20 {
        let line = format!("Some data {}", i);
        assert_eq!(writer.write(line.as_bytes()).await, Ok(line.len()));
    }
    writer.end_of_writes().await.expect("end_of_writes");

    let mut reader = writer.reader();
    let mut i = 0;
    loop {
        let mut buf = [0u8; 12];
        let n = timeout(PATIENCE, reader.read(&mut buf))
            .await
            .expect("reader hung")
            .expect("read failed");
        if n == 0 {
            break;
        }
        assert_eq!(&buf[..n], format!("Some data {}", i).as_bytes());
        i += 1;
    }
    assert_eq!(i, 20);

    let mut buf = [0u8; 12];
    assert_eq!(reader.read(&mut buf).await, Ok(0));
    writer.close().await.expect("close");
}

#[tokio::test]
async fn test_bytes_reader_short_buffer() {
    let writer = ByteWriter::with_capacity(8).expect("ring");
    writer.write(b"hello world").await.expect("write");
    writer.write(b"ok").await.expect("write");
    writer.end_of_writes().await.expect("end_of_writes");

    let mut reader = ByteReader::new(writer.ring().reader());
    let mut buf = [0u8; 4];
    assert_eq!(
        reader.read(&mut buf).await,
        Err(ByteStreamError::BufferTooSmall {
            needed: 11,
            available: 4
        })
    );
    assert_eq!(&buf, b"hell");

    // The oversized value was consumed; the next read gets the next value.
    assert_eq!(reader.read(&mut buf).await, Ok(2));
    assert_eq!(&buf[..2], b"ok");
    assert_eq!(reader.read(&mut buf).await, Ok(0));
    assert_eq!(reader.read(&mut buf).await, Ok(0));
}

use super::*;

#[test]
fn write_and_read_round_trips_under_capacity() {
    let buf = StreamBuffer::new(16);
    buf.write(b"hello", 1);
    assert_eq!(buf.len(), 5);
    assert_eq!(buf.read(5), b"hello");
    assert!(buf.is_empty());
}

#[test]
fn write_past_capacity_drops_oldest_and_latches_overflow() {
    let buf = StreamBuffer::new(4);
    buf.write(b"abcd", 1);
    buf.write(b"ef", 2);
    assert_eq!(buf.len(), 4);
    assert_eq!(buf.read(4), b"cdef");
    assert!(buf.stats().overflow);
}

#[test]
fn stats_track_written_and_read_counters() {
    let buf = StreamBuffer::new(16);
    buf.write(b"abc", 10);
    buf.read(2);
    let stats = buf.stats();
    assert_eq!(stats.written, 3);
    assert_eq!(stats.read, 2);
    assert_eq!(stats.last_write_at_ms, 10);
}

#[test]
fn shrinking_resize_discards_data_and_latches_overflow() {
    let buf = StreamBuffer::new(16);
    buf.write(b"abcdef", 1);
    buf.resize(3);
    assert_eq!(buf.len(), 3);
    assert_eq!(buf.read(3), b"def");
    assert!(buf.stats().overflow);
}

#[test]
fn growing_resize_does_not_latch_overflow() {
    let buf = StreamBuffer::new(4);
    buf.write(b"ab", 1);
    buf.resize(16);
    assert!(!buf.stats().overflow);
}

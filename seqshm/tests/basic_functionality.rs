//! Basic functionality tests for the logical-id API

use seqshm::{
    Reader, Segment, ShmError, ShmPayload, ShmResult, Writer, ipc_read, ipc_write, naming,
};
use seqshm_common::config::IpcConfig;

#[derive(Debug, Clone, Copy, PartialEq)]
#[repr(C)]
struct Int32 {
    value: i32,
}

unsafe impl ShmPayload for Int32 {}

#[derive(Debug, Clone, Copy, PartialEq)]
#[repr(C)]
struct Imu {
    accel: [f32; 3],
    gyro: [f32; 3],
    stamp_ns: u64,
}

unsafe impl ShmPayload for Imu {}

fn unique_id(tag: &str) -> String {
    format!("/test/basic/{}/{}", tag, rand::random::<u32>())
}

fn remove(id: &str) {
    let _ = Segment::unlink(&naming::resolve(id));
}

#[test]
fn test_write_read_roundtrip() -> ShmResult<()> {
    let id = unique_id("roundtrip");
    let imu = Imu {
        accel: [0.1, -9.81, 0.3],
        gyro: [0.0, 0.01, -0.02],
        stamp_ns: 1_700_000_000_123,
    };

    seqshm::write(&imu, &id)?;
    let read: Imu = seqshm::read(&id)?;
    assert_eq!(read, imu);

    remove(&id);
    Ok(())
}

#[test]
fn test_latest_value_wins() -> ShmResult<()> {
    let id = unique_id("demo");

    seqshm::write(&Int32 { value: 7 }, &id)?;
    assert_eq!(seqshm::read::<Int32>(&id)?.value, 7);

    seqshm::write(&Int32 { value: 8 }, &id)?;
    assert_eq!(seqshm::read::<Int32>(&id)?.value, 8);
    assert_eq!(seqshm::read::<Int32>(&id)?.value, 8);

    remove(&id);
    Ok(())
}

#[test]
fn test_leading_slash_is_same_stream() -> ShmResult<()> {
    let id = unique_id("slash");
    let bare = id.trim_start_matches('/').to_string();

    seqshm::write(&42u64, &id)?;
    assert_eq!(seqshm::read::<u64>(&bare)?, 42);
    assert_eq!(seqshm::read::<u64>(&format!("//{bare}"))?, 42);

    remove(&id);
    Ok(())
}

#[test]
fn test_read_into_populates_entry() -> ShmResult<()> {
    let id = unique_id("read_into");
    let mut entry = Int32 { value: -1 };

    assert!(seqshm::read_into(&mut entry, &id).is_err());
    assert_eq!(entry.value, -1);

    seqshm::write(&Int32 { value: 12 }, &id)?;
    seqshm::read_into(&mut entry, &id)?;
    assert_eq!(entry.value, 12);

    remove(&id);
    Ok(())
}

#[test]
fn test_read_before_writer_exists() {
    let id = unique_id("no_writer");

    let err = seqshm::read::<u32>(&id).unwrap_err();
    assert!(matches!(err, ShmError::NotFound { .. }));
    assert_ne!(err.status_code(), 0);
}

#[test]
fn test_read_before_first_write() -> ShmResult<()> {
    let id = unique_id("no_data");
    let _writer = Writer::<u32>::create(&naming::resolve(&id))?;

    assert!(matches!(
        seqshm::read::<u32>(&id),
        Err(ShmError::NoData { .. })
    ));

    seqshm::write(&3u32, &id)?;
    assert_eq!(seqshm::read::<u32>(&id)?, 3);

    remove(&id);
    Ok(())
}

#[test]
fn test_mismatched_payload_types_rejected() -> ShmResult<()> {
    let id = unique_id("mismatch");
    seqshm::write(&1u32, &id)?;

    let err = seqshm::read::<[u64; 32]>(&id).unwrap_err();
    assert!(matches!(err, ShmError::SizeMismatch { .. }));

    let err = seqshm::write(&[0u64; 32], &id).unwrap_err();
    assert!(matches!(err, ShmError::SizeMismatch { .. }));
    assert_eq!(err.status_code(), -1);

    remove(&id);
    Ok(())
}

#[test]
fn test_overlong_id_fails_loudly() {
    let id = "x".repeat(300);
    let err = seqshm::write(&1u8, &id).unwrap_err();
    assert!(matches!(err, ShmError::InvalidName { .. }));
    assert_ne!(err.status_code(), 0);
}

#[test]
fn test_static_id_macros() -> ShmResult<()> {
    fn publish(value: i32) -> ShmResult<()> {
        ipc_write!(value, "/test/basic/static_macro")
    }

    publish(5)?;
    assert_eq!(ipc_read!(i32, "/test/basic/static_macro")?, 5);

    publish(6)?;
    let inferred: i32 = ipc_read!("/test/basic/static_macro")?;
    assert_eq!(inferred, 6);

    remove("/test/basic/static_macro");
    Ok(())
}

#[test]
fn test_dynamic_id_macros() -> ShmResult<()> {
    let id = unique_id("dynamic_macro");

    ipc_write!(2.5f64, id)?;
    assert_eq!(ipc_read!(f64, id)?, 2.5);
    let inferred: f64 = ipc_read!(id.as_str())?;
    assert_eq!(inferred, 2.5);

    remove(&id);
    Ok(())
}

#[test]
fn test_transports_outlive_unlink() -> ShmResult<()> {
    let id = unique_id("unlinked");
    let name = naming::resolve(&id);

    let writer = Writer::<u64>::create(&name)?;
    let reader = Reader::<u64>::attach(&name)?;
    Segment::unlink(&name)?;

    writer.write(&99);
    assert_eq!(reader.read()?, 99);
    assert!(matches!(
        Reader::<u64>::attach(&name),
        Err(ShmError::NotFound { .. })
    ));
    Ok(())
}

#[test]
fn test_configure_without_cleanup() -> ShmResult<()> {
    // Second install is ignored
    seqshm::init_tracing();
    seqshm::init_tracing();

    let config = IpcConfig::default();
    assert_eq!(seqshm::configure(&config)?, 0);

    let id = unique_id("traced");
    seqshm::write(&1u8, &id)?;
    assert_eq!(seqshm::read::<u8>(&id)?, 1);
    remove(&id);
    Ok(())
}

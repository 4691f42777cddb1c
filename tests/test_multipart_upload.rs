// tests/test_multipart_upload.rs
//
// Multipart sessions: part splitting, commit order and the advisory lock.

mod common;

use anyhow::Result;
use std::io::Cursor;
use std::sync::Arc;
use storegate::{
    FileAccess, FileMode, FileSystemConfig, FileSystemObjectStore, GatewayError, MultipartUploadConfig,
    MultipartUploadCoordinator, ObjectDescriptor,
};
use tempfile::TempDir;

use common::fixture_with_part_bounds;

const MIN: usize = 16;
const MAX: usize = 64;

fn descriptor(tmp: &TempDir, key: &str) -> ObjectDescriptor {
    std::fs::create_dir_all(tmp.path().join("media")).unwrap();
    let cfg = FileSystemConfig { min_part_size: MIN, max_part_size: MAX, ..Default::default() };
    ObjectDescriptor::new(Arc::new(FileSystemObjectStore::with_config(tmp.path(), "media", cfg)), key)
}

fn pattern(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i * 31 % 251) as u8).collect()
}

#[test]
fn test_max_max_remainder_equals_single_shot() -> Result<()> {
    let tmp = TempDir::new()?;
    let data = pattern(2 * MAX + 10);

    let single = descriptor(&tmp, "single.bin");
    single.put_content(data.clone().into())?;

    let multi = descriptor(&tmp, "multi.bin");
    let mut mpu = MultipartUploadCoordinator::with_store_bounds(multi.clone());
    let mut reader = Cursor::new(data.clone());
    let session = mpu.init_session()?;
    let mut parts = Vec::new();
    for n in 1..=3 {
        parts.push(mpu.upload_part(&session, &mut reader, n)?);
    }
    mpu.complete_session(&session, &parts)?;

    let got = multi.get_content()?.expect("object committed");
    assert_eq!(got, single.get_content()?.expect("single-shot object"));
    assert_eq!(got.as_ref(), data.as_slice());
    Ok(())
}

#[test]
fn test_small_non_final_part_rejected_at_commit() -> Result<()> {
    let tmp = TempDir::new()?;
    let d = descriptor(&tmp, "small.bin");
    let mut mpu = MultipartUploadCoordinator::with_store_bounds(d.clone());

    let session = mpu.init_session()?;
    let p1 = mpu.upload_part(&session, &mut Cursor::new(pattern(MIN - 1)), 1)?;
    let p2 = mpu.upload_part(&session, &mut Cursor::new(pattern(MIN)), 2)?;
    let err = mpu.complete_session(&session, &[p1, p2]).unwrap_err();
    assert!(matches!(err, GatewayError::StorageUnavailable(_)), "got {:?}", err);

    // Lock is not left behind by the failed call.
    let mut observer = d.clone();
    assert!(!observer.is_locked()?);
    assert!(!d.exists()?);
    Ok(())
}

#[test]
fn test_lock_blocks_other_session_until_released() -> Result<()> {
    let tmp = TempDir::new()?;
    let d = descriptor(&tmp, "shared.bin");
    let mut first = MultipartUploadCoordinator::with_store_bounds(d.clone());
    let mut second = MultipartUploadCoordinator::with_store_bounds(d.clone());

    let s1 = first.init_session()?;
    let s2 = second.init_session()?;
    let p1 = first.upload_part(&s1, &mut Cursor::new(pattern(MAX)), 1)?;

    // Simulate the first session holding the lock mid-call.
    let mut holder = d.clone();
    holder.lock(s1.as_str())?;
    let err = second.upload_part(&s2, &mut Cursor::new(pattern(MAX)), 1).unwrap_err();
    assert!(matches!(err, GatewayError::ObjectLocked { ref owner, .. } if owner == s1.as_str()));
    let err = second.complete_session(&s2, &[]).unwrap_err();
    assert!(matches!(err, GatewayError::ObjectLocked { .. }));

    // The owning session can still proceed and clears the lock on completion.
    first.complete_session(&s1, &[p1])?;
    assert!(!holder.is_locked()?);

    let p = second.upload_part(&s2, &mut Cursor::new(pattern(8)), 1)?;
    second.complete_session(&s2, &[p])?;
    assert_eq!(d.get_content()?.expect("object").len(), 8);
    Ok(())
}

#[test]
fn test_abort_clears_lock_and_allows_new_session() -> Result<()> {
    let tmp = TempDir::new()?;
    let d = descriptor(&tmp, "aborted.bin");
    let mut mpu = MultipartUploadCoordinator::with_store_bounds(d.clone());

    let s1 = mpu.init_session()?;
    let mut holder = d.clone();
    holder.lock(s1.as_str())?;
    mpu.abort_session(&s1)?;
    assert!(!holder.is_locked()?);

    let info = mpu.upload_from_reader(&mut Cursor::new(pattern(MAX + 1)))?;
    assert_eq!(info.parts, 2);
    assert_eq!(info.total_bytes, (MAX + 1) as u64);
    Ok(())
}

#[test]
fn test_dropping_coordinator_aborts_unfinished_sessions() -> Result<()> {
    let tmp = TempDir::new()?;
    let d = descriptor(&tmp, "dropped.bin");
    {
        let mut mpu = MultipartUploadCoordinator::new(d.clone(), MultipartUploadConfig::from_bounds(d.part_size_bounds()));
        let s = mpu.init_session()?;
        mpu.upload_part(&s, &mut Cursor::new(pattern(MAX)), 1)?;
    }
    let leftovers = std::fs::read_dir(tmp.path().join("media/.multipart"))?.count();
    assert_eq!(leftovers, 0);
    assert!(!d.exists()?);
    Ok(())
}

#[test]
fn test_gateway_upload_and_stream_multipart() -> Result<()> {
    let fx = fixture_with_part_bounds(MIN, MAX);
    let source = fx.tmp.path().join("source.bin");
    let data = pattern(3 * MAX + 5);
    std::fs::write(&source, &data)?;

    let info = fx.gw.upload_multipart(&source, "~/media/big.bin")?;
    assert_eq!(info.parts, 4);
    assert_eq!(fx.gw.read_all_bytes("~/media/big.bin")?, data);
    assert!(fx.gw.get_last_write_time("~/media/big.bin")?.is_some());

    let mut stream = fx.gw.open("~/media/streamed.bin", FileMode::CreateNew, FileAccess::Write)?;
    std::io::Write::write_all(&mut stream, &data)?;
    let info = stream.upload_multipart()?;
    assert_eq!(info.total_bytes, data.len() as u64);
    stream.close()?;
    assert_eq!(fx.gw.read_all_bytes("~/media/streamed.bin")?, data);
    Ok(())
}

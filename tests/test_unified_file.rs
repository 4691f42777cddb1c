// tests/test_unified_file.rs
//
// End-to-end behaviour of the file API over both backends.

mod common;

use anyhow::Result;
use chrono::Utc;
use storegate::{Backend, FileAttributes, GatewayError};

use common::fixture;

#[test]
fn test_round_trip_local_and_remote() -> Result<()> {
    let fx = fixture();
    std::fs::create_dir_all(fx.site().join("static"))?;
    std::fs::write(fx.site().join("static/seed.bin"), b"")?;

    let samples: Vec<Vec<u8>> = vec![
        Vec::new(),
        b"plain ascii".to_vec(),
        "ünïcødé ✓".as_bytes().to_vec(),
        (0..=255u8).collect(),
        vec![0u8; 64 * 1024],
    ];

    for (i, data) in samples.iter().enumerate() {
        // Existing local file stays local.
        fx.gw.write_all_bytes("~/static/seed.bin", data)?;
        assert_eq!(&fx.gw.read_all_bytes("~/static/seed.bin")?, data);
        assert_eq!(fx.gw.metadata("~/static/seed.bin")?.backend, Backend::Local);

        // New path goes to the object store.
        let remote = format!("~/blobs/sample-{}.bin", i);
        fx.gw.write_all_bytes(&remote, data)?;
        assert_eq!(&fx.gw.read_all_bytes(&remote)?, data);
        assert_eq!(fx.gw.metadata(&remote)?.backend, Backend::Remote);
        assert!(fx.container_dir().join(format!("blobs/sample-{}.bin", i)).is_file());
    }
    Ok(())
}

#[test]
fn test_hello_scenario() -> Result<()> {
    let fx = fixture();
    assert!(!fx.gw.exists("~/docs/a.txt"));

    let before = Utc::now();
    fx.gw.write_all_text("~/docs/a.txt", "hello")?;
    let after = Utc::now();

    assert!(fx.gw.exists("~/docs/a.txt"));
    assert!(fx.container_dir().join("docs/a.txt").is_file());

    let written = fx.gw.get_last_write_time("~/docs/a.txt")?.expect("last write time");
    assert!(written >= before && written <= after, "{} not in [{}, {}]", written, before, after);
    assert_eq!(fx.gw.read_all_text("~/docs/a.txt")?, "hello");
    assert_eq!(fx.gw.metadata("~/docs/a.txt")?.size, 5);

    // Parent directory marker was created and touched.
    let dir_time = fx.gw.directory_last_write_time("~/docs")?.expect("directory time");
    assert!(dir_time >= before && dir_time <= after);
    assert!(!fx.gw.exists("~/docs_$folder$"));
    Ok(())
}

#[test]
fn test_delete_missing_is_noop() -> Result<()> {
    let fx = fixture();
    fx.gw.delete("~/never/was.txt")?;
    fx.gw.delete("~/never/was.txt")?;

    fx.gw.write_all_text("~/gone.txt", "x")?;
    fx.gw.delete("~/gone.txt")?;
    fx.gw.delete("~/gone.txt")?;
    assert!(!fx.gw.exists("~/gone.txt"));
    Ok(())
}

#[test]
fn test_copy_overwrite_rules() -> Result<()> {
    let fx = fixture();
    fx.gw.write_all_text("~/a.txt", "first")?;

    fx.gw.copy("~/a.txt", "~/b.txt", false)?;
    let err = fx.gw.copy("~/a.txt", "~/b.txt", false).unwrap_err();
    assert!(matches!(err, GatewayError::AlreadyExists(_)), "got {:?}", err);

    fx.gw.write_all_text("~/a.txt", "second")?;
    fx.gw.copy("~/a.txt", "~/b.txt", true)?;
    fx.gw.copy("~/a.txt", "~/b.txt", true)?;
    assert_eq!(fx.gw.read_all_text("~/b.txt")?, "second");

    let err = fx.gw.copy("~/missing.txt", "~/c.txt", false).unwrap_err();
    assert!(err.is_not_found());
    Ok(())
}

#[test]
fn test_copy_overwrite_local_destination() -> Result<()> {
    let fx = fixture();
    std::fs::write(fx.site().join("local.txt"), b"old")?;
    fx.gw.write_all_text("~/remote.txt", "new")?;

    assert!(matches!(fx.gw.copy("~/remote.txt", "~/local.txt", false), Err(GatewayError::AlreadyExists(_))));
    fx.gw.copy("~/remote.txt", "~/local.txt", true)?;
    assert_eq!(std::fs::read(fx.site().join("local.txt"))?, b"new");
    Ok(())
}

#[test]
fn test_move_same_location_always_fails() -> Result<()> {
    let fx = fixture();
    // Fails whether or not the file exists.
    assert!(matches!(fx.gw.move_file("~/x.txt", "~/x.txt"), Err(GatewayError::SameLocation(_))));

    fx.gw.write_all_text("~/x.txt", "x")?;
    assert!(matches!(fx.gw.move_file("~/x.txt", "x.txt"), Err(GatewayError::SameLocation(_))));
    assert!(matches!(fx.gw.move_file("~/x.txt", "~/X.TXT"), Err(GatewayError::SameLocation(_))));
    assert_eq!(fx.gw.read_all_text("~/x.txt")?, "x");
    Ok(())
}

#[test]
fn test_move_between_backends() -> Result<()> {
    let fx = fixture();
    std::fs::write(fx.site().join("upload.tmp"), b"payload")?;

    fx.gw.move_file("~/upload.tmp", "~/archive/upload.bin")?;
    assert!(!fx.site().join("upload.tmp").exists());
    assert_eq!(fx.gw.read_all_bytes("~/archive/upload.bin")?, b"payload");

    fx.gw.write_all_text("~/archive/other.txt", "o")?;
    assert!(matches!(
        fx.gw.move_file("~/archive/upload.bin", "~/archive/other.txt"),
        Err(GatewayError::AlreadyExists(_))
    ));

    fx.gw.move_file("~/archive/upload.bin", "~/archive/renamed.bin")?;
    assert!(!fx.gw.exists("~/archive/upload.bin"));
    assert_eq!(fx.gw.read_all_bytes("~/archive/renamed.bin")?, b"payload");
    Ok(())
}

#[test]
fn test_append_creates_then_extends() -> Result<()> {
    let fx = fixture();
    fx.gw.append_all_text("~/logs/today.log", "one\n")?;
    fx.gw.append_all_text("~/logs/today.log", "two\n")?;
    assert_eq!(fx.gw.read_all_text("~/logs/today.log")?, "one\ntwo\n");

    // Configured local prefix stays on disk even for new files.
    fx.gw.append_all_text("~/App_Data/audit.log", "a\n")?;
    assert_eq!(std::fs::read_to_string(fx.site().join("App_Data/audit.log"))?, "a\n");
    Ok(())
}

#[test]
fn test_remote_attributes_and_timestamps() -> Result<()> {
    let fx = fixture();
    fx.gw.write_all_text("~/r.txt", "x")?;
    assert_eq!(fx.gw.get_attributes("~/r.txt")?, FileAttributes::NORMAL);

    fx.gw.set_attributes("~/r.txt", FileAttributes::READ_ONLY)?;
    let snap = fx.gw.metadata("~/r.txt")?;
    assert!(snap.is_read_only());

    let created = fx.gw.get_creation_time("~/r.txt")?.expect("creation time");
    let t = created + chrono::Duration::hours(1);
    fx.gw.set_last_write_time("~/r.txt", t)?;
    assert_eq!(fx.gw.get_last_write_time("~/r.txt")?, Some(t));

    // Rewriting keeps the original creation time.
    fx.gw.write_all_text("~/r.txt", "y")?;
    assert_eq!(fx.gw.get_creation_time("~/r.txt")?, Some(created));

    assert!(fx.gw.get_last_write_time("~/none.txt").unwrap_err().is_not_found());
    Ok(())
}

#[test]
fn test_listing_excludes_placeholders() -> Result<()> {
    let fx = fixture();
    fx.gw.write_all_text("~/top.txt", "t")?;
    fx.gw.write_all_text("~/docs/a.txt", "a")?;
    std::fs::write(fx.site().join("local.txt"), b"l")?;

    let root = fx.gw.list("~/")?;
    assert_eq!(root, vec!["~/local.txt".to_string(), "~/top.txt".to_string()]);
    assert_eq!(fx.gw.list("~/docs")?, vec!["~/docs/a.txt".to_string()]);
    Ok(())
}

#[test]
fn test_copy_overwrite_replaces_destination_attributes() -> Result<()> {
    let fx = fixture();
    fx.gw.write_all_text("~/src.txt", "new")?;
    fx.gw.write_all_text("~/dst.txt", "old")?;
    fx.gw.set_attributes("~/dst.txt", FileAttributes::READ_ONLY)?;

    fx.gw.copy("~/src.txt", "~/dst.txt", true)?;
    assert_eq!(fx.gw.get_attributes("~/src.txt")?, FileAttributes::NORMAL);
    assert_eq!(fx.gw.get_attributes("~/dst.txt")?, FileAttributes::NORMAL);
    assert_eq!(fx.gw.read_all_text("~/dst.txt")?, "new");

    fx.gw.set_attributes("~/src.txt", FileAttributes::ARCHIVE)?;
    fx.gw.copy("~/src.txt", "~/fresh.txt", false)?;
    assert_eq!(fx.gw.get_attributes("~/fresh.txt")?, FileAttributes::ARCHIVE);
    Ok(())
}

#[test]
fn test_exists_swallows_store_failure() -> Result<()> {
    let fx = fixture();
    fx.gw.write_all_text("~/a.txt", "a")?;
    assert!(fx.gw.exists("~/a.txt"));

    std::fs::remove_dir_all(fx.container_dir())?;
    assert!(!fx.gw.exists("~/a.txt"));
    assert!(matches!(fx.gw.read_all_text("~/a.txt"), Err(GatewayError::StorageUnavailable(_))));
    Ok(())
}

#[test]
fn test_directory_time_includes_remote_children() -> Result<()> {
    let fx = fixture();
    let local_dir = fx.site().join("docs");
    std::fs::create_dir_all(&local_dir)?;
    let past = std::time::SystemTime::now() - std::time::Duration::from_secs(3600);
    std::fs::File::open(&local_dir)?.set_modified(past)?;

    let local_only = fx.gw.directory_last_write_time("~/docs")?.expect("local directory time");
    assert!(local_only < Utc::now() - chrono::Duration::minutes(30));

    let before = Utc::now();
    fx.gw.write_all_text("~/docs/remote.txt", "r")?;
    assert_eq!(fx.gw.metadata("~/docs/remote.txt")?.backend, Backend::Remote);
    let merged = fx.gw.directory_last_write_time("~/docs")?.expect("directory time");
    assert!(merged >= before, "{} older than {}", merged, before);
    Ok(())
}

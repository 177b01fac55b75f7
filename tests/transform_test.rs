//! Rip, merge and split on synthetic executables.

mod common;

use common::{backup_of, embedded_exe, pack_project, write_fake_exe};
use gdpck_rs::{merge, rip, split, ArchiveReader, PckError};
use std::fs;
use tempfile::TempDir;

#[test]
fn test_merge_then_rip_in_place_is_identity() {
    let dir = TempDir::new().unwrap();
    let pck = dir.path().join("game.pck");
    let exe = dir.path().join("game.exe");
    pack_project(dir.path(), &pck, "1.3.4.2");
    let original = write_fake_exe(&exe, 8192);

    let report = merge(&pck, &exe, false).unwrap();
    assert!(!report.steps().is_empty());
    assert_eq!(fs::read(backup_of(&exe)).unwrap(), original);

    let reader = ArchiveReader::open(&exe).unwrap();
    assert!(reader.is_embedded());
    assert_eq!(reader.header_start(), 8192);
    drop(reader);

    rip(&exe, None, true).unwrap();
    assert_eq!(fs::read(&exe).unwrap(), original);
    assert!(!backup_of(&exe).exists());
}

#[test]
fn test_rip_to_file_then_merge_restores_package() {
    let dir = TempDir::new().unwrap();
    let exe = dir.path().join("game.exe");
    let (host, package) = embedded_exe(dir.path(), &exe);
    let embedded = fs::read(&exe).unwrap();

    let ripped = dir.path().join("ripped.pck");
    rip(&exe, Some(&ripped), false).unwrap();
    assert_eq!(fs::read(&exe).unwrap(), embedded);
    assert_eq!(fs::read(&ripped).unwrap(), package);

    // Strip, then merge the ripped package back
    rip(&exe, None, true).unwrap();
    assert_eq!(fs::read(&exe).unwrap(), host);
    merge(&ripped, &exe, true).unwrap();
    assert_eq!(fs::read(&exe).unwrap(), embedded);

    let mut reader = ArchiveReader::open(&exe).unwrap();
    assert_eq!(reader.read_file("res://icon.png").unwrap(), vec![0x89u8; 1500]);
}

#[test]
fn test_rip_keeps_backup_by_default() {
    let dir = TempDir::new().unwrap();
    let exe = dir.path().join("game.exe");
    embedded_exe(dir.path(), &exe);
    let embedded = fs::read(&exe).unwrap();

    rip(&exe, None, false).unwrap();
    assert_eq!(fs::read(backup_of(&exe)).unwrap(), embedded);
    assert!(matches!(
        ArchiveReader::open(&exe),
        Err(PckError::FormatInvalid(_))
    ));
}

#[cfg(unix)]
#[test]
fn test_rip_in_place_keeps_permissions() {
    use std::os::unix::fs::PermissionsExt;

    let dir = TempDir::new().unwrap();
    let exe = dir.path().join("game.x86_64");
    embedded_exe(dir.path(), &exe);
    fs::set_permissions(&exe, fs::Permissions::from_mode(0o755)).unwrap();

    rip(&exe, None, true).unwrap();
    let mode = fs::metadata(&exe).unwrap().permissions().mode();
    assert_eq!(mode & 0o777, 0o755);
}

#[test]
fn test_rip_not_embedded() {
    let dir = TempDir::new().unwrap();
    let pck = dir.path().join("game.pck");
    pack_project(dir.path(), &pck, "1.3.4.2");
    let before = fs::read(&pck).unwrap();

    assert!(matches!(rip(&pck, None, false), Err(PckError::NotEmbedded(_))));
    let out = dir.path().join("out.pck");
    assert!(matches!(
        rip(&pck, Some(&out), false),
        Err(PckError::NotEmbedded(_))
    ));
    assert_eq!(fs::read(&pck).unwrap(), before);
    assert!(!out.exists());
}

#[test]
fn test_same_path_conflicts() {
    let dir = TempDir::new().unwrap();
    let exe = dir.path().join("game.exe");
    embedded_exe(dir.path(), &exe);
    let before = fs::read(&exe).unwrap();

    assert!(matches!(
        rip(&exe, Some(&exe), false),
        Err(PckError::SamePathConflict(_))
    ));
    assert!(matches!(
        merge(&exe, &exe, false),
        Err(PckError::SamePathConflict(_))
    ));
    assert!(matches!(
        split(&exe, Some(&exe), true),
        Err(PckError::SamePathConflict(_))
    ));
    assert_eq!(fs::read(&exe).unwrap(), before);
    assert!(!backup_of(&exe).exists());
}

#[test]
fn test_rip_to_locked_output() {
    let dir = TempDir::new().unwrap();
    let exe = dir.path().join("game.exe");
    embedded_exe(dir.path(), &exe);
    let before = fs::read(&exe).unwrap();

    let out = dir.path().join("out.pck");
    fs::write(&out, b"held").unwrap();
    let holder = fs::File::open(&out).unwrap();
    holder.try_lock().unwrap();

    assert!(matches!(
        rip(&exe, Some(&out), false),
        Err(PckError::LockedOrInUse(_))
    ));
    assert_eq!(fs::read(&exe).unwrap(), before);
    assert_eq!(fs::read(&out).unwrap(), b"held");
}

#[test]
fn test_rip_locked_executable() {
    let dir = TempDir::new().unwrap();
    let exe = dir.path().join("game.exe");
    embedded_exe(dir.path(), &exe);
    let before = fs::read(&exe).unwrap();

    {
        let holder = fs::File::open(&exe).unwrap();
        holder.try_lock_shared().unwrap();
        assert!(matches!(
            rip(&exe, None, true),
            Err(PckError::LockedOrInUse(_))
        ));
    }
    assert_eq!(fs::read(&exe).unwrap(), before);
    assert!(!backup_of(&exe).exists());

    rip(&exe, None, true).unwrap();
    assert!(!backup_of(&exe).exists());
}

#[test]
fn test_merge_into_embedded_fails() {
    let dir = TempDir::new().unwrap();
    let exe = dir.path().join("game.exe");
    embedded_exe(dir.path(), &exe);
    let before = fs::read(&exe).unwrap();

    let pck = dir.path().join("other.pck");
    pack_project(dir.path(), &pck, "1.3.4.2");

    assert!(matches!(
        merge(&pck, &exe, false),
        Err(PckError::AlreadyEmbedded(_))
    ));
    assert_eq!(fs::read(&exe).unwrap(), before);
}

#[test]
fn test_merge_rejects_embedded_source() {
    let dir = TempDir::new().unwrap();
    let embedded = dir.path().join("game.exe");
    embedded_exe(dir.path(), &embedded);
    let host = dir.path().join("host.exe");
    let host_bytes = write_fake_exe(&host, 2048);

    assert!(matches!(
        merge(&embedded, &host, false),
        Err(PckError::FormatInvalid(_))
    ));
    assert_eq!(fs::read(&host).unwrap(), host_bytes);
}

#[test]
fn test_merge_missing_inputs() {
    let dir = TempDir::new().unwrap();
    let pck = dir.path().join("game.pck");
    pack_project(dir.path(), &pck, "1.3.4.2");

    assert!(matches!(
        merge(&dir.path().join("nope.pck"), &dir.path().join("game.exe"), false),
        Err(PckError::NotFound(_))
    ));
    assert!(matches!(
        merge(&pck, &dir.path().join("nope.exe"), false),
        Err(PckError::NotFound(_))
    ));
}

#[test]
fn test_merge_into_locked_executable() {
    let dir = TempDir::new().unwrap();
    let pck = dir.path().join("game.pck");
    let exe = dir.path().join("game.exe");
    pack_project(dir.path(), &pck, "1.3.4.2");
    let original = write_fake_exe(&exe, 4096);

    let holder = fs::File::open(&exe).unwrap();
    holder.try_lock().unwrap();

    assert!(matches!(
        merge(&pck, &exe, false),
        Err(PckError::LockedOrInUse(_))
    ));
    drop(holder);
    assert_eq!(fs::read(&exe).unwrap(), original);
    assert!(!backup_of(&exe).exists());
}

#[test]
fn test_unaligned_host() {
    let dir = TempDir::new().unwrap();
    let pck = dir.path().join("game.pck");
    let exe = dir.path().join("game.exe");
    pack_project(dir.path(), &pck, "2.4.2.0");
    let original = write_fake_exe(&exe, 4095);

    merge(&pck, &exe, true).unwrap();
    let mut reader = ArchiveReader::open(&exe).unwrap();
    assert_eq!(reader.header_start(), 4095);
    assert_eq!(reader.read_file("res://icon.png").unwrap(), vec![0x89u8; 1500]);
    drop(reader);

    rip(&exe, None, true).unwrap();
    assert_eq!(fs::read(&exe).unwrap(), original);
}

#[test]
fn test_split_with_new_name() {
    let dir = TempDir::new().unwrap();
    let exe = dir.path().join("game.exe");
    let (host, package) = embedded_exe(dir.path(), &exe);
    let embedded = fs::read(&exe).unwrap();

    let new_exe = dir.path().join("split/Split.exe");
    let new_pck = dir.path().join("split/Split.pck");
    split(&exe, Some(&new_exe), true).unwrap();

    assert_eq!(fs::read(&exe).unwrap(), embedded);
    assert_eq!(fs::read(&new_exe).unwrap(), host);
    assert_eq!(fs::read(&new_pck).unwrap(), package);
    assert!(!backup_of(&new_exe).exists());

    let reader = ArchiveReader::open(&new_pck).unwrap();
    assert!(!reader.is_embedded());
    assert_eq!(reader.entry_count(), common::project_files().len());
}

#[test]
fn test_split_in_place() {
    let dir = TempDir::new().unwrap();
    let exe = dir.path().join("game.exe");
    let (host, package) = embedded_exe(dir.path(), &exe);

    split(&exe, None, true).unwrap();
    assert_eq!(fs::read(&exe).unwrap(), host);
    assert_eq!(fs::read(dir.path().join("game.pck")).unwrap(), package);
    assert!(!backup_of(&exe).exists());

    // Nothing left to split
    assert!(matches!(split(&exe, None, true), Err(PckError::NotEmbedded(_))));
}

#[test]
fn test_split_with_locked_output_cleans_up() {
    let dir = TempDir::new().unwrap();
    let exe = dir.path().join("game.exe");
    embedded_exe(dir.path(), &exe);
    let embedded = fs::read(&exe).unwrap();

    let new_exe = dir.path().join("Split.exe");
    let new_pck = dir.path().join("Split.pck");
    fs::write(&new_pck, b"already here").unwrap();
    let holder = fs::File::open(&new_pck).unwrap();
    holder.try_lock().unwrap();

    assert!(matches!(
        split(&exe, Some(&new_exe), true),
        Err(PckError::LockedOrInUse(_))
    ));
    assert!(!new_exe.exists());
    assert_eq!(fs::read(&new_pck).unwrap(), b"already here");
    assert_eq!(fs::read(&exe).unwrap(), embedded);
}

#[test]
fn test_split_without_package() {
    let dir = TempDir::new().unwrap();
    let exe = dir.path().join("plain.exe");
    write_fake_exe(&exe, 1024);
    let new_exe = dir.path().join("copy.exe");

    assert!(matches!(
        split(&exe, Some(&new_exe), true),
        Err(PckError::NotEmbedded(_))
    ));
    assert!(!new_exe.exists());
    assert!(matches!(rip(&exe, None, true), Err(PckError::NotEmbedded(_))));
    assert!(!backup_of(&exe).exists());
}

/// Entries left behind by set-aside outputs
fn leftover_set_asides(dir: &std::path::Path) -> Vec<String> {
    fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .filter(|name| name.starts_with(".gdpck-"))
        .collect()
}

#[test]
fn test_failed_split_restores_existing_outputs() {
    let dir = TempDir::new().unwrap();
    let exe = dir.path().join("game.exe");
    embedded_exe(dir.path(), &exe);
    let embedded = fs::read(&exe).unwrap();

    let new_exe = dir.path().join("Split.exe");
    let new_pck = dir.path().join("Split.pck");
    fs::write(&new_exe, b"user exe").unwrap();
    fs::write(&new_pck, b"user pck").unwrap();

    // The strip step needs Split.old.exe; holding it makes the last step fail
    let holder = fs::File::create(backup_of(&new_exe)).unwrap();
    holder.try_lock().unwrap();

    assert!(matches!(
        split(&exe, Some(&new_exe), true),
        Err(PckError::LockedOrInUse(_))
    ));
    drop(holder);

    assert_eq!(fs::read(&new_exe).unwrap(), b"user exe");
    assert_eq!(fs::read(&new_pck).unwrap(), b"user pck");
    assert_eq!(fs::read(&exe).unwrap(), embedded);
    assert!(leftover_set_asides(dir.path()).is_empty());
}

#[test]
fn test_split_replaces_existing_outputs() {
    let dir = TempDir::new().unwrap();
    let exe = dir.path().join("game.exe");
    let (host, package) = embedded_exe(dir.path(), &exe);

    let new_exe = dir.path().join("Split.exe");
    let new_pck = dir.path().join("Split.pck");
    fs::write(&new_exe, b"user exe").unwrap();
    fs::write(&new_pck, b"user pck").unwrap();

    split(&exe, Some(&new_exe), true).unwrap();
    assert_eq!(fs::read(&new_exe).unwrap(), host);
    assert_eq!(fs::read(&new_pck).unwrap(), package);
    assert!(leftover_set_asides(dir.path()).is_empty());
}

#[test]
fn test_split_package_named_like_executable() {
    let dir = TempDir::new().unwrap();
    let exe = dir.path().join("game.pck");
    embedded_exe(dir.path(), &exe);
    let before = fs::read(&exe).unwrap();

    assert!(matches!(split(&exe, None, true), Err(PckError::SamePathConflict(_))));
    assert!(matches!(
        split(&exe, Some(&dir.path().join("game.exe")), true),
        Err(PckError::SamePathConflict(_))
    ));
    assert_eq!(fs::read(&exe).unwrap(), before);
    assert!(!dir.path().join("game.exe").exists());
}

#[cfg(unix)]
#[test]
fn test_failed_embed_restores_host() {
    use gdpck_rs::{scan_dir, ArchivePacker, PackOptions, PackVersion};

    let dir = TempDir::new().unwrap();
    let exe = dir.path().join("game.exe");
    let original = write_fake_exe(&exe, 4096);

    // A directory opens fine but fails once its bytes are read
    let project = common::create_project(dir.path());
    let mut files = scan_dir(&project).unwrap();
    files.push(gdpck_rs::FileToPack::new(
        project.join("scenes"),
        "res://scenes.bin".to_string(),
        0,
    ));

    let packer = ArchivePacker::new(PackOptions::new(PackVersion::new(1, 3, 4, 2)));
    assert!(packer.pack(&exe, &files, Some(&exe)).is_err());
    assert_eq!(fs::read(&exe).unwrap(), original);
    assert!(!backup_of(&exe).exists());

    // The host is still a plain executable and accepts a merge afterwards
    let pck = dir.path().join("game.pck");
    pack_project(dir.path(), &pck, "1.3.4.2");
    merge(&pck, &exe, true).unwrap();
    assert!(ArchiveReader::open(&exe).unwrap().is_embedded());
}

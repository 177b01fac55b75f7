//! Shared fixtures for integration tests

#![allow(dead_code)]

use gdpck_rs::{scan_dir, ArchivePacker, PackOptions, PackVersion};
use std::fs;
use std::path::{Path, PathBuf};

/// Project tree used by most tests: (relative path, contents)
pub fn project_files() -> Vec<(&'static str, Vec<u8>)> {
    vec![
        ("project.godot", b"config_version=4\n[application]\n".to_vec()),
        ("icon.png", vec![0x89; 1500]),
        ("scenes/main.tscn", b"[gd_scene load_steps=2 format=2]\n".to_vec()),
        ("scenes/levels/level1.tscn", (0..=255u8).cycle().take(70_000).collect()),
        ("scripts/player.gd", b"extends KinematicBody2D\n".to_vec()),
        ("empty.txt", Vec::new()),
    ]
}

/// Write the project tree below `root/project` and return its path
pub fn create_project(root: &Path) -> PathBuf {
    let project = root.join("project");
    for (name, data) in project_files() {
        let path = project.join(name);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, data).unwrap();
    }
    project
}

/// Pack the project tree into a standalone package at `dest`
pub fn pack_project(root: &Path, dest: &Path, version: &str) {
    let project = create_project(root);
    let files = scan_dir(&project).unwrap();
    let options = PackOptions::new(PackVersion::parse(version).unwrap());
    ArchivePacker::new(options).pack(dest, &files, None).unwrap();
}

/// Bytes standing in for a native executable
pub fn fake_exe_bytes(len: usize) -> Vec<u8> {
    let mut data = b"MZ\x90\x00".to_vec();
    data.extend((0..len.saturating_sub(4)).map(|i| (i * 7 % 251) as u8));
    data.truncate(len);
    data
}

pub fn write_fake_exe(path: &Path, len: usize) -> Vec<u8> {
    let data = fake_exe_bytes(len);
    fs::write(path, &data).unwrap();
    data
}

/// Host executable at `exe` with a freshly packed project merged into it.
/// Returns (host bytes, package bytes).
pub fn embedded_exe(root: &Path, exe: &Path) -> (Vec<u8>, Vec<u8>) {
    let pck = root.join("embedded_source.pck");
    pack_project(root, &pck, "1.3.4.2");
    let host = write_fake_exe(exe, 4096);
    gdpck_rs::merge(&pck, exe, true).unwrap();
    let package = fs::read(&pck).unwrap();
    fs::remove_file(&pck).unwrap();
    (host, package)
}

/// Backup name the engine uses for `path`
pub fn backup_of(path: &Path) -> PathBuf {
    gdpck_rs::fsutil::backup_path(path)
}

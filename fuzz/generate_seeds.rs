//! Generate seed corpus for fuzzing

use gdpck_rs::archive::{EmbedFooter, PackWriter};
use gdpck_rs::{FileToPack, PackVersion};
use std::fs;
use std::path::Path;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let corpus_dir = Path::new("fuzz/corpus/fuzz_archive_parse");
    let sources_dir = tempfile::TempDir::new()?;
    fs::create_dir_all(corpus_dir)?;

    println!("Generating seed corpus...");

    let mut files = Vec::new();
    for (name, data) in [
        ("project.godot", &b"config_version=5"[..]),
        ("icon.png", &[0x89u8; 300][..]),
        ("scenes/main.tscn", &b"[gd_scene format=3]"[..]),
        ("empty.txt", &b""[..]),
    ] {
        let source = sources_dir.path().join(name.replace('/', "_"));
        fs::write(&source, data)?;
        files.push(FileToPack::new(source, format!("res://{}", name), data.len() as u64));
    }

    for (label, version) in [
        ("godot2", PackVersion::new(0, 2, 1, 6)),
        ("godot3", PackVersion::new(1, 3, 5, 1)),
        ("godot4", PackVersion::new(2, 4, 2, 0)),
    ] {
        let writer = PackWriter::new(version, 8)?;

        // Standalone package
        let mut pck = Vec::new();
        writer.write_to(&mut pck, &files)?;
        let path = corpus_dir.join(format!("seed_{}.pck", label));
        fs::write(&path, &pck)?;
        println!("Generated: {}", path.display());

        // Same package appended to a fake executable
        let mut exe = b"MZ".to_vec();
        exe.resize(1024, 0xCC);
        exe.extend_from_slice(&pck);
        EmbedFooter::new(pck.len() as u64).write_to(&mut exe)?;
        let path = corpus_dir.join(format!("seed_{}_embedded.exe", label));
        fs::write(&path, &exe)?;
        println!("Generated: {}", path.display());

        // Header only
        let path = corpus_dir.join(format!("seed_{}_header.pck", label));
        fs::write(&path, &pck[..pck.len().min(120)])?;
        println!("Generated: {}", path.display());
    }

    println!("Seed corpus written to {}", corpus_dir.display());
    Ok(())
}

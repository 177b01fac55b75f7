#![no_main]

use gdpck_rs::ArchiveReader;
use libfuzzer_sys::fuzz_target;
use std::io::Write;
use tempfile::{NamedTempFile, TempDir};

fuzz_target!(|data: &[u8]| {
    // Anything shorter than a magic tag is rejected before parsing
    if data.len() < 4 {
        return;
    }

    let mut temp_file = match NamedTempFile::new() {
        Ok(f) => f,
        Err(_) => return,
    };
    if temp_file.write_all(data).is_err() || temp_file.flush().is_err() {
        return;
    }

    // Open must fail cleanly on garbage, never panic
    let mut reader = match ArchiveReader::open(temp_file.path()) {
        Ok(r) => r,
        Err(_) => return,
    };

    let _ = reader.info();
    let _ = reader.total_size();
    let _ = reader.filter("*", false);
    let _ = reader.contains("res://../../../etc/passwd");

    let paths: Vec<String> = reader.entries().iter().map(|e| e.path.clone()).collect();
    for path in &paths {
        let _ = reader.read_file(path);
    }

    // Extraction must stay inside the destination
    if let Ok(dest) = TempDir::new() {
        let _ = reader.extract_all(dest.path(), true);
    }
});

const SIZE_UNITS: [&str; 7] = ["bytes", "KB", "MB", "GB", "TB", "PB", "EB"];

/// Human readable size in 1024 based units, e.g. `1.5 MB`
pub fn size_suffix(bytes: u64, decimals: usize) -> String {
    if bytes < 1024 {
        return format!("{} bytes", bytes);
    }

    let mut unit = ((63 - bytes.leading_zeros()) / 10) as usize;
    let mut value = bytes as f64 / (1u64 << (unit * 10)) as f64;

    // 1023.99 KB rounds to 1024.0; show 1.0 MB instead
    let scale = 10f64.powi(decimals as i32);
    if (value * scale).round() / scale >= 1000.0 && unit + 1 < SIZE_UNITS.len() {
        unit += 1;
        value /= 1024.0;
    }

    format!("{:.*} {}", decimals, value, SIZE_UNITS[unit])
}

/// Match `text` against a pattern where `?` is any one char and `*` any run
pub fn wildcard_match(text: &str, pattern: &str, match_case: bool) -> bool {
    let (text, pattern): (Vec<char>, Vec<char>) = if match_case {
        (text.chars().collect(), pattern.chars().collect())
    } else {
        (
            text.chars().flat_map(char::to_lowercase).collect(),
            pattern.chars().flat_map(char::to_lowercase).collect(),
        )
    };

    let (mut t, mut p) = (0, 0);
    let mut star: Option<usize> = None;
    let mut resume = 0;

    while t < text.len() {
        if p < pattern.len() && (pattern[p] == '?' || pattern[p] == text[t]) {
            t += 1;
            p += 1;
        } else if p < pattern.len() && pattern[p] == '*' {
            star = Some(p);
            resume = t;
            p += 1;
        } else if let Some(s) = star {
            p = s + 1;
            resume += 1;
            t = resume;
        } else {
            return false;
        }
    }

    pattern[p..].iter().all(|&c| c == '*')
}

//! Shared formatting helpers for presenting snapshots.
//!
//! Pure string formatting only; classification lives in [`crate::present`].

const UNITS: [&str; 6] = ["B", "KB", "MB", "GB", "TB", "PB"];

/// Format byte count with binary scaling (step 1024).
///
/// `"512 B"`, `"1.00 KB"`, `"1.50 MB"`, `"3.00 PB"`. Values beyond the
/// petabyte range stay in PB.
pub fn format_bytes_binary(bytes: u64) -> String {
    let mut size = bytes as f64;
    let mut unit = 0;
    while size >= 1024.0 && unit < UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} {}", bytes, UNITS[0])
    } else {
        format!("{:.2} {}", size, UNITS[unit])
    }
}

/// Render a magic as its four little-endian bytes when printable.
///
/// `0x4D454D43` -> `"0x4d454d43 (CMEM)"`.
pub fn format_magic(magic: u32) -> String {
    let bytes = magic.to_le_bytes();
    if bytes.iter().all(|b| b.is_ascii_graphic()) {
        let text: String = bytes.iter().map(|&b| b as char).collect();
        format!("0x{:08x} ({})", magic, text)
    } else {
        format!("0x{:08x}", magic)
    }
}

/// Hex dump of the first `max` bytes, 16 per line.
pub fn hex_preview(buf: &[u8], max: usize) -> String {
    buf[..buf.len().min(max)]
        .chunks(16)
        .map(|line| {
            line.iter()
                .map(|b| format!("{:02x}", b))
                .collect::<Vec<_>>()
                .join(" ")
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Truncate string to max length with unicode ellipsis (`…`).
pub fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(1)).collect();
        format!("{}…", kept)
    }
}

//! Heading level normalization.
//!
//! Pages on the wiki commonly start at `##` because `#` rendered too large in
//! the editor. Exported pages get a synthesized `#` title, so every heading is
//! shifted up until the shallowest one sits at level 1.

/// Deepest heading level that is detected or rewritten. `########` and beyond
/// are left alone.
pub const DEEPEST_HEADING_LEVEL: usize = 7;

/// Returns the shallowest heading level present in `text`, or `None` when the
/// text holds no heading between levels 1 and 7.
///
/// A level-`n` heading is a line that starts with exactly `n` `#` characters
/// followed by a space.
pub fn detect_top_level(text: &str) -> Option<usize> {
    let mut top = None::<usize>;
    for line in text.split('\n') {
        if let Some(level) = heading_level(line) {
            if level == 1 {
                return Some(1);
            }
            top = Some(top.map_or(level, |current| current.min(level)));
        }
    }
    top
}

/// Moves every heading at `top` or deeper up by `top - 1` levels.
///
/// Each line is classified against the original text exactly once, so a
/// heading that was just rewritten is never picked up again as a shallower
/// level.
pub fn shift_headings(text: &str, top: usize) -> String {
    if top <= 1 {
        return text.to_string();
    }

    let mut output = String::with_capacity(text.len());
    for line in text.split_inclusive('\n') {
        match heading_level(line) {
            Some(level) if level >= top => {
                output.push_str(&"#".repeat(level - top + 1));
                output.push_str(&line[level..]);
            }
            _ => output.push_str(line),
        }
    }
    output
}

/// Detects the top heading level and shifts headings so it becomes 1.
pub fn normalize_headings(text: &str) -> String {
    match detect_top_level(text) {
        Some(top) if top > 1 => shift_headings(text, top),
        _ => text.to_string(),
    }
}

fn heading_level(line: &str) -> Option<usize> {
    let hashes = line.bytes().take_while(|byte| *byte == b'#').count();
    if hashes == 0 || hashes > DEEPEST_HEADING_LEVEL {
        return None;
    }
    (line.as_bytes().get(hashes) == Some(&b' ')).then_some(hashes)
}

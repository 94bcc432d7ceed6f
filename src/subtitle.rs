//! Subtitle cues and the SRT text format.
//!
//! Cues come in from extracted subtitle streams (parsed from SRT) and go out
//! as bilingual SRT records: sequence number, time range, translated line and
//! the original line.

const LINE_END: &str = "\r\n";

/// One timed subtitle line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cue {
    pub text: String,
    /// Start offset from the beginning of the media in milliseconds
    pub start_ms: u64,
    pub duration_ms: u64,
}

impl Cue {
    pub fn new<S: Into<String>>(text: S, start_ms: u64, duration_ms: u64) -> Self {
        Self {
            text: text.into(),
            start_ms,
            duration_ms,
        }
    }

    pub fn end_ms(&self) -> u64 {
        self.start_ms.saturating_add(self.duration_ms)
    }

    /// Collapse line breaks in place so the same text is sent and displayed
    pub fn normalize(&mut self) {
        self.text = normalize_text(&self.text);
    }
}

/// Replace every run of `\r`/`\n` with a single space and trim the ends
pub fn normalize_text(text: &str) -> String {
    let mut normalized = String::with_capacity(text.len());
    let mut in_break = false;

    for ch in text.chars() {
        if ch == '\r' || ch == '\n' {
            if !in_break {
                normalized.push(' ');
                in_break = true;
            }
        } else {
            normalized.push(ch);
            in_break = false;
        }
    }

    normalized.trim().to_string()
}

/// Format milliseconds to SRT time format (HH:MM:SS,mmm)
pub fn format_srt_time(total_ms: u64) -> String {
    let ms = total_ms % 1000;
    let s = (total_ms - ms) / 1000;
    let secs = s % 60;
    let s = (s - secs) / 60;
    let mins = s % 60;
    let hrs = (s - mins) / 60;

    format!("{:02}:{:02}:{:02},{:03}", hrs, mins, secs, ms)
}

/// Render one output record: number, time range, translation, original, blank line
pub fn render_record(sequence: u64, cue: &Cue, translation: &str) -> String {
    format!(
        "{seq}{nl}{start} --> {end}{nl}{translated}{nl}{original}{nl}{nl}",
        seq = sequence,
        start = format_srt_time(cue.start_ms),
        end = format_srt_time(cue.end_ms()),
        translated = normalize_text(translation),
        original = cue.text,
        nl = LINE_END,
    )
}

/// Parse SRT content as produced by `ffmpeg -f srt` into cues.
///
/// Malformed blocks are skipped. Multi-line cue text keeps its line breaks.
pub fn parse_srt(content: &str) -> Vec<Cue> {
    let content = content.trim_start_matches('\u{feff}');
    let mut cues = Vec::new();
    let mut lines = content.lines().map(|line| line.trim_end_matches('\r')).peekable();

    while let Some(line) = lines.next() {
        let line = line.trim();
        if line.is_empty() || line.parse::<u64>().is_err() {
            continue;
        }

        let Some(range) = lines.next().and_then(parse_time_range) else {
            continue;
        };

        let mut text_lines = Vec::new();
        while let Some(next) = lines.next_if(|next| !next.trim().is_empty()) {
            text_lines.push(next);
        }

        let (start_ms, end_ms) = range;
        cues.push(Cue::new(
            text_lines.join("\n"),
            start_ms,
            end_ms.saturating_sub(start_ms),
        ));
    }

    cues
}

/// Parse "00:00:10,500 --> 00:00:13,000" into (start_ms, end_ms)
fn parse_time_range(line: &str) -> Option<(u64, u64)> {
    let (start, end) = line.split_once("-->")?;
    // ASS-derived output may carry position hints after the end time
    let end = end.split_whitespace().next()?;
    Some((parse_srt_time(start.trim())?, parse_srt_time(end)?))
}

/// Parse "HH:MM:SS,mmm" (a '.' separator is accepted as well) into milliseconds
pub fn parse_srt_time(timecode: &str) -> Option<u64> {
    let mut parts = timecode.split(':');
    let hours: u64 = parts.next()?.parse().ok()?;
    let minutes: u64 = parts.next()?.parse().ok()?;
    let seconds_part = parts.next()?;
    if parts.next().is_some() {
        return None;
    }

    let (seconds, millis) = seconds_part.split_once([',', '.'])?;
    let seconds: u64 = seconds.parse().ok()?;
    let millis: u64 = millis.parse().ok()?;

    hours
        .checked_mul(3_600_000)?
        .checked_add(minutes.checked_mul(60_000)?)?
        .checked_add(seconds.checked_mul(1_000)?)?
        .checked_add(millis)
}

use std::sync::OnceLock;

use chrono::{NaiveDate, NaiveDateTime};
use regex::Regex;

/// Frame names look like `i240630_122337-0.png` (`iYYMMDD_HHMMSS-<n>.png`).
const FRAME_NAME_PATTERN: &str = r"^i(\d{2})(\d{2})(\d{2})_(\d{2})(\d{2})(\d{2})-\d+\.png$";

fn frame_name_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| Regex::new(FRAME_NAME_PATTERN).expect("frame name pattern is valid"))
}

/// Capture time encoded in a frame's file name, `None` when the name doesn't
/// follow the camera's convention or encodes an impossible date.
pub fn capture_time(file_name: &str) -> Option<NaiveDateTime> {
    let caps = frame_name_regex().captures(file_name)?;
    let field = |i: usize| caps[i].parse::<u32>().ok();
    NaiveDate::from_ymd_opt(2000 + field(1)? as i32, field(2)?, field(3)?)?.and_hms_opt(
        field(4)?,
        field(5)?,
        field(6)?,
    )
}

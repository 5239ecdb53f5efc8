use chrono::Local;

/// Local wall-clock time as `YYYY-MM-DD HH:MM:SS`.
pub fn now_standard_string() -> String {
    Local::now().format("%Y-%m-%d %H:%M:%S").to_string()
}

/// Local date and time as separate `YYYY-MM-DD` and `HH:MM:SS` strings.
pub fn local_date_and_time() -> (String, String) {
    let now = Local::now();
    (now.format("%Y-%m-%d").to_string(), now.format("%H:%M:%S").to_string())
}

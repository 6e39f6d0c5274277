/// Utility for deciding whether the scanner needs an elevation wrapper

/// Check if the current process already runs with root privileges. When it
/// does, the scan tool is spawned directly; otherwise it goes through sudo.
#[cfg(unix)]
pub fn is_root() -> bool {
    unsafe { libc::geteuid() == 0 }
}

#[cfg(not(unix))]
pub fn is_root() -> bool {
    false
}

/// One-line hint appended to the transcript when elevation fails.
pub fn elevation_hint(tool: &str) -> String {
    format!(
        "The scanner needs raw socket access. Check that your account may run `sudo {}`.",
        tool
    )
}

use std::net::Ipv4Addr;
use std::process::ExitStatus;

use cidr::Ipv4Cidr;
use lazy_static::lazy_static;
use regex::Regex;
use thiserror::Error;

use crate::enums::{CidrSuffix, ExitKind, ScanMode};

lazy_static! {
    /// Lines sudo writes while collecting the password. They belong to the
    /// elevation handshake, not to the scan output.
    static ref PROMPT_NOISE: Regex =
        Regex::new(r"\[sudo\]|password for").expect("invalid prompt-noise pattern");
}

/// Everything that can go wrong across one scan session.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ScanError {
    #[error("no target network or IP address was given")]
    InvalidTarget,
    #[error("`{0}` was not found on PATH; is it installed?")]
    ToolNotFound(String),
    #[error("authentication failed; the password was not accepted")]
    AuthenticationFailed,
    #[error("failed to start the scan subprocess: {0}")]
    ProcessStart(String),
    #[error("the scan subprocess terminated abnormally")]
    Crashed,
    #[error("the scan subprocess exited with code {0}")]
    ExitedNonZero(i32),
    #[error("lost contact with the scan subprocess: {0}")]
    Channel(String),
    #[error("could not write the output file: {0}")]
    OutputWrite(String),
}

/// User-chosen parameters for one scan. Cloned into the session on start and
/// immutable for its duration.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct ScanConfig {
    pub target: String,
    pub cidr: CidrSuffix,
    pub mode: ScanMode,
    pub no_resolve: bool,
    pub timeout_ms: u64,
    pub output_path: Option<String>,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            target: String::from("192.168.1.0"),
            cidr: CidrSuffix::default(),
            mode: ScanMode::default(),
            no_resolve: true,
            timeout_ms: 1000,
            output_path: None,
        }
    }
}

impl ScanConfig {
    pub fn validate(&self) -> Result<(), ScanError> {
        if self.target.trim().is_empty() {
            return Err(ScanError::InvalidTarget);
        }
        Ok(())
    }

    /// The target handed to the tool: bare IPv4 addresses get the selected
    /// CIDR suffix appended, anything else (hostname, explicit `a.b.c.d/n`)
    /// passes through untouched.
    pub fn full_target(&self) -> String {
        let target = self.target.trim();
        if target.parse::<Ipv4Addr>().is_ok() {
            format!("{}{}", target, self.cidr)
        } else {
            target.to_string()
        }
    }

    /// The scan range, when the full target is valid CIDR notation.
    pub fn range(&self) -> Option<Ipv4Cidr> {
        self.full_target().parse::<Ipv4Cidr>().ok()
    }

    /// Argument vector for the tool. Built as discrete arguments and handed
    /// straight to the spawn call; target and path values never pass through
    /// a shell.
    pub fn scan_args(&self) -> Vec<String> {
        let mut args = vec![String::from("-r"), self.full_target()];
        if self.mode == ScanMode::Ping {
            args.push(String::from("-p"));
        }
        if self.no_resolve {
            args.push(String::from("-n"));
        }
        // One-shot parsable output; without it the tool stays in its
        // interactive screen and never exits.
        args.push(String::from("-P"));
        args
    }

    /// Human-readable command line for the transcript header.
    pub fn display_command(&self, tool: &str, elevated: bool) -> String {
        let mut parts = Vec::new();
        if elevated {
            parts.push(String::from("sudo"));
        }
        parts.push(tool.to_string());
        parts.extend(self.scan_args());
        parts.join(" ")
    }
}

/// True for sudo's password-prompt chatter, filtered from the transcript
/// during the elevation phase only.
pub fn is_prompt_noise(line: &str) -> bool {
    PROMPT_NOISE.is_match(line)
}

pub fn classify_exit(status: ExitStatus) -> ExitKind {
    match status.code() {
        Some(0) => ExitKind::Completed,
        Some(code) => ExitKind::Code(code),
        // No code means the process was killed by a signal.
        None => ExitKind::Crashed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn config() -> ScanConfig {
        ScanConfig::default()
    }

    #[test]
    fn blank_target_fails_validation() {
        let mut c = config();
        c.target = String::from("   ");
        assert_eq!(c.validate(), Err(ScanError::InvalidTarget));
    }

    #[test]
    fn bare_address_gets_cidr_suffix() {
        let mut c = config();
        c.target = String::from("10.0.0.1");
        c.cidr = CidrSuffix::Slash16;
        assert_eq!(c.full_target(), "10.0.0.1/16");
    }

    #[test]
    fn explicit_range_passes_through() {
        let mut c = config();
        c.target = String::from("10.0.0.0/8");
        assert_eq!(c.full_target(), "10.0.0.0/8");
    }

    #[test]
    fn hostname_passes_through() {
        let mut c = config();
        c.target = String::from("gateway.lan");
        assert_eq!(c.full_target(), "gateway.lan");
    }

    #[test]
    fn ping_no_resolve_argument_order() {
        let mut c = config();
        c.target = String::from("192.168.1.0");
        c.cidr = CidrSuffix::Slash24;
        c.mode = ScanMode::Ping;
        c.no_resolve = true;
        assert_eq!(c.scan_args(), vec!["-r", "192.168.1.0/24", "-p", "-n", "-P"]);
    }

    #[test]
    fn arp_scan_omits_ping_flag() {
        let mut c = config();
        c.mode = ScanMode::Arp;
        c.no_resolve = false;
        assert_eq!(c.scan_args(), vec!["-r", "192.168.1.0/24", "-P"]);
    }

    #[test]
    fn display_command_includes_elevation_wrapper() {
        let c = config();
        let line = c.display_command("netdiscover", true);
        assert!(line.starts_with("sudo netdiscover -r 192.168.1.0/24"));
    }

    #[test]
    fn range_reports_the_scan_width() {
        let c = config();
        let range = c.range().unwrap();
        assert_eq!(range.network_length(), 24);
    }

    #[test]
    fn prompt_noise_detection() {
        assert!(is_prompt_noise("[sudo] password for chleba: "));
        assert!(is_prompt_noise("Enter password for admin:"));
        assert!(!is_prompt_noise("192.168.1.1   00:11:22:33:44:55   1   60  Unknown vendor"));
    }
}

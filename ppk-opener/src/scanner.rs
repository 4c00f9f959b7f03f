//! Box code acquisition
//!
//! Barcode readers used at parcel terminals behave like keyboards: they emit
//! the decoded QR contents followed by a line terminator. A scanner therefore
//! reads one line per scan, either from stdin or from the reader's device node.

use ppk_common::config::ScannerConfig;
use std::fs::File;
use std::io::{self, BufRead, BufReader, Write};
use std::path::PathBuf;
use tracing::{debug, warn};

/// Options applied when launching a scan
#[derive(Debug, Clone)]
pub struct ScanOptions {
    pub prompt: String,
    pub beep: bool,
}

impl From<&ScannerConfig> for ScanOptions {
    fn from(config: &ScannerConfig) -> Self {
        Self {
            prompt: config.prompt.clone(),
            beep: config.beep,
        }
    }
}

impl Default for ScanOptions {
    fn default() -> Self {
        ScanOptions::from(&ScannerConfig::default())
    }
}

/// Result of one scan attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanOutcome {
    /// Decoded code contents
    Scanned(String),
    /// User cancelled or the input ended
    Cancelled,
    /// The reader could not be opened; nothing was scanned
    PermissionDenied(String),
}

/// Source of scanned box codes
pub trait Scanner {
    fn scan(&mut self, options: &ScanOptions) -> ScanOutcome;
}

/// Reads one code per line from any buffered reader
pub struct LineScanner<R, W> {
    input: R,
    prompt_out: W,
}

impl<R: BufRead, W: Write> LineScanner<R, W> {
    pub fn new(input: R, prompt_out: W) -> Self {
        Self { input, prompt_out }
    }
}

impl LineScanner<io::StdinLock<'static>, io::Stdout> {
    /// Scanner reading from the process stdin
    pub fn stdin() -> Self {
        Self::new(io::stdin().lock(), io::stdout())
    }
}

impl<R: BufRead, W: Write> Scanner for LineScanner<R, W> {
    fn scan(&mut self, options: &ScanOptions) -> ScanOutcome {
        if !options.prompt.is_empty() {
            let _ = writeln!(self.prompt_out, "{}", options.prompt);
            let _ = self.prompt_out.flush();
        }
        read_code(&mut self.input, options.beep, &mut self.prompt_out)
    }
}

/// Reads codes from a barcode reader's device node (serial or HID raw)
///
/// The node is opened on every scan, so a permission granted after a denial
/// takes effect on the next attempt.
pub struct DeviceScanner {
    path: PathBuf,
}

impl DeviceScanner {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl Scanner for DeviceScanner {
    fn scan(&mut self, options: &ScanOptions) -> ScanOutcome {
        let file = match File::open(&self.path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::PermissionDenied => {
                warn!(device = %self.path.display(), "Scanner permission denied");
                return ScanOutcome::PermissionDenied(format!("{}: {}", self.path.display(), e));
            }
            Err(e) => {
                warn!(device = %self.path.display(), error = %e, "Scanner unavailable");
                return ScanOutcome::Cancelled;
            }
        };

        let mut stdout = io::stdout();
        if !options.prompt.is_empty() {
            let _ = writeln!(stdout, "{}", options.prompt);
        }
        read_code(&mut BufReader::new(file), options.beep, &mut stdout)
    }
}

fn read_code<R: BufRead, W: Write>(input: &mut R, beep: bool, out: &mut W) -> ScanOutcome {
    let mut line = String::new();
    match input.read_line(&mut line) {
        Ok(0) => ScanOutcome::Cancelled,
        Ok(_) => {
            let code = line.trim_end_matches(['\r', '\n']);
            if code.is_empty() {
                return ScanOutcome::Cancelled;
            }
            if beep {
                let _ = write!(out, "\x07");
                let _ = out.flush();
            }
            debug!(code = %code, "Code scanned");
            ScanOutcome::Scanned(code.to_string())
        }
        Err(e) => {
            warn!(error = %e, "Failed to read scanner input");
            ScanOutcome::Cancelled
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn scanner(input: &str) -> LineScanner<Cursor<Vec<u8>>, Vec<u8>> {
        LineScanner::new(Cursor::new(input.as_bytes().to_vec()), Vec::new())
    }

    #[test]
    fn test_scan_returns_line_without_terminator() {
        let mut s = scanner("42\r\n");
        assert_eq!(s.scan(&ScanOptions::default()), ScanOutcome::Scanned("42".into()));
    }

    #[test]
    fn test_scan_keeps_inner_whitespace_verbatim() {
        let mut s = scanner(" box 7 \n");
        assert_eq!(s.scan(&ScanOptions::default()), ScanOutcome::Scanned(" box 7 ".into()));
    }

    #[test]
    fn test_empty_line_and_eof_cancel() {
        let mut s = scanner("\n");
        assert_eq!(s.scan(&ScanOptions::default()), ScanOutcome::Cancelled);
        assert_eq!(s.scan(&ScanOptions::default()), ScanOutcome::Cancelled);
    }

    #[test]
    fn test_prompt_and_beep_written() {
        let mut s = scanner("1\n");
        let options = ScanOptions {
            prompt: "Scan a QR code".into(),
            beep: true,
        };
        s.scan(&options);
        let out = String::from_utf8(s.prompt_out.clone()).unwrap();
        assert_eq!(out, "Scan a QR code\n\x07");
    }

    #[test]
    fn test_sequential_scans() {
        let mut s = scanner("1\n2\n");
        assert_eq!(s.scan(&ScanOptions::default()), ScanOutcome::Scanned("1".into()));
        assert_eq!(s.scan(&ScanOptions::default()), ScanOutcome::Scanned("2".into()));
    }

    #[cfg(unix)]
    #[test]
    fn test_device_permission_denied() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("reader");
        std::fs::write(&path, "42\n").unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o000)).unwrap();

        // root ignores file modes
        if File::open(&path).is_ok() {
            return;
        }

        let mut s = DeviceScanner::new(&path);
        let options = ScanOptions {
            prompt: String::new(),
            beep: false,
        };
        assert!(matches!(s.scan(&options), ScanOutcome::PermissionDenied(_)));
    }

    #[test]
    fn test_device_reads_code() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("reader");
        std::fs::write(&path, "1234\n").unwrap();

        let mut s = DeviceScanner::new(&path);
        let options = ScanOptions {
            prompt: String::new(),
            beep: false,
        };
        assert_eq!(s.scan(&options), ScanOutcome::Scanned("1234".into()));
    }
}

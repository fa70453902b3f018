//! Chromaprint fingerprint generation via the fpcalc tool
//!
//! Feeds 16 kHz mono s16le PCM to `fpcalc -raw` and parses the
//! `FINGERPRINT=` line (comma-separated 32-bit integers). Every failure
//! path (missing binary, non-zero exit, timeout, missing output line)
//! returns `None`: the caller treats an absent chromaprint as "no
//! content-dedup performed", not an error.

use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::warn;

/// Wall-clock budget for one fpcalc run
const FPCALC_TIMEOUT: Duration = Duration::from_secs(30);

/// Generate a raw chromaprint fingerprint from 16 kHz s16le PCM.
pub async fn generate_chromaprint(
    fpcalc_bin: &str,
    pcm_16k_s16le: &[u8],
    duration: f64,
) -> Option<String> {
    if pcm_16k_s16le.is_empty() {
        return None;
    }

    let mut child = match Command::new(fpcalc_bin)
        .args([
            "-raw",
            "-rate",
            "16000",
            "-channels",
            "1",
            "-length",
            &(duration as i64).to_string(),
            "-signed",
            "-",
        ])
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
    {
        Ok(child) => child,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            warn!(bin = fpcalc_bin, "fpcalc binary not found; chromaprint unavailable");
            return None;
        }
        Err(e) => {
            warn!(error = %e, "Failed to spawn fpcalc");
            return None;
        }
    };

    let mut stdin = child.stdin.take()?;
    let input = pcm_16k_s16le.to_vec();
    let writer = tokio::spawn(async move {
        let _ = stdin.write_all(&input).await;
    });

    let output = match tokio::time::timeout(FPCALC_TIMEOUT, child.wait_with_output()).await {
        Ok(Ok(output)) => output,
        Ok(Err(e)) => {
            warn!(error = %e, "fpcalc I/O error");
            return None;
        }
        Err(_) => {
            warn!("fpcalc timed out after {:?}", FPCALC_TIMEOUT);
            return None;
        }
    };
    let _ = writer.await;

    if !output.status.success() {
        warn!(
            code = output.status.code().unwrap_or(-1),
            stderr = %String::from_utf8_lossy(&output.stderr).trim(),
            "fpcalc exited with error"
        );
        return None;
    }

    parse_fpcalc_output(&String::from_utf8_lossy(&output.stdout))
}

/// Pull the raw fingerprint out of fpcalc stdout.
fn parse_fpcalc_output(stdout: &str) -> Option<String> {
    for line in stdout.lines() {
        if let Some(fp) = line.trim().strip_prefix("FINGERPRINT=") {
            return Some(fp.to_string());
        }
    }
    warn!("fpcalc output did not contain FINGERPRINT line");
    None
}

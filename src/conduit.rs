use std::io::Write;
use std::process::{Command, Stdio};

use serde::Deserialize;
use serde_json::Value;

use crate::error::{ImportError, Result};

/// A named Conduit method invocation with a JSON parameter object.
///
/// Every mutation the migration performs goes through this seam; the
/// engine tests run against an in-memory implementation. Failures are
/// terminal: callers propagate them with `?` and the whole run aborts.
/// There is no retry and no partial-failure recovery.
pub trait Conduit {
    fn call(&self, method: &str, params: Value) -> Result<Value>;
}

/// Conduit client backed by `arc call-conduit`: parameters go to the child
/// process as JSON on stdin, the response envelope comes back on stdout.
///
/// The API token is explicit constructor state, passed on the command line
/// exactly as arcanist expects. Diagnostics never echo it.
pub struct ArcConduit {
    token: String,
    arc_bin: String,
}

impl ArcConduit {
    pub fn new(token: String, arc_bin: String) -> Self {
        Self { token, arc_bin }
    }
}

/// What `arc call-conduit` prints on stdout: exactly one of `error` or
/// `response` is meaningful.
#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(default)]
    error: Option<Value>,
    #[serde(default, rename = "errorMessage")]
    error_message: Option<String>,
    #[serde(default)]
    response: Value,
}

impl Conduit for ArcConduit {
    fn call(&self, method: &str, params: Value) -> Result<Value> {
        let input = serde_json::to_string(&params)?;

        let transport = |detail: String| ImportError::Transport {
            method: method.to_string(),
            input: input.clone(),
            bin: self.arc_bin.clone(),
            detail,
        };

        let mut child = Command::new(&self.arc_bin)
            .arg("call-conduit")
            .arg("--conduit-token")
            .arg(&self.token)
            .arg(method)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| transport(format!("failed to spawn `{}`: {e}", self.arc_bin)))?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| transport("failed to open stdin for the arc process".into()))?;
        // An arc that dies without draining stdin surfaces here as a broken
        // pipe; that is still a transport failure, not a local io error.
        stdin
            .write_all(input.as_bytes())
            .map_err(|e| transport(format!("failed to write request to arc stdin: {e}")))?;
        drop(stdin);

        let output = child
            .wait_with_output()
            .map_err(|e| transport(format!("failed to collect arc output: {e}")))?;
        if !output.status.success() {
            let stdout = String::from_utf8_lossy(&output.stdout);
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(transport(format!(
                "arc exited with {}: {}{}",
                output.status,
                stdout.trim(),
                stderr.trim(),
            )));
        }

        match parse_envelope(&output.stdout) {
            Ok(envelope) => envelope_response(method, &input, &self.arc_bin, envelope),
            Err(e) => Err(transport(format!("unparseable arc output: {e}"))),
        }
    }
}

fn parse_envelope(stdout: &[u8]) -> serde_json::Result<Envelope> {
    serde_json::from_slice(stdout)
}

fn envelope_response(method: &str, input: &str, bin: &str, envelope: Envelope) -> Result<Value> {
    match envelope.error {
        Some(error) if !error.is_null() => Err(ImportError::ConduitRejected {
            method: method.to_string(),
            input: input.to_string(),
            bin: bin.to_string(),
            message: envelope
                .error_message
                .unwrap_or_else(|| error.to_string()),
        }),
        _ => Ok(envelope.response),
    }
}

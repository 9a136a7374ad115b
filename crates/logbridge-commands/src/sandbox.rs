//! Isolated execution of `run` command scripts.
//!
//! [`ProcessSandbox`] starts a fresh JavaScript runtime process for every
//! invocation. The process gets an empty environment, the script request on
//! stdin, and nothing else: its only way back into the notebook is the
//! `logseq` object built from the API endpoint and token in the request.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, error, trace};
use url::Url;

use crate::error::{CommandError, Result};
use crate::executor::ExecutionResult;

/// A script invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScriptRequest {
    /// Function body.
    pub body: String,
    /// Parameter names the body sees.
    pub params: Vec<String>,
    /// Positional arguments bound to `params`.
    pub args: Vec<Value>,
}

/// Somewhere to run `run` scripts.
#[async_trait]
pub trait Sandbox: Send + Sync {
    /// Run one script to completion. A script that throws yields
    /// [`CommandError::Script`] carrying the thrown message.
    async fn run(&self, request: ScriptRequest) -> Result<ExecutionResult>;
}

/// Reads the request from stdin, redirects console output, runs the body as
/// an async function and prints a single JSON reply line.
const BOOTSTRAP: &str = r##"
const chunks = [];
process.stdin.on("data", (chunk) => chunks.push(chunk));
process.stdin.on("end", async () => {
  const emit = (reply) => {
    let line;
    try {
      line = JSON.stringify(reply);
    } catch (e) {
      line = JSON.stringify({ ok: false, result: null, logs: [], error: "result is not serializable: " + e.message });
    }
    process.stdout.write(line + "\n");
  };

  let req;
  try {
    req = JSON.parse(Buffer.concat(chunks).toString("utf8"));
  } catch (e) {
    emit({ ok: false, result: null, logs: [], error: "invalid request: " + e.message });
    return;
  }

  const logs = [];
  const capture = (...data) => { logs.push(...data); };
  for (const level of ["log", "info", "warn", "error", "debug"]) {
    console[level] = capture;
  }

  const call = async (method, ...args) => {
    const res = await fetch(req.api.url, {
      method: "POST",
      headers: { "Content-Type": "application/json", "Authorization": "Bearer " + req.api.token },
      body: JSON.stringify({ method, args }),
    });
    if (!res.ok) {
      throw new Error(method + " failed with HTTP " + res.status);
    }
    const text = await res.text();
    return text ? JSON.parse(text) : null;
  };
  const namespace = (ns) => new Proxy({}, {
    get: (_, name) => name === "then" ? undefined : (...args) => call("logseq." + ns + "." + String(name), ...args),
  });
  const logseq = { api: call, App: namespace("App"), DB: namespace("DB"), Editor: namespace("Editor") };

  try {
    const factory = new Function(
      "logseq",
      "return async function(" + req.params.join(", ") + ") { \"use strict\"; " + req.body + "\n};"
    );
    const result = await factory(logseq).apply(null, req.args);
    emit({ ok: true, result: result === undefined ? null : result, logs });
  } catch (e) {
    const message = e && e.message !== undefined ? String(e.message) : String(e);
    emit({ ok: false, result: null, logs, error: message });
  }
});
"##;

/// Reply line printed by the bootstrap.
#[derive(Debug, Deserialize)]
struct SandboxReply {
    ok: bool,
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    logs: Vec<Value>,
    #[serde(default)]
    error: Option<String>,
}

/// Runs each script in a new, environment-less JavaScript runtime process.
#[derive(Debug, Clone)]
pub struct ProcessSandbox {
    runtime: PathBuf,
    api_url: Url,
    api_token: String,
}

impl ProcessSandbox {
    /// Resolve `runtime` (a path or a name on `PATH`) and bind the sandbox to
    /// the API server at `base_url`; scripts call its `/api` endpoint.
    pub fn new(runtime: impl AsRef<OsStr>, base_url: Url, api_token: impl Into<String>) -> Result<Self> {
        let runtime = runtime.as_ref();
        let resolved = which::which(runtime)
            .map_err(|_| CommandError::RuntimeNotFound(runtime.to_string_lossy().into_owned()))?;
        let api_url = base_url
            .join("api")
            .map_err(|e| CommandError::Sandbox(format!("invalid API url {base_url}: {e}")))?;
        debug!(runtime = %resolved.display(), api = %api_url, "script runtime found");
        Ok(Self {
            runtime: resolved,
            api_url,
            api_token: api_token.into(),
        })
    }

    /// Check whether `runtime` can be found.
    pub fn is_available(runtime: impl AsRef<OsStr>) -> bool {
        which::which(runtime).is_ok()
    }

    /// Resolved runtime binary.
    pub fn runtime(&self) -> &Path {
        &self.runtime
    }

    /// Endpoint scripts send `logseq` calls to.
    pub fn api_url(&self) -> &Url {
        &self.api_url
    }

    fn payload(&self, request: &ScriptRequest) -> Value {
        json!({
            "body": request.body,
            "params": request.params,
            "args": request.args,
            "api": { "url": self.api_url.as_str(), "token": self.api_token },
        })
    }
}

/// Interpret the runtime's stdout: the last non-empty line is the reply.
fn parse_reply(stdout: &str, stderr: &str) -> Result<ExecutionResult> {
    let line = stdout
        .lines()
        .rev()
        .find(|l| !l.trim().is_empty())
        .ok_or_else(|| CommandError::Sandbox(format!("no reply from script runtime: {}", stderr.trim())))?;

    let reply: SandboxReply = serde_json::from_str(line)
        .map_err(|e| CommandError::Sandbox(format!("malformed reply ({e}): {line}")))?;

    if reply.ok {
        Ok(ExecutionResult {
            result: reply.result,
            logs: reply.logs,
        })
    } else {
        Err(CommandError::Script(reply.error.unwrap_or_default()))
    }
}

#[async_trait]
impl Sandbox for ProcessSandbox {
    async fn run(&self, request: ScriptRequest) -> Result<ExecutionResult> {
        let mut child = Command::new(&self.runtime)
            .arg("-e")
            .arg(BOOTSTRAP)
            .env_clear()
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        let input = serde_json::to_vec(&self.payload(&request))?;
        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(&input).await?;
            // Closing stdin lets the bootstrap start.
            drop(stdin);
        }

        let output = child.wait_with_output().await?;
        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);
        trace!(status = %output.status, stdout = %stdout, stderr = %stderr, "script runtime exited");

        parse_reply(&stdout, &stderr).inspect_err(|e| {
            if e.is_internal() {
                error!(error = %e, status = %output.status, "sandbox failed");
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_ok_reply() {
        let result = parse_reply("noise\n{\"ok\":true,\"result\":\"hi\",\"logs\":[1]}\n", "").unwrap();
        assert_eq!(result.result, Some(json!("hi")));
        assert_eq!(result.logs, vec![json!(1)]);
    }

    #[test]
    fn test_parse_error_reply() {
        let err = parse_reply("{\"ok\":false,\"result\":null,\"logs\":[],\"error\":\"boom\"}", "").unwrap_err();
        assert_eq!(err.to_string(), "boom");
    }

    #[test]
    fn test_parse_missing_reply() {
        let err = parse_reply("", "SyntaxError").unwrap_err();
        assert!(err.is_internal());
        assert!(err.to_string().contains("SyntaxError"));
    }

    #[test]
    fn test_missing_runtime() {
        let url: Url = "http://127.0.0.1:12315".parse().unwrap();
        let err = ProcessSandbox::new("definitely-not-a-js-runtime-xyz", url, "t").unwrap_err();
        assert!(matches!(err, CommandError::RuntimeNotFound(_)));
    }

    fn node_sandbox() -> Option<ProcessSandbox> {
        // Skip if node not available
        if !ProcessSandbox::is_available("node") {
            return None;
        }
        let url: Url = "http://127.0.0.1:9".parse().unwrap();
        ProcessSandbox::new("node", url, "token").ok()
    }

    #[tokio::test]
    async fn test_run_binds_params() {
        let Some(sandbox) = node_sandbox() else { return };
        let result = sandbox
            .run(ScriptRequest {
                body: "return \"hi \" + name;".to_string(),
                params: vec!["name".to_string()],
                args: vec![json!("John Doe")],
            })
            .await
            .unwrap();
        assert_eq!(result, ExecutionResult::value(json!("hi John Doe")));
    }

    #[tokio::test]
    async fn test_run_captures_logs() {
        let Some(sandbox) = node_sandbox() else { return };
        let result = sandbox
            .run(ScriptRequest {
                body: "console.log(\"a\", 1); console.error(\"b\");".to_string(),
                params: vec![],
                args: vec![],
            })
            .await
            .unwrap();
        assert_eq!(result.returned(), None);
        assert_eq!(result.logs, vec![json!("a"), json!(1), json!("b")]);
    }

    #[tokio::test]
    async fn test_run_throw() {
        let Some(sandbox) = node_sandbox() else { return };
        let err = sandbox
            .run(ScriptRequest {
                body: "throw new Error(\"boom\");".to_string(),
                params: vec![],
                args: vec![],
            })
            .await
            .unwrap_err();
        assert!(matches!(err, CommandError::Script(ref m) if m == "boom"));
    }

    #[tokio::test]
    async fn test_run_has_no_environment() {
        let Some(sandbox) = node_sandbox() else { return };
        let result = sandbox
            .run(ScriptRequest {
                body: "return Object.keys(process.env).length;".to_string(),
                params: vec![],
                args: vec![],
            })
            .await
            .unwrap();
        assert_eq!(result.returned(), Some(&json!(0)));
    }

    #[test]
    fn test_api_url_matches_client_endpoint() {
        // Skip if node not available
        if !ProcessSandbox::is_available("node") {
            return;
        }
        let base: Url = "http://127.0.0.1:12315".parse().unwrap();
        let sandbox = ProcessSandbox::new("node", base.clone(), "t").unwrap();
        let client = logbridge_notebook::LogseqClient::new(base, "t");
        assert_eq!(sandbox.api_url(), client.endpoint());
        assert_eq!(sandbox.api_url().path(), "/api");
    }

    /// Accept one HTTP request, answer it with `body`, and hand back the raw request.
    async fn serve_once(listener: tokio::net::TcpListener, body: &'static str) -> String {
        use tokio::io::AsyncReadExt;

        let (mut socket, _) = listener.accept().await.unwrap();
        let mut request = Vec::new();
        let mut buf = [0u8; 4096];
        loop {
            let n = socket.read(&mut buf).await.unwrap();
            if n == 0 {
                break;
            }
            request.extend_from_slice(&buf[..n]);
            let text = String::from_utf8_lossy(&request).to_string();
            if let Some(head_end) = text.find("\r\n\r\n") {
                let length = text[..head_end]
                    .lines()
                    .find_map(|l| {
                        let (name, value) = l.split_once(':')?;
                        name.eq_ignore_ascii_case("content-length")
                            .then(|| value.trim().parse::<usize>().ok())
                            .flatten()
                    })
                    .unwrap_or(0);
                if request.len() >= head_end + 4 + length {
                    break;
                }
            }
        }

        let response = format!(
            "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            body.len(),
            body
        );
        socket.write_all(response.as_bytes()).await.unwrap();
        socket.shutdown().await.ok();
        String::from_utf8_lossy(&request).to_string()
    }

    #[tokio::test]
    async fn test_script_reaches_notebook_api() {
        // Skip if node not available
        if !ProcessSandbox::is_available("node") {
            return;
        }
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base: Url = format!("http://{}", listener.local_addr().unwrap()).parse().unwrap();
        let server = tokio::spawn(serve_once(listener, r#"{"uuid":"x","content":"hello"}"#));

        let sandbox = ProcessSandbox::new("node", base, "secret-token").unwrap();
        let result = sandbox
            .run(ScriptRequest {
                body: "const b = await logseq.Editor.getBlock('x'); return b.content;".to_string(),
                params: vec![],
                args: vec![],
            })
            .await
            .unwrap();
        assert_eq!(result.returned(), Some(&json!("hello")));

        let request = server.await.unwrap();
        assert!(request.starts_with("POST /api HTTP/1.1"), "{request}");
        assert!(request.to_ascii_lowercase().contains("authorization: bearer secret-token"));
        assert!(request.contains(r#""method":"logseq.Editor.getBlock""#));
        assert!(request.contains(r#""args":["x"]"#));
    }
}

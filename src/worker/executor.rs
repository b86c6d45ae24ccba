//! Invocation of the external inscription tool, once per eligible txid.
//!
//! The executor owns the retry bookkeeping: at most `max_retries` attempts
//! per txid, after which the txid is skipped forever (the ledger keeps it
//! pending and the introspection endpoint surfaces it). The in-flight set is
//! claimed before the subprocess starts and released on every exit path, so
//! the wallet tool is never running twice for one txid.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use log::{debug, error, info, warn};
use tokio::process::Command;
use tokio::time::sleep;

use super::client::{MonitorClient, PendingMint};
use super::journal::{JournalEntry, MintJournal};
use super::state::WorkerState;

/// Substrings in the tool's stderr that mark the run as failed even when
/// stdout parses. Case-sensitive.
const STDERR_FAILURE_MARKERS: [&str; 3] = ["insufficient funds", "error", "failed"];

pub struct MintExecutor {
    state: Arc<WorkerState>,
    client: MonitorClient,
    journal: Arc<MintJournal>,
    command_template: String,
    wallet: String,
    file: PathBuf,
    max_retries: u32,
    retry_backoff: Duration,
}

impl MintExecutor {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        state: Arc<WorkerState>,
        client: MonitorClient,
        journal: Arc<MintJournal>,
        command_template: String,
        wallet: String,
        file: PathBuf,
        max_retries: u32,
        retry_backoff: Duration,
    ) -> Self {
        Self {
            state,
            client,
            journal,
            command_template,
            wallet,
            file,
            max_retries,
            retry_backoff,
        }
    }

    /// Handles one pending mint end to end. Never returns an error: every
    /// failure is contained here as a logged retry or a poisoned txid.
    pub async fn process(&self, mint: &PendingMint) {
        let txid = &mint.txid;

        let attempts = self.state.attempts_for(txid);
        if attempts >= self.max_retries {
            debug!(txid = &**txid, attempts = attempts; "Skipping mint, retries exhausted");
            return;
        }

        // The monitor never queues a senderless record; if one shows up
        // anyway, park it instead of crashing or spinning.
        let Some(destination) = mint.sender_address.clone() else {
            warn!(txid = &**txid; "Pending mint has no sender address; parking it");
            self.state.poison(txid, self.max_retries);
            return;
        };

        if !self.state.begin(txid) {
            return;
        }
        self.attempt(mint, &destination).await;
        self.state.finish(txid);
    }

    async fn attempt(&self, mint: &PendingMint, destination: &str) {
        let txid = &mint.txid;
        info!(
            txid = &**txid,
            amount = mint.amount,
            destination = destination;
            "Invoking inscription tool"
        );

        match self.run_tool(destination).await {
            Ok(inscription_id) => {
                let entry = JournalEntry {
                    txid: txid.clone(),
                    inscription_id: inscription_id.clone(),
                    destination: destination.to_string(),
                    timestamp: Utc::now().to_rfc3339(),
                };
                if let Err(e) = self.journal.append(&entry) {
                    error!(txid = &**txid, error:% = e; "Failed to journal the mint");
                }

                match self.client.confirm_mint(txid, &inscription_id).await {
                    Ok(()) => {
                        self.state.clear_attempts(txid);
                        self.state.record_mint();
                        info!(
                            target: "audit",
                            txid = &**txid,
                            inscription_id = &*inscription_id;
                            "Mint confirmed with the monitor"
                        );
                    },
                    Err(e) => {
                        // The inscription is on-chain but the ledger does not
                        // know. Attempts stay untouched; the next tick retries
                        // and the monitor's settled-record check answers it.
                        warn!(
                            txid = &**txid,
                            inscription_id = &*inscription_id,
                            error:% = e;
                            "Inscription created but confirmation failed; will retry"
                        );
                    },
                }
            },
            Err(reason) => {
                let attempts = self.state.record_failure(txid);
                warn!(
                    txid = &**txid,
                    attempt = attempts,
                    max_retries = self.max_retries,
                    reason = &*reason;
                    "Inscription attempt failed"
                );
                sleep(self.retry_backoff).await;
            },
        }
    }

    /// Runs the inscription tool and extracts the inscription id. The tool
    /// may legitimately take minutes; no timeout is imposed here.
    async fn run_tool(&self, destination: &str) -> Result<String, String> {
        let argv = build_command(&self.command_template, &self.wallet, &self.file, destination);
        let Some((program, args)) = argv.split_first() else {
            return Err("mint command template is empty".to_string());
        };

        let output = Command::new(program)
            .args(args)
            .output()
            .await
            .map_err(|e| format!("failed to spawn `{}`: {}", program, e))?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);

        if !output.status.success() {
            return Err(format!("tool exited with {}: {}", output.status, first_line(&stderr)));
        }
        if stderr_signals_failure(&stderr) {
            return Err(format!("tool reported failure: {}", first_line(&stderr)));
        }

        parse_inscription_id(&stdout).ok_or_else(|| "no inscription id in tool output".to_string())
    }
}

/// Substitutes the template placeholders and splits into argv.
pub fn build_command(template: &str, wallet: &str, file: &PathBuf, destination: &str) -> Vec<String> {
    template
        .replace("{wallet}", wallet)
        .replace("{file}", &file.display().to_string())
        .replace("{destination}", destination)
        .split_whitespace()
        .map(String::from)
        .collect()
}

/// Extracts the inscription id from tool output. Two formats are tolerated:
/// a JSON object carrying `inscriptions[0].id`, and a plain
/// `inscription_id: <value>` line.
pub fn parse_inscription_id(stdout: &str) -> Option<String> {
    if let Ok(value) = serde_json::from_str::<serde_json::Value>(stdout.trim())
        && let Some(id) = value["inscriptions"][0]["id"].as_str()
    {
        return Some(id.to_string());
    }

    for line in stdout.lines() {
        if let Some(rest) = line.trim().strip_prefix("inscription_id:") {
            let id = rest.trim();
            if !id.is_empty() {
                return Some(id.to_string());
            }
        }
    }

    None
}

pub fn stderr_signals_failure(stderr: &str) -> bool {
    STDERR_FAILURE_MARKERS.iter().any(|marker| stderr.contains(marker))
}

fn first_line(text: &str) -> &str {
    text.lines().next().unwrap_or("").trim()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::fs::PermissionsExt;
    use tempfile::{TempDir, tempdir};
    use url::Url;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn txid(n: u8) -> String {
        format!("{:02x}", n).repeat(32)
    }

    fn pending(n: u8, sender: Option<&str>) -> PendingMint {
        PendingMint {
            txid: txid(n),
            amount: 2000,
            timestamp: 123,
            sender_address: sender.map(String::from),
        }
    }

    /// Writes an executable script and returns a command template invoking it
    /// with the destination as its argument.
    fn fake_tool(dir: &TempDir, body: &str) -> String {
        let script = dir.path().join("fake-ord.sh");
        std::fs::write(&script, format!("#!/bin/sh\n{body}\n")).unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();
        format!("{} {{wallet}} {{file}} {{destination}}", script.display())
    }

    fn executor(dir: &TempDir, server: &MockServer, template: String, max_retries: u32) -> MintExecutor {
        let state = Arc::new(WorkerState::new());
        let client = MonitorClient::new(Url::parse(&server.uri()).unwrap()).unwrap();
        let journal = Arc::new(MintJournal::new(dir.path().join("mints.json")));
        MintExecutor::new(
            state,
            client,
            journal,
            template,
            "test-wallet".to_string(),
            dir.path().join("bitbar.png"),
            max_retries,
            Duration::ZERO,
        )
    }

    async fn mock_confirm(server: &MockServer, expected: u64) {
        Mock::given(method("POST"))
            .and(path("/api/confirm-mint"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"success": true})))
            .expect(expected)
            .mount(server)
            .await;
    }

    #[test]
    fn build_command_substitutes_placeholders() {
        let argv = build_command(
            "ord wallet --name {wallet} inscribe --file {file} --destination {destination}",
            "main",
            &PathBuf::from("art/bitbar.png"),
            "bc1qsender",
        );
        assert_eq!(
            argv,
            vec![
                "ord",
                "wallet",
                "--name",
                "main",
                "inscribe",
                "--file",
                "art/bitbar.png",
                "--destination",
                "bc1qsender",
            ]
        );
    }

    #[test]
    fn parses_json_inscription_output() {
        let id = parse_inscription_id(r#"{"commit":"c1","inscriptions":[{"id":"abc123i0"}],"fees":330}"#);
        assert_eq!(id.as_deref(), Some("abc123i0"));
    }

    #[test]
    fn parses_line_inscription_output() {
        let id = parse_inscription_id("minting...\ninscription_id: def456i0\ndone\n");
        assert_eq!(id.as_deref(), Some("def456i0"));
    }

    #[test]
    fn unparseable_output_yields_none() {
        assert_eq!(parse_inscription_id("all good, trust me"), None);
        assert_eq!(parse_inscription_id(r#"{"inscriptions":[]}"#), None);
        assert_eq!(parse_inscription_id("inscription_id:"), None);
    }

    #[test]
    fn stderr_markers() {
        assert!(stderr_signals_failure("error: insufficient funds"));
        assert!(stderr_signals_failure("the operation failed"));
        assert!(!stderr_signals_failure("warning: fee rate is high"));
        // Case-sensitive on purpose.
        assert!(!stderr_signals_failure("Error: something"));
    }

    #[tokio::test]
    async fn successful_mint_confirms_and_journals() {
        let dir = tempdir().unwrap();
        let server = MockServer::start().await;
        mock_confirm(&server, 1).await;

        let template = fake_tool(&dir, r#"echo '{"inscriptions":[{"id":"abc123i0"}]}'"#);
        let executor = executor(&dir, &server, template, 3);

        executor.process(&pending(1, Some("bc1qsender"))).await;

        assert_eq!(executor.state.total_mints(), 1);
        assert_eq!(executor.state.attempts_for(&txid(1)), 0);
        assert!(!executor.state.is_in_flight(&txid(1)));

        let entries = executor.journal.load_entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].inscription_id, "abc123i0");
        assert_eq!(entries[0].destination, "bc1qsender");
    }

    #[tokio::test]
    async fn stderr_failure_increments_attempts_even_with_parseable_stdout() {
        let dir = tempdir().unwrap();
        let server = MockServer::start().await;
        mock_confirm(&server, 0).await;

        let template = fake_tool(
            &dir,
            r#"echo '{"inscriptions":[{"id":"abc123i0"}]}'
echo 'error: insufficient funds' >&2"#,
        );
        let executor = executor(&dir, &server, template, 3);

        executor.process(&pending(1, Some("bc1qsender"))).await;

        assert_eq!(executor.state.attempts_for(&txid(1)), 1);
        assert_eq!(executor.state.total_mints(), 0);
        assert!(executor.journal.load_entries().is_empty());
        assert!(!executor.state.is_in_flight(&txid(1)));
    }

    #[tokio::test]
    async fn retries_stop_at_the_ceiling() {
        let dir = tempdir().unwrap();
        let server = MockServer::start().await;
        mock_confirm(&server, 0).await;

        // Counts invocations into a file, always fails.
        let count_file = dir.path().join("count");
        let template = fake_tool(
            &dir,
            &format!("echo x >> {}\necho 'error: broke' >&2", count_file.display()),
        );
        let executor = executor(&dir, &server, template, 3);

        let mint = pending(1, Some("bc1qsender"));
        for _ in 0..5 {
            executor.process(&mint).await;
        }

        assert_eq!(executor.state.attempts_for(&txid(1)), 3);
        let invocations = std::fs::read_to_string(&count_file).unwrap().lines().count();
        assert_eq!(invocations, 3);
    }

    #[tokio::test]
    async fn missing_sender_poisons_without_invoking_the_tool() {
        let dir = tempdir().unwrap();
        let server = MockServer::start().await;

        let count_file = dir.path().join("count");
        let template = fake_tool(&dir, &format!("echo x >> {}", count_file.display()));
        let executor = executor(&dir, &server, template, 3);

        executor.process(&pending(1, None)).await;

        assert_eq!(executor.state.attempts_for(&txid(1)), 3);
        assert!(!count_file.exists());
    }

    #[tokio::test]
    async fn confirm_failure_keeps_attempts_untouched() {
        let dir = tempdir().unwrap();
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/confirm-mint"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let template = fake_tool(&dir, r#"echo '{"inscriptions":[{"id":"abc123i0"}]}'"#);
        let executor = executor(&dir, &server, template, 3);

        executor.process(&pending(1, Some("bc1qsender"))).await;

        // The inscription happened: journaled, but not counted as a confirmed
        // mint, and eligible for the next tick without burning a retry.
        assert_eq!(executor.state.attempts_for(&txid(1)), 0);
        assert_eq!(executor.state.total_mints(), 0);
        assert_eq!(executor.journal.load_entries().len(), 1);
    }

    #[tokio::test]
    async fn concurrent_handlers_for_one_txid_run_the_tool_once() {
        let dir = tempdir().unwrap();
        let server = MockServer::start().await;
        mock_confirm(&server, 1).await;

        let count_file = dir.path().join("count");
        let template = fake_tool(
            &dir,
            &format!(
                "echo x >> {}\nsleep 0.3\necho '{{\"inscriptions\":[{{\"id\":\"abc123i0\"}}]}}'",
                count_file.display()
            ),
        );
        let executor = Arc::new(executor(&dir, &server, template, 3));

        let mint = pending(1, Some("bc1qsender"));
        let first = tokio::spawn({
            let executor = executor.clone();
            let mint = mint.clone();
            async move { executor.process(&mint).await }
        });
        // Give the first handler time to claim the in-flight slot.
        tokio::time::sleep(Duration::from_millis(100)).await;
        executor.process(&mint).await;
        first.await.unwrap();

        let invocations = std::fs::read_to_string(&count_file).unwrap().lines().count();
        assert_eq!(invocations, 1);
        assert_eq!(executor.state.total_mints(), 1);
    }
}

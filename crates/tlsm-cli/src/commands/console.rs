//! Console command - run control commands from stdin.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tlsm_approval::ApproverNotifier;
use tlsm_config::Config;
use tlsm_engine::{ControlInterface, DecisionEngine, Writer};

use crate::config_bridge::to_engine_settings;
use crate::identity::{FixedIdentity, current_program, current_uid};
use crate::theme::Theme;

/// Start an engine and feed it control commands from stdin until EOF.
///
/// Commands run as the invoking user, with this executable as the writer's
/// program identity.
pub(crate) async fn run_console(config: &Config, rules: Option<&Path>) -> anyhow::Result<()> {
    let uid = current_uid();
    let program = current_program();

    let engine = Arc::new(DecisionEngine::new(
        Arc::new(FixedIdentity::new(program.clone(), uid)),
        notifier(),
        to_engine_settings(config),
    ));
    let control = ControlInterface::new(Arc::clone(&engine), config.approvers.trusted.iter().cloned());

    if let Some(path) = startup_rules(config, rules) {
        let policies = tlsm_policy::load_policy_file(&path)
            .with_context(|| format!("failed to load {}", path.display()))?;
        let count = engine.rules().apply(policies)?;
        eprintln!(
            "{}",
            Theme::info(&format!("applied {count} rules from {}", path.display()))
        );
    }

    let writer = Writer::new(uid, program);
    let stdin = BufReader::new(tokio::io::stdin());
    let mut stdout = std::io::stdout().lock();
    run_session(&control, &writer, stdin, &mut stdout).await
}

/// The explicit `--rules` file, else the configured startup file if it
/// exists.
fn startup_rules(config: &Config, explicit: Option<&Path>) -> Option<PathBuf> {
    explicit
        .map(Path::to_path_buf)
        .or_else(|| config.policies.file.clone().filter(|p| p.exists()))
}

#[cfg(unix)]
fn notifier() -> Arc<dyn ApproverNotifier> {
    Arc::new(tlsm_approval::SignalNotifier::new())
}

#[cfg(not(unix))]
fn notifier() -> Arc<dyn ApproverNotifier> {
    Arc::new(tlsm_approval::ChannelNotifier::new())
}

/// Execute each input line and write its output to `out`.
///
/// Blank lines and `#` comments are skipped; `quit` or `exit` ends the
/// session. Rejected commands are reported on stderr and do not stop the
/// session.
async fn run_session<R, W>(
    control: &ControlInterface,
    writer: &Writer,
    input: R,
    out: &mut W,
) -> anyhow::Result<()>
where
    R: AsyncBufRead + Unpin,
    W: Write,
{
    let mut lines = input.lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if matches!(line, "quit" | "exit") {
            break;
        }
        match control.execute(writer, line) {
            Ok(output) if output.is_empty() => {},
            Ok(output) => writeln!(out, "{output}")?,
            Err(e) => eprintln!("{}", Theme::error(&e.to_string())),
        }
        out.flush()?;
    }
    Ok(())
}

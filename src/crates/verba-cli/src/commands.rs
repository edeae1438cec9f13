//! Subcommand implementations
//!
//! Commands write to a caller-supplied writer and read corrections from a
//! caller-supplied reader so they can run against scripted adapters in tests.

use anyhow::Context;
use futures::StreamExt;
use std::io::{BufRead, Write};
use verba_core::{CompletedRun, PendingReview, RunDriver, RunEvent, RunStream, StepEvent};
use verba_http::ServiceClient;

/// Arguments of `verba run`
#[derive(Debug, Clone)]
pub struct RunArgs {
    pub text: String,
    pub language: String,
    pub session: Option<String>,
    /// Leave a suspended run parked instead of asking for a correction
    pub no_prompt: bool,
}

pub async fn run<R, W>(driver: &RunDriver, args: RunArgs, input: &mut R, out: &mut W) -> anyhow::Result<()>
where
    R: BufRead,
    W: Write,
{
    let stream = match &args.session {
        Some(key) => driver.run_with_session(key, &args.text, &args.language),
        None => driver.run(&args.text, &args.language),
    };

    let mut pending = drain(stream, out).await?;
    while let Some(review) = pending.take() {
        if args.no_prompt {
            print_resume_hint(&review, out)?;
            break;
        }

        write!(out, "Corrected translation (empty to leave suspended): ")?;
        out.flush()?;
        let mut line = String::new();
        input
            .read_line(&mut line)
            .context("failed to read correction")?;

        let corrected = line.trim();
        if corrected.is_empty() {
            print_resume_hint(&review, out)?;
            break;
        }
        pending = drain(review.resume_stream(corrected), out).await?;
    }
    Ok(())
}

pub async fn resume<W: Write>(
    driver: &RunDriver,
    session_key: &str,
    corrected: &str,
    out: &mut W,
) -> anyhow::Result<()> {
    if let Some(review) = drain(driver.resume_stream(session_key, corrected), out).await? {
        print_resume_hint(&review, out)?;
    }
    Ok(())
}

pub async fn status<W: Write>(driver: &RunDriver, session_key: &str, out: &mut W) -> anyhow::Result<()> {
    match driver.status(session_key).await? {
        Some(run) => writeln!(out, "{}", serde_json::to_string_pretty(&run)?)?,
        None => writeln!(out, "No stored run for session '{}'", session_key)?,
    }
    Ok(())
}

pub async fn corrections<W: Write>(driver: &RunDriver, out: &mut W) -> anyhow::Result<()> {
    let entries = driver.machine().corrections().load_all().await;
    if entries.is_empty() {
        writeln!(out, "No corrections recorded")?;
    }
    for entry in entries {
        writeln!(out, "{} => {}", entry.source, entry.correction)?;
    }
    Ok(())
}

/// Print the most recent `limit` audit entries as JSON Lines
pub async fn audit<W: Write>(driver: &RunDriver, limit: Option<usize>, out: &mut W) -> anyhow::Result<()> {
    let entries = driver.machine().audit_log().entries().await?;
    let skip = limit.map_or(0, |n| entries.len().saturating_sub(n));
    for entry in entries.iter().skip(skip) {
        writeln!(out, "{}", serde_json::to_string(entry)?)?;
    }
    Ok(())
}

pub async fn health<W: Write>(client: &ServiceClient, out: &mut W) -> anyhow::Result<()> {
    let url = &client.config().base_url;
    if client.check_health().await {
        writeln!(out, "Service at {} is healthy", url)?;
        Ok(())
    } else {
        anyhow::bail!("service at {} is unreachable", url)
    }
}

/// Print events until the stream ends; a suspension is handed back
async fn drain<W: Write>(mut stream: RunStream, out: &mut W) -> anyhow::Result<Option<PendingReview>> {
    while let Some(event) = stream.next().await {
        match event? {
            RunEvent::Step(step) => print_step(&step, out)?,
            RunEvent::Suspended(review) => {
                print_suspension(&review, out)?;
                return Ok(Some(review));
            }
            RunEvent::Completed(run) => {
                print_completed(&run, out)?;
                return Ok(None);
            }
        }
    }
    Ok(None)
}

fn print_step<W: Write>(step: &StepEvent, out: &mut W) -> std::io::Result<()> {
    let produced = serde_json::Value::Object(step.produced.clone());
    writeln!(out, "[{}] {} {}", step.step, step.node, produced)
}

fn print_suspension<W: Write>(review: &PendingReview, out: &mut W) -> std::io::Result<()> {
    writeln!(out)?;
    writeln!(out, "Human review required for session {}", review.session_key)?;
    if let Some(qc) = &review.qc {
        writeln!(
            out,
            "QC: accuracy {}, hallucination {}",
            qc.accuracy_score(),
            qc.hallucination_score()
        )?;
    }
    writeln!(out, "Reason: {}", review.reasoning)?;
    writeln!(out, "Current translation: {}", review.current_translation)
}

fn print_resume_hint<W: Write>(review: &PendingReview, out: &mut W) -> std::io::Result<()> {
    writeln!(
        out,
        "Run left suspended. Resume with: verba resume {} \"<corrected translation>\"",
        review.session_key
    )
}

fn print_completed<W: Write>(run: &CompletedRun, out: &mut W) -> std::io::Result<()> {
    writeln!(out)?;
    writeln!(out, "Completed session {}", run.session_key)?;
    writeln!(out, "Translation: {}", run.audit.final_translation)?;
    match &run.audit.final_qc {
        Some(qc) => writeln!(
            out,
            "QC: accuracy {}, hallucination {} ({})",
            qc.accuracy_score(),
            qc.hallucination_score(),
            if qc.is_pass() { "pass" } else { "fail" }
        )?,
        None => writeln!(out, "QC: replaced by human review")?,
    }
    for warning in &run.warnings {
        writeln!(out, "warning: {}", warning)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use verba_core::testing::{ScriptedQualityChecker, ScriptedTranslator, TestHarness};

    fn args(no_prompt: bool) -> RunArgs {
        RunArgs {
            text: "Hello".to_string(),
            language: "French".to_string(),
            session: Some("cli-1".to_string()),
            no_prompt,
        }
    }

    fn text(out: Vec<u8>) -> String {
        String::from_utf8(out).unwrap()
    }

    #[tokio::test]
    async fn test_run_prints_steps_and_result() {
        let harness = TestHarness::new(
            ScriptedTranslator::always("Bonjour"),
            ScriptedQualityChecker::scores(9, 3, "fine"),
        );
        let mut out = Vec::new();
        run(&harness.driver(), args(false), &mut Cursor::new(""), &mut out)
            .await
            .unwrap();

        let out = text(out);
        assert!(out.contains("[1] translate {\"translated_text\":\"Bonjour\"}"), "{}", out);
        assert!(out.contains("[2] qc"));
        assert!(out.contains("Completed session cli-1"));
        assert!(out.contains("QC: accuracy 9, hallucination 10 (pass)"));
    }

    #[tokio::test]
    async fn test_run_prompts_for_correction() {
        let harness = TestHarness::new(
            ScriptedTranslator::always("Bonjour"),
            ScriptedQualityChecker::scores(3, 3, "too formal"),
        );
        let mut out = Vec::new();
        run(&harness.driver(), args(false), &mut Cursor::new("Salut\n"), &mut out)
            .await
            .unwrap();

        let out = text(out);
        assert!(out.contains("Reason: too formal"));
        assert!(out.contains("[3] human_review"));
        assert!(out.contains("Translation: Salut"));
        assert!(out.contains("QC: replaced by human review"));
        assert_eq!(harness.corrections.load_all().await.len(), 1);
    }

    #[tokio::test]
    async fn test_no_prompt_leaves_run_parked() {
        let harness = TestHarness::new(
            ScriptedTranslator::always("Bonjour"),
            ScriptedQualityChecker::scores(3, 3, "too formal"),
        );
        let driver = harness.driver();
        let mut out = Vec::new();
        run(&driver, args(true), &mut Cursor::new("ignored\n"), &mut out)
            .await
            .unwrap();
        assert!(text(out).contains("verba resume cli-1"));

        let mut out = Vec::new();
        resume(&driver, "cli-1", "Salut", &mut out).await.unwrap();
        assert!(text(out).contains("Translation: Salut"));
    }

    #[tokio::test]
    async fn test_resume_unknown_session_fails() {
        let harness = TestHarness::new(
            ScriptedTranslator::always("Bonjour"),
            ScriptedQualityChecker::scores(9, 9, "ok"),
        );
        let err = resume(&harness.driver(), "missing", "Salut", &mut Vec::new())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("No such session"));
    }

    #[tokio::test]
    async fn test_listings() {
        let harness = TestHarness::new(
            ScriptedTranslator::always("Bonjour"),
            ScriptedQualityChecker::scores(3, 3, "no"),
        );
        let driver = harness.driver();

        let mut out = Vec::new();
        corrections(&driver, &mut out).await.unwrap();
        assert_eq!(text(out), "No corrections recorded\n");

        run(&driver, args(false), &mut Cursor::new("Salut\n"), &mut Vec::new())
            .await
            .unwrap();

        let mut out = Vec::new();
        corrections(&driver, &mut out).await.unwrap();
        assert_eq!(text(out), "Hello => Salut\n");

        let mut out = Vec::new();
        audit(&driver, Some(5), &mut out).await.unwrap();
        let out = text(out);
        assert_eq!(out.lines().count(), 1);
        assert!(out.contains("\"final_translation\":\"Salut\""));

        let mut out = Vec::new();
        status(&driver, "cli-1", &mut out).await.unwrap();
        assert_eq!(text(out), "No stored run for session 'cli-1'\n");
    }
}

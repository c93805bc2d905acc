//! Participant entry prompt: collects whatever identity fields were not
//! passed on the command line before the window opens.

use anyhow::{Context, Result};
use std::io::{BufRead, Write};
use visex_experiment::SessionInfo;

pub struct ParticipantFields {
    pub subject: Option<String>,
    pub age: Option<u32>,
    pub gender: Option<String>,
    pub run: u32,
}

/// Build the session identity, prompting on stdin for missing fields.
pub fn collect(fields: ParticipantFields) -> Result<SessionInfo> {
    let stdin = std::io::stdin();
    let mut lines = stdin.lock();

    let subject = match fields.subject {
        Some(s) if !s.trim().is_empty() => s.trim().to_string(),
        _ => prompt_required(&mut lines, "Subject id")?,
    };
    let age = match fields.age {
        Some(a) => Some(a),
        None => prompt_optional(&mut lines, "Age (optional)")?.and_then(|s| s.parse().ok()),
    };
    let gender = match fields.gender {
        Some(g) => Some(g),
        None => prompt_optional(&mut lines, "Gender (optional)")?,
    };

    Ok(SessionInfo {
        subject,
        age,
        gender,
        run: fields.run,
    })
}

fn prompt_required(input: &mut impl BufRead, label: &str) -> Result<String> {
    loop {
        if let Some(value) = prompt_optional(input, label)? {
            return Ok(value);
        }
    }
}

fn prompt_optional(input: &mut impl BufRead, label: &str) -> Result<Option<String>> {
    print!("{label}: ");
    std::io::stdout().flush().context("flush stdout")?;

    let mut line = String::new();
    let n = input.read_line(&mut line).context("read stdin")?;
    if n == 0 {
        anyhow::bail!("stdin closed while waiting for participant details");
    }
    let trimmed = line.trim();
    Ok((!trimmed.is_empty()).then(|| trimmed.to_string()))
}

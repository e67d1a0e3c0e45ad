//! `sitelens chat`: line-oriented chat about an uploaded file.

use std::io::{self, BufRead, Write};
use std::path::Path;

use anyhow::{Context, Result};
use sitelens_core::{CandidateFile, ChatDriver, Config};

const CLEAR_COMMAND: &str = "/clear";

pub fn run(config: &Config, file: &Path) -> Result<()> {
    let candidate = CandidateFile::from_path(file)?;
    let chat = ChatDriver::new(super::session_manager(config)?);
    let rt = super::runtime()?;

    let session = rt
        .block_on(chat.open(candidate))
        .context("failed to upload media")?;
    println!(
        "Session {} ready. Ask a question, or type {} to end.",
        session.session_id, CLEAR_COMMAND
    );

    let stdin = io::stdin();
    let mut stdout = io::stdout();
    loop {
        print!("> ");
        stdout.flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line == CLEAR_COMMAND {
            break;
        }

        let reply = rt.block_on(chat.send_message(line))?;
        println!("{}\n", reply.content);
    }

    rt.block_on(chat.clear())?;
    println!("Session cleared.");
    Ok(())
}

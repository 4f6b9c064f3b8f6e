//! The `engines` subcommand.

use std::io;

use crate::{engines::EngineKind, prelude::*};

/// List the engines we know about.
#[instrument(level = "debug", skip_all)]
pub fn cmd_engines() -> Result<()> {
    let mut out = io::stdout().lock();
    list_engines(&mut out).context("failed to write engine list")
}

fn list_engines<W: io::Write>(out: &mut W) -> io::Result<()> {
    for &kind in EngineKind::ALL {
        writeln!(
            out,
            "{:<10} {:<10} {}",
            kind.id(),
            kind.display_name(),
            kind.description()
        )?;
    }
    out.flush()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lists_every_engine_once() {
        let mut out = Vec::new();
        list_engines(&mut out).unwrap();
        let out = String::from_utf8(out).unwrap();
        let ids = out
            .lines()
            .map(|line| line.split_whitespace().next().unwrap())
            .collect::<Vec<_>>();
        assert_eq!(ids, ["tesseract", "easyocr", "paddleocr"]);
        assert!(out.contains("EasyOCR"));
    }
}

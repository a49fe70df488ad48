use std::io::{self, Write};

use serde::Serialize;

use crate::app::{AnnotateResult, AvailableResult, MergeResult, OutdatedResult};

#[derive(Debug, Clone, Copy)]
pub enum OutputMode {
    Plain,
    Json,
}

pub struct JsonOutput;

impl JsonOutput {
    pub fn print_available(result: &AvailableResult) -> io::Result<()> {
        Self::print_json(result)
    }

    pub fn print_merge(result: &MergeResult) -> io::Result<()> {
        Self::print_json(result)
    }

    pub fn print_annotate(result: &AnnotateResult) -> io::Result<()> {
        Self::print_json(result)
    }

    pub fn print_outdated(result: &OutdatedResult) -> io::Result<()> {
        Self::print_json(result)
    }

    fn print_json<T: Serialize>(value: &T) -> io::Result<()> {
        let json = serde_json::to_string_pretty(value).map_err(io::Error::other)?;
        let mut stdout = io::stdout();
        stdout.write_all(json.as_bytes())?;
        stdout.write_all(b"\n")?;
        Ok(())
    }
}

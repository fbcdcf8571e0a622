//! JSON output for the CLI
//!
//! Every command writes exactly one JSON object to stdout:
//! `{"status":"ok","data":...}` or `{"status":"error","code":...,"message":...}`.

use std::io::{self, Write};

use serde_json::{json, Value};

use super::errors::CliResult;

/// Write a success response to stdout
pub fn write_response(data: Value) -> CliResult<()> {
    let mut stdout = io::stdout();
    write_response_to(&mut stdout, data)
}

/// Write an error response to stdout
pub fn write_error(code: &str, message: &str) -> CliResult<()> {
    let mut stdout = io::stdout();
    write_error_to(&mut stdout, code, message)
}

pub fn write_response_to<W: Write>(out: &mut W, data: Value) -> CliResult<()> {
    write_line(out, &json!({"status": "ok", "data": data}))
}

pub fn write_error_to<W: Write>(out: &mut W, code: &str, message: &str) -> CliResult<()> {
    write_line(
        out,
        &json!({"status": "error", "code": code, "message": message}),
    )
}

fn write_line<W: Write>(out: &mut W, value: &Value) -> CliResult<()> {
    serde_json::to_writer(&mut *out, value)?;
    writeln!(out)?;
    out.flush()?;
    Ok(())
}

use std::io::{self, Write};

/// Writes the two startup lines identifying the running binary.
pub fn write_startup_diagnostics(out: &mut impl Write) -> io::Result<()> {
    let executable = match std::env::current_exe() {
        Ok(path) => path.display().to_string(),
        Err(err) => format!("<unknown: {err}>"),
    };
    writeln!(out, "PROXY EXECUTABLE: {executable}")?;
    writeln!(
        out,
        "PROXY VERSION: {} {}",
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION")
    )?;
    out.flush()
}

pub fn emit_startup_diagnostics() {
    let stderr = io::stderr();
    let _ = write_startup_diagnostics(&mut stderr.lock());
}

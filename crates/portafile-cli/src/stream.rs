//! `cat` and `write`: byte copies between a handle and stdio.

use std::io::{self, Write};

use anyhow::{Context, Result};
use portafile::FileHandle;
use portafile_config::log_cli_info;

pub fn cat(handle: &FileHandle) -> Result<()> {
    let mut source = handle
        .open_input_stream()
        .with_context(|| format!("Cannot open {handle} for reading"))?;

    let mut out = io::stdout().lock();
    io::copy(&mut source, &mut out).context("Failed to copy to stdout")?;
    out.flush()?;
    Ok(())
}

pub fn write(handle: &FileHandle, append: bool) -> Result<()> {
    let mut sink = handle
        .open_output_stream(append)
        .with_context(|| format!("Cannot open {handle} for writing"))?;

    let copied = io::copy(&mut io::stdin().lock(), &mut sink)
        .with_context(|| format!("Failed to copy stdin into {handle}"))?;
    sink.close()
        .with_context(|| format!("Failed to flush {handle}"))?;

    log_cli_info!(
        "Wrote stdin",
        file = tracing::field::display(handle),
        bytes = copied,
        append = append
    );
    Ok(())
}

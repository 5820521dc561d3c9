//! Plotting through an external gnuplot process.

use std::io::Write;
use std::path::Path;
use std::process::{Command, Stdio};

use anyhow::{Context, Result, bail};

use gpac_core::TimeSeries;

/// Pipe a time series into gnuplot and render it as a PDF.
pub fn render_pdf(series: &TimeSeries, title: &str, pdf: &Path) -> Result<()> {
    let mut child = Command::new("gnuplot")
        .stdin(Stdio::piped())
        .spawn()
        .context("failed to launch gnuplot; is it installed?")?;

    {
        let mut stdin = child.stdin.take().context("failed to open gnuplot stdin")?;
        writeln!(stdin, "set terminal pdf")?;
        writeln!(stdin, "set output '{}'", pdf.display())?;
        if let (Some(&a), Some(&b)) = (series.times.first(), series.times.last()) {
            writeln!(stdin, "set xrange [{}:{}]", a, b)?;
        }
        writeln!(stdin, "set key left top")?;
        writeln!(stdin, "plot '-' with lines title '{}'", title)?;
        for (t, v) in series.times.iter().zip(&series.values) {
            writeln!(stdin, "{} {}", t, v)?;
        }
        writeln!(stdin, "e")?;
    }

    let status = child.wait().context("failed to wait for gnuplot")?;
    if !status.success() {
        bail!("gnuplot exited with {}", status);
    }
    Ok(())
}

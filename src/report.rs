use std::{
    fs::File,
    io::{BufRead, BufReader, LineWriter, Write},
    path::{Path, PathBuf},
};

use crate::{
    error::{Error, Result},
    layout::Roi,
};

/// Everything wrong with one frame as a single report detail, missing regions
/// first: `Missing parts: lon_dir_text; Invalid coordinate: ...`.
pub fn frame_detail(missing: &[Roi], details: &[String]) -> Option<String> {
    let mut parts = Vec::with_capacity(details.len() + 1);
    if !missing.is_empty() {
        let names = missing.iter().map(|roi| roi.name()).collect::<Vec<_>>();
        parts.push(format!("Missing parts: {}", names.join(", ")));
    }
    parts.extend(details.iter().cloned());
    (!parts.is_empty()).then(|| parts.join("; "))
}

/// Append-only list of frames that could not be georeferenced.
///
/// Created (and truncated) once at the start of a run; every failure adds
/// exactly one line, flushed as it is written.
pub struct NotProcessedReport {
    path: PathBuf,
    writer: LineWriter<File>,
    count: usize,
}

impl NotProcessedReport {
    pub fn create(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let file = File::create(&path).map_err(|err| Error::io(&path, err))?;
        Ok(Self {
            path,
            writer: LineWriter::new(file),
            count: 0,
        })
    }

    /// `<identifier> - Missing parts: lat_dd_text, ...`
    pub fn record_missing(&mut self, identifier: &str, missing: &[Roi]) -> Result<()> {
        match frame_detail(missing, &[]) {
            Some(detail) => self.record_failure(identifier, &detail),
            None => Ok(()),
        }
    }

    /// `<identifier> - <detail>` for failures that are not about unreadable regions.
    pub fn record_failure(&mut self, identifier: &str, detail: &str) -> Result<()> {
        self.write_line(&format!("{identifier} - {detail}"))
    }

    fn write_line(&mut self, line: &str) -> Result<()> {
        writeln!(self.writer, "{line}").map_err(|err| Error::io(&self.path, err))?;
        self.count += 1;
        Ok(())
    }

    /// Lines written during this run.
    pub fn count(&self) -> usize {
        self.count
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Number of lines in an existing report, zero when it doesn't exist.
pub fn count_entries(path: &Path) -> Result<usize> {
    match File::open(path) {
        Ok(file) => BufReader::new(file)
            .lines()
            .try_fold(0, |count, line| line.map(|_| count + 1))
            .map_err(|err| Error::io(path, err)),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(0),
        Err(err) => Err(Error::io(path, err)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lines_keep_call_order_and_start_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("not_processed.txt");
        std::fs::write(&path, "stale - Missing parts: lat_dd_text\n").unwrap();

        let mut report = NotProcessedReport::create(&path).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "");

        report
            .record_missing("a.png", &[Roi::LonDir])
            .unwrap();
        report
            .record_missing("b.png", &[Roi::LatDd, Roi::LonSs])
            .unwrap();

        assert_eq!(report.count(), 2);
        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            "a.png - Missing parts: lon_dir_text\nb.png - Missing parts: lat_dd_text, lon_ss_text\n"
        );
        assert_eq!(count_entries(&path).unwrap(), 2);
    }

    #[test]
    fn frame_problems_share_one_detail() {
        assert_eq!(frame_detail(&[], &[]), None);
        assert_eq!(
            frame_detail(
                &[Roi::LonDir],
                &["Invalid coordinate: bad hemisphere".to_string()]
            )
            .as_deref(),
            Some("Missing parts: lon_dir_text; Invalid coordinate: bad hemisphere")
        );
        assert_eq!(
            frame_detail(&[], &["Output error: disk full".to_string()]).as_deref(),
            Some("Output error: disk full")
        );
    }

    #[test]
    fn missing_report_counts_zero() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(count_entries(&dir.path().join("nope.txt")).unwrap(), 0);
    }
}

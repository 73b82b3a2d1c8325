use std::{
    fs::File,
    io::{BufRead, BufReader, BufWriter, Write},
    path::{Path, PathBuf},
};

use itertools::Itertools;
use serde::{Deserialize, Serialize};

/// One line of a trajectory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrajectoryRow {
    pub step: u64,
    pub time: f64,
    /// Names of the reactions fired since the previous row, joined by `;`.
    pub reactions: String,
    /// Counts of the non-constant places followed by the constant places.
    pub tokens: Vec<u64>,
}

impl TrajectoryRow {
    pub fn to_line(&self) -> String {
        let mut line = format!("{}\t{}\t{}", self.step, self.time, self.reactions);
        for count in &self.tokens {
            line.push('\t');
            line.push_str(&count.to_string());
        }
        line
    }
}

pub fn header_line<'a>(place_names: impl Iterator<Item = &'a str>) -> String {
    std::iter::once("Step")
        .chain(std::iter::once("Time[sec]"))
        .chain(std::iter::once("Reaction"))
        .chain(place_names)
        .join("\t")
}

/// Tab separated trajectory file of a single run.
///
/// Write errors are logged and disable the writer, the simulation itself
/// continues.
pub struct TrajectoryWriter {
    path: PathBuf,
    writer: Option<BufWriter<File>>,
}

impl TrajectoryWriter {
    pub fn create(path: impl Into<PathBuf>, header: &str) -> anyhow::Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }

        let mut writer = BufWriter::new(File::create(&path)?);
        writeln!(writer, "{}", header)?;

        Ok(TrajectoryWriter {
            path,
            writer: Some(writer),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_open(&self) -> bool {
        self.writer.is_some()
    }

    pub fn write_row(&mut self, row: &TrajectoryRow) {
        let Some(writer) = &mut self.writer else {
            return;
        };

        if let Err(e) = writeln!(writer, "{}", row.to_line()) {
            tracing::error!(path = %self.path.display(), error = %e, "Could not write output, disabling it");
            self.writer = None;
        }
    }

    pub fn flush(&mut self) {
        let Some(writer) = &mut self.writer else {
            return;
        };

        if let Err(e) = writer.flush() {
            tracing::error!(path = %self.path.display(), error = %e, "Could not flush output, disabling it");
            self.writer = None;
        }
    }
}

impl Drop for TrajectoryWriter {
    fn drop(&mut self) {
        self.flush();
    }
}

/// Concatenates the `(run, file)` pairs into `target`. The header of the
/// first file is kept, every run starts with a `\t ----- run N -----` line
/// carrying its run index.
pub fn merge_outputs(files: &[(usize, PathBuf)], target: &Path) -> anyhow::Result<()> {
    let mut out = BufWriter::new(File::create(target)?);

    for (position, (run, file)) in files.iter().enumerate() {
        let reader = BufReader::new(File::open(file)?);
        let mut lines = reader.lines();

        let header = lines.next().transpose()?;
        if position == 0
            && let Some(header) = header
        {
            writeln!(out, "{}", header)?;
        }

        writeln!(out, "\t ----- run {} -----", run)?;
        for line in lines {
            writeln!(out, "{}", line?)?;
        }
    }

    out.flush()?;
    Ok(())
}

#[test]
fn test_row_format() {
    let row = TrajectoryRow {
        step: 3,
        time: 0.5,
        reactions: "r1;r2".to_string(),
        tokens: vec![4, 0],
    };
    assert_eq!(row.to_line(), "3\t0.5\tr1;r2\t4\t0");
    assert_eq!(
        header_line(["A", "B"].into_iter()),
        "Step\tTime[sec]\tReaction\tA\tB"
    );
}

#[test]
fn test_merge_labels_follow_run_index() {
    let dir = std::env::temp_dir().join(format!("petrisim_merge_labels_{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    let first = dir.join("run.csv");
    let third = dir.join("run_2.csv");
    std::fs::write(&first, "Step\ta\n0\t1\n").unwrap();
    std::fs::write(&third, "Step\ta\n0\t5\n").unwrap();

    let target = dir.join("summary.csv");
    // run 1 wrote no file
    merge_outputs(&[(0, first), (2, third)], &target).unwrap();

    let merged = std::fs::read_to_string(&target).unwrap();
    assert_eq!(
        merged.lines().collect::<Vec<_>>(),
        vec!["Step\ta", "\t ----- run 0 -----", "0\t1", "\t ----- run 2 -----", "0\t5"]
    );
}

//! Output directory layout and clip naming.
//!
//! Clips are written as `<dd-mm-yy-HH-MM-SS>.<ext>` under a single output
//! directory, one file per recording session. Two sessions opened within the
//! same second get `-1`, `-2`, ... suffixes instead of overwriting each other.

use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use std::path::{Path, PathBuf};

/// strftime layout for clip identifiers.
pub const CLIP_TIME_FORMAT: &str = "%d-%m-%y-%H-%M-%S";

/// Create the output directory (and parents) if absent.
pub fn ensure_output_dir(dir: &Path) -> Result<()> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("create output directory {}", dir.display()))
}

/// Clip identifier for a wall-clock time.
pub fn clip_name(now: &DateTime<Local>) -> String {
    now.format(CLIP_TIME_FORMAT).to_string()
}

/// Resolves collision-free clip paths inside one output directory.
#[derive(Clone, Debug)]
pub struct ClipNamer {
    dir: PathBuf,
    extension: String,
}

impl ClipNamer {
    pub fn new(dir: impl Into<PathBuf>, extension: &str) -> Self {
        Self {
            dir: dir.into(),
            extension: extension.trim_start_matches('.').to_string(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn extension(&self) -> &str {
        &self.extension
    }

    /// First path for `now` that does not exist yet.
    pub fn next_path(&self, now: &DateTime<Local>) -> PathBuf {
        let stem = clip_name(now);
        let mut candidate = self.dir.join(format!("{}.{}", stem, self.extension));
        let mut suffix = 1u32;
        while candidate.exists() {
            candidate = self
                .dir
                .join(format!("{}-{}.{}", stem, suffix, self.extension));
            suffix += 1;
        }
        candidate
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn fixed_time() -> DateTime<Local> {
        Local
            .with_ymd_and_hms(2024, 3, 7, 9, 5, 2)
            .single()
            .expect("unambiguous local time")
    }

    #[test]
    fn clip_name_uses_day_month_year_layout() {
        assert_eq!(clip_name(&fixed_time()), "07-03-24-09-05-02");
    }

    #[test]
    fn namer_suffixes_same_second_collisions() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let namer = ClipNamer::new(dir.path(), ".y4m");
        let first = namer.next_path(&fixed_time());
        assert_eq!(first, dir.path().join("07-03-24-09-05-02.y4m"));

        std::fs::write(&first, b"")?;
        let second = namer.next_path(&fixed_time());
        assert_eq!(second, dir.path().join("07-03-24-09-05-02-1.y4m"));

        std::fs::write(&second, b"")?;
        let third = namer.next_path(&fixed_time());
        assert_eq!(third, dir.path().join("07-03-24-09-05-02-2.y4m"));
        Ok(())
    }

    #[test]
    fn ensure_output_dir_creates_nested_dirs() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let nested = dir.path().join("a").join("b");
        ensure_output_dir(&nested)?;
        ensure_output_dir(&nested)?;
        assert!(nested.is_dir());
        Ok(())
    }
}

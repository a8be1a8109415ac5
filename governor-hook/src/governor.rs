//! Per-core cpufreq governor control through sysfs
//!
//! Every core of the set is attempted; failures are collected and reported
//! together so one bad core never blocks the others.

use crate::affinity::CoreSet;
use crate::config::Governor;
use crate::error::{CoreWriteFailure, GovernorWriteError};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Kernel directory holding one `cpuN` entry per logical CPU
pub const SYSFS_CPU_ROOT: &str = "/sys/devices/system/cpu";

#[derive(Debug, Clone)]
pub struct GovernorWriter {
    root: PathBuf,
}

impl Default for GovernorWriter {
    fn default() -> Self {
        Self::with_root(SYSFS_CPU_ROOT)
    }
}

impl GovernorWriter {
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// `{root}/cpu{N}/cpufreq/scaling_governor`
    pub fn governor_path(&self, core: u32) -> PathBuf {
        self.root
            .join(format!("cpu{}", core))
            .join("cpufreq")
            .join("scaling_governor")
    }

    /// Governor currently reported by the kernel for `core`
    pub fn current_governor(&self, core: u32) -> std::io::Result<String> {
        std::fs::read_to_string(self.governor_path(core)).map(|s| s.trim().to_string())
    }

    /// Write `governor` to every core of `cores`.
    ///
    /// Returns the number of cores written. The control file must already
    /// exist, a missing file is a failure for that core.
    pub fn set_governor(
        &self,
        cores: &CoreSet,
        governor: &Governor,
    ) -> Result<usize, GovernorWriteError> {
        if cores.is_empty() {
            debug!("No cores to update, governor `{}` not written", governor);
            return Ok(0);
        }

        let mut failures = Vec::new();
        for &core in cores {
            let path = self.governor_path(core);
            let previous = self.current_governor(core).ok();

            match write_control_file(&path, governor.as_str()) {
                Ok(()) => debug!(
                    "cpu{}: {} -> {}",
                    core,
                    previous.as_deref().unwrap_or("?"),
                    governor
                ),
                Err(source) => {
                    warn!("cpu{}: failed to write {}: {}", core, path.display(), source);
                    failures.push(CoreWriteFailure { core, path, source });
                }
            }
        }

        if failures.is_empty() {
            info!("Governor `{}` set on {} cores", governor, cores.len());
            Ok(cores.len())
        } else {
            Err(GovernorWriteError {
                governor: governor.to_string(),
                attempted: cores.len(),
                failures,
            })
        }
    }
}

fn write_control_file(path: &Path, value: &str) -> std::io::Result<()> {
    let mut file = OpenOptions::new().write(true).truncate(true).open(path)?;
    file.write_all(value.as_bytes())?;
    file.flush()
}

#[cfg(test)]
mod tests {
    use super::*;
    use governor_devkit::FakeCpuTree;

    fn cores(list: &[u32]) -> CoreSet {
        list.iter().copied().collect()
    }

    #[test]
    fn test_governor_path_layout() {
        let writer = GovernorWriter::default();
        assert_eq!(
            writer.governor_path(3),
            PathBuf::from("/sys/devices/system/cpu/cpu3/cpufreq/scaling_governor")
        );
    }

    #[test]
    fn test_writes_only_requested_cores() {
        let tree = FakeCpuTree::with_cores(8, "schedutil").unwrap();
        let writer = GovernorWriter::with_root(tree.root());

        let written = writer
            .set_governor(&cores(&[0, 2, 5]), &Governor::new("performance"))
            .unwrap();

        assert_eq!(written, 3);
        for core in 0..8 {
            let expected = if [0, 2, 5].contains(&core) { "performance" } else { "schedutil" };
            assert_eq!(tree.governor(core).as_deref(), Some(expected));
        }
    }

    #[test]
    fn test_empty_set_is_noop() {
        let tree = FakeCpuTree::with_cores(2, "schedutil").unwrap();
        let writer = GovernorWriter::with_root(tree.root());

        assert_eq!(writer.set_governor(&CoreSet::new(), &Governor::new("bogus")).unwrap(), 0);
        assert_eq!(tree.governor(0).as_deref(), Some("schedutil"));
    }

    #[test]
    fn test_continues_past_failures() {
        let tree = FakeCpuTree::with_cores(8, "schedutil").unwrap();
        tree.break_core(0).unwrap();
        tree.break_core(5).unwrap();
        let writer = GovernorWriter::with_root(tree.root());

        let err = writer
            .set_governor(&cores(&[0, 2, 5, 7]), &Governor::new("performance"))
            .unwrap_err();

        assert_eq!(err.attempted, 4);
        assert_eq!(err.failed_cores(), vec![0, 5]);
        assert_eq!(tree.governor(2).as_deref(), Some("performance"));
        assert_eq!(tree.governor(7).as_deref(), Some("performance"));
    }

    #[test]
    fn test_never_creates_control_files() {
        let tree = FakeCpuTree::with_cores(1, "schedutil").unwrap();
        let writer = GovernorWriter::with_root(tree.root());

        let err = writer
            .set_governor(&cores(&[9]), &Governor::new("performance"))
            .unwrap_err();

        assert_eq!(err.failed_cores(), vec![9]);
        assert!(!writer.governor_path(9).exists());
    }
}

/*!
Arbre sysfs factice

Reproduit `/sys/devices/system/cpu` dans un dossier temporaire. Chaque cœur
possède un fichier `cpufreq/scaling_governor` initialisé avec un gouverneur.
*/

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

pub struct FakeCpuTree {
    dir: TempDir,
}

impl FakeCpuTree {
    /// Crée `count` cœurs (cpu0..cpuN-1) avec le gouverneur `initial`
    pub fn with_cores(count: u32, initial: &str) -> Result<Self> {
        let dir = tempfile::tempdir().context("failed to create temp sysfs root")?;
        let tree = Self { dir };

        for core in 0..count {
            let path = tree.governor_path(core);
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("failed to create {}", parent.display()))?;
            }
            std::fs::write(&path, format!("{}\n", initial))
                .with_context(|| format!("failed to seed {}", path.display()))?;
        }

        log::debug!("🧪 Fake cpu tree with {} cores at {}", count, tree.root().display());
        Ok(tree)
    }

    /// Racine à passer au hook à la place de /sys/devices/system/cpu
    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn governor_path(&self, core: u32) -> PathBuf {
        self.root()
            .join(format!("cpu{}", core))
            .join("cpufreq")
            .join("scaling_governor")
    }

    /// Gouverneur actuel d'un cœur, `None` si le fichier n'existe pas
    pub fn governor(&self, core: u32) -> Option<String> {
        std::fs::read_to_string(self.governor_path(core))
            .ok()
            .map(|s| s.trim().to_string())
    }

    /// Supprime le fichier de contrôle: toute écriture sur ce cœur échoue
    pub fn break_core(&self, core: u32) -> Result<()> {
        let path = self.governor_path(core);
        std::fs::remove_file(&path).with_context(|| format!("failed to remove {}", path.display()))
    }
}

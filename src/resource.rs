//! On-disk layout for saved dumps: one folder per savable dump type.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::Result;
use crate::protocol::dump::{DumpCatalog, DumpType};

/// Create `root` and a folder for every savable dump type in `catalog`.
/// Existing folders are left alone.
pub fn prepare_dirs(root: &Path, catalog: &DumpCatalog) -> Result<Vec<PathBuf>> {
    let mut created = Vec::new();
    for kind in catalog.iter().filter(|k| k.is_savable()) {
        let dir = root.join(kind.name);
        fs::create_dir_all(&dir)?;
        created.push(dir);
    }
    debug!(root = %root.display(), folders = created.len(), "dump folders ready");
    Ok(created)
}

/// Where a dump of `kind` named `filename` lives under `root`.
pub fn dump_path(root: &Path, kind: &DumpType, filename: &str) -> PathBuf {
    root.join(kind.name).join(filename)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::dump::CMD_SOUND;

    fn scratch(tag: &str) -> PathBuf {
        std::env::temp_dir().join(format!("mwsd-{tag}-{}", std::process::id()))
    }

    #[test]
    fn folders_for_savable_types_only() {
        let root = scratch("dirs");
        let catalog = DumpCatalog::microwave();
        let dirs = prepare_dirs(&root, &catalog).unwrap();
        assert_eq!(dirs.len(), 5);
        for name in ["sound", "multi", "wave", "wave control table", "global"] {
            assert!(root.join(name).is_dir(), "{name}");
        }
        for name in ["display", "remote", "mode"] {
            assert!(!root.join(name).exists(), "{name}");
        }
        // Idempotent.
        prepare_dirs(&root, &catalog).unwrap();
        fs::remove_dir_all(&root).unwrap();
    }

    #[test]
    fn path_uses_type_folder() {
        let catalog = DumpCatalog::microwave();
        let sound = catalog.lookup(CMD_SOUND).unwrap();
        let path = dump_path(Path::new("/tmp/mw"), sound, "A005-LEAD 1.syx");
        assert_eq!(path, Path::new("/tmp/mw/sound/A005-LEAD 1.syx"));
    }
}

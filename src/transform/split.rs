use crate::error::{PckError, Result};
use crate::fsutil::{parent_dir, same_path};
use crate::report::Report;
use crate::transform::backup::Backup;
use crate::transform::open_embedded;
use crate::transform::rip::rip;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::warn;

/// Turn a self-contained executable into an executable plus `.pck` pair.
///
/// With `new_exe`, `exe` is copied there first and left untouched; the pair
/// is named after `new_exe`. Without it, `exe` itself is stripped and the
/// package lands next to it. Outputs that already exist are replaced only
/// when the whole split succeeds; a failed split removes what it created
/// and puts the previous files back.
pub fn split(exe: &Path, new_exe: Option<&Path>, remove_backup: bool) -> Result<Report> {
    drop(open_embedded(exe)?);

    let target = match new_exe {
        Some(new_exe) if same_path(exe, new_exe) => {
            return Err(PckError::SamePathConflict(new_exe.display().to_string()));
        }
        Some(new_exe) => new_exe,
        None => exe,
    };
    let pck = target.with_extension("pck");
    if same_path(&pck, target) || same_path(&pck, exe) {
        return Err(PckError::SamePathConflict(pck.display().to_string()));
    }

    let mut report = Report::new();
    let mut outputs = Outputs::default();

    let result = (|| -> Result<()> {
        if let Some(new_exe) = new_exe {
            outputs.replace(new_exe)?;
            copy_exe(exe, new_exe)?;
            outputs.created(new_exe);
            report.step(format!("Copied {} to {}", exe.display(), new_exe.display()));
        }

        outputs.replace(&pck)?;
        report.extend(rip(target, Some(&pck), false)?);
        outputs.created(&pck);

        report.extend(rip(target, None, remove_backup)?);
        Ok(())
    })();

    match result {
        Ok(()) => {
            outputs.commit();
            report.step(format!(
                "Split {} into {} and {}",
                exe.display(),
                target.display(),
                pck.display()
            ));
            Ok(report)
        }
        Err(e) => {
            outputs.roll_back()?;
            Err(e)
        }
    }
}

/// Files a split writes, and the previous files it moved out of the way
#[derive(Default)]
struct Outputs {
    created: Vec<PathBuf>,
    replaced: Vec<Backup>,
}

impl Outputs {
    fn replace(&mut self, path: &Path) -> Result<()> {
        if path.exists() {
            self.replaced.push(Backup::set_aside(path)?);
        }
        Ok(())
    }

    fn created(&mut self, path: &Path) {
        self.created.push(path.to_path_buf());
    }

    fn commit(self) {
        for previous in self.replaced {
            let path = previous.path().to_path_buf();
            if let Err(e) = previous.discard() {
                warn!(path = %path.display(), error = %e, "could not remove replaced output");
            }
        }
    }

    /// Remove created files and restore replaced ones; the first failed
    /// restore is returned after every restore has been attempted
    fn roll_back(self) -> Result<()> {
        for path in &self.created {
            if let Err(e) = fs::remove_file(path) {
                warn!(path = %path.display(), error = %e, "could not remove partial output");
            }
        }

        let mut failed = None;
        for previous in self.replaced.into_iter().rev() {
            if let Err(e) = previous.restore() {
                failed.get_or_insert(e);
            }
        }
        failed.map_or(Ok(()), Err)
    }
}

fn copy_exe(exe: &Path, new_exe: &Path) -> Result<()> {
    fs::create_dir_all(parent_dir(new_exe))?;
    if let Err(e) = fs::copy(exe, new_exe) {
        let _ = fs::remove_file(new_exe);
        return Err(e.into());
    }
    Ok(())
}

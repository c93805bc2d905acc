//! Stimulus catalogue: image files under `<dir>/target` and
//! `<dir>/distractor`, classified by folder.

use crate::error::{ExperimentError, Result};
use std::path::{Path, PathBuf};
use tracing::info;
use visex_core::{ImageStimulus, StimulusKind};

const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "bmp", "gif"];

/// All stimulus assets for a session. Cache ids are assigned once at scan
/// time: targets first, then distractors, in sorted filename order.
#[derive(Debug, Clone)]
pub struct StimulusSet {
    targets: Vec<ImageStimulus>,
    distractors: Vec<ImageStimulus>,
}

impl StimulusSet {
    /// Scan the stimulus folder layout.
    ///
    /// # Errors
    ///
    /// Returns an error if either subfolder is missing or holds no images.
    pub fn scan(root: &Path) -> Result<Self> {
        Self::scan_named(root, "target", "distractor")
    }

    /// Scan with custom subfolder names.
    ///
    /// # Errors
    ///
    /// Same as [`StimulusSet::scan`].
    pub fn scan_named(root: &Path, target_dir: &str, distractor_dir: &str) -> Result<Self> {
        if !root.is_dir() {
            return Err(ExperimentError::StimulusDirectory {
                path: root.to_path_buf(),
                reason: "not a directory".to_string(),
            });
        }

        let mut next_id = 0;
        let targets = collect_images(
            &root.join(target_dir),
            StimulusKind::Target,
            &mut next_id,
        )?;
        let distractors = collect_images(
            &root.join(distractor_dir),
            StimulusKind::Distractor,
            &mut next_id,
        )?;

        info!(
            targets = targets.len(),
            distractors = distractors.len(),
            "stimulus catalogue loaded"
        );

        Ok(Self {
            targets,
            distractors,
        })
    }

    pub fn targets(&self) -> &[ImageStimulus] {
        &self.targets
    }

    pub fn distractors(&self) -> &[ImageStimulus] {
        &self.distractors
    }

    /// Every asset, targets first. Iteration order matches cache ids.
    pub fn all(&self) -> impl Iterator<Item = &ImageStimulus> {
        self.targets.iter().chain(self.distractors.iter())
    }
}

fn collect_images(
    dir: &Path,
    kind: StimulusKind,
    next_id: &mut usize,
) -> Result<Vec<ImageStimulus>> {
    if !dir.is_dir() {
        return Err(ExperimentError::StimulusDirectory {
            path: dir.to_path_buf(),
            reason: "missing stimulus subfolder".to_string(),
        });
    }

    let mut paths: Vec<PathBuf> = std::fs::read_dir(dir)
        .map_err(|source| ExperimentError::FileSystem {
            path: dir.to_path_buf(),
            operation: "read stimulus folder",
            source,
        })?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| is_image(p))
        .collect();
    paths.sort();

    if paths.is_empty() {
        return Err(ExperimentError::EmptyStimulusSet {
            path: dir.to_path_buf(),
        });
    }

    Ok(paths
        .into_iter()
        .map(|path| {
            let cache_id = *next_id;
            *next_id += 1;
            ImageStimulus {
                cache_id,
                kind,
                path,
            }
        })
        .collect())
}

fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| IMAGE_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use visex_core::Stimulus;

    fn make_layout(targets: &[&str], distractors: &[&str]) -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("target")).unwrap();
        std::fs::create_dir(dir.path().join("distractor")).unwrap();
        for name in targets {
            std::fs::write(dir.path().join("target").join(name), b"img").unwrap();
        }
        for name in distractors {
            std::fs::write(dir.path().join("distractor").join(name), b"img").unwrap();
        }
        dir
    }

    #[test]
    fn scan_classifies_by_folder() {
        let dir = make_layout(&["t.png"], &["a.png", "b.jpg"]);
        let set = StimulusSet::scan(dir.path()).unwrap();

        assert_eq!(set.targets().len(), 1);
        assert_eq!(set.distractors().len(), 2);
        assert!(set.targets()[0].is_target());
        assert!(!set.distractors()[0].is_target());
    }

    #[test]
    fn cache_ids_are_unique_and_contiguous() {
        let dir = make_layout(&["t1.png", "t2.png"], &["d.png"]);
        let set = StimulusSet::scan(dir.path()).unwrap();

        let ids: Vec<usize> = set.all().map(|s| s.cache_id()).collect();
        assert_eq!(ids, vec![0, 1, 2]);
    }

    #[test]
    fn non_image_files_are_ignored() {
        let dir = make_layout(&["t.png", "notes.txt"], &["d.png"]);
        let set = StimulusSet::scan(dir.path()).unwrap();
        assert_eq!(set.targets().len(), 1);
    }

    #[test]
    fn missing_subfolder_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("target")).unwrap();
        std::fs::write(dir.path().join("target").join("t.png"), b"img").unwrap();

        let err = StimulusSet::scan(dir.path()).unwrap_err();
        assert!(err.to_string().contains("distractor"));
    }

    #[test]
    fn empty_target_folder_is_an_error() {
        let dir = make_layout(&[], &["d.png"]);
        // make_layout wrote nothing into target/
        let err = StimulusSet::scan(dir.path()).unwrap_err();
        assert!(matches!(err, ExperimentError::EmptyStimulusSet { .. }));
    }
}

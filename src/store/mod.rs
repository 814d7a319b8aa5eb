use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

use crate::config::OutputConfig;
use crate::extract::FrameSet;

/// Where every artifact of an item run lives.
///
/// Scratch files (downloaded media, extracted audio, raw frames) sit in a
/// temporary directory. Outputs land under the output root:
///
/// ```text
/// <root>/blogs/<unique_id>_blog.<ext>
/// <root>/blogs/<unique_id>_transcript.txt
/// <root>/images/<unique_id>_frames/thumbnail_<n>.jpg
/// ```
pub struct ArtifactStore {
    output_root: PathBuf,
    blog_extension: String,
    scratch: TempDir,
}

impl ArtifactStore {
    pub fn new(config: &OutputConfig) -> Result<Self> {
        let scratch = match &config.temp_dir {
            Some(dir) => {
                fs_err::create_dir_all(dir)?;
                TempDir::new_in(dir)
            }
            None => TempDir::new(),
        }
        .context("Failed to create temporary directory")?;

        Ok(Self {
            output_root: config.root.clone(),
            blog_extension: config.blog_extension.clone(),
            scratch,
        })
    }

    pub fn output_root(&self) -> &Path {
        &self.output_root
    }

    /// Directory that receives downloads for one run
    pub fn scratch_dir(&self) -> &Path {
        self.scratch.path()
    }

    pub fn audio_path(&self, unique_id: &str) -> PathBuf {
        self.scratch.path().join(format!("{}_audio.mp3", unique_id))
    }

    pub fn scratch_frames_dir(&self, unique_id: &str) -> PathBuf {
        self.scratch.path().join(format!("{}_frames", unique_id))
    }

    pub fn blog_path(&self, unique_id: &str) -> PathBuf {
        self.output_root
            .join("blogs")
            .join(format!("{}_blog.{}", unique_id, self.blog_extension))
    }

    pub fn transcript_path(&self, unique_id: &str) -> PathBuf {
        self.output_root
            .join("blogs")
            .join(format!("{}_transcript.txt", unique_id))
    }

    pub fn frames_dir(&self, unique_id: &str) -> PathBuf {
        self.output_root
            .join("images")
            .join(format!("{}_frames", unique_id))
    }

    /// Write a text artifact, creating its parent directory
    pub fn save_text(&self, path: &Path, content: &str) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs_err::create_dir_all(parent)?;
        }
        fs_err::write(path, content)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        tracing::info!("Content saved to {}", path.display());
        Ok(())
    }

    /// Move scratch frames into the item's output folder as
    /// `thumbnail_1.jpg`, `thumbnail_2.jpg`, ... keeping their order.
    pub fn persist_frames(&self, frames: &FrameSet, unique_id: &str) -> Result<FrameSet> {
        let target_dir = self.frames_dir(unique_id);
        fs_err::create_dir_all(&target_dir)?;

        let mut moved = Vec::with_capacity(frames.len());
        for (n, frame) in frames.paths().iter().enumerate() {
            let target = target_dir.join(format!("thumbnail_{}.jpg", n + 1));
            move_file(frame, &target)?;
            moved.push(target);
        }

        tracing::info!(count = moved.len(), "Frames moved to {}", target_dir.display());
        Ok(FrameSet::new(moved))
    }
}

/// `rename` when source and target share a filesystem, copy + delete otherwise
fn move_file(from: &Path, to: &Path) -> Result<()> {
    if fs_err::rename(from, to).is_ok() {
        return Ok(());
    }
    fs_err::copy(from, to)
        .with_context(|| format!("Failed to move {} to {}", from.display(), to.display()))?;
    fs_err::remove_file(from)?;
    Ok(())
}

/// Deletes the scratch files of one item run when dropped.
#[derive(Debug, Default)]
pub struct ScratchGuard {
    paths: Vec<PathBuf>,
}

impl ScratchGuard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn track(&mut self, path: impl Into<PathBuf>) {
        self.paths.push(path.into());
    }

    pub fn tracked(&self) -> &[PathBuf] {
        &self.paths
    }
}

impl Drop for ScratchGuard {
    fn drop(&mut self) {
        // Reverse order so files go before the directories holding them
        for path in self.paths.iter().rev() {
            let result = if path.is_dir() {
                std::fs::remove_dir_all(path)
            } else if path.exists() {
                std::fs::remove_file(path)
            } else {
                continue;
            };

            match result {
                Ok(()) => tracing::debug!("Removed {}", path.display()),
                Err(e) => tracing::warn!("Failed to remove {}: {}", path.display(), e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_in(root: &Path) -> ArtifactStore {
        ArtifactStore::new(&OutputConfig {
            root: root.join("output"),
            blog_extension: "txt".to_string(),
            frame_count: 3,
            thumbnail_width: 16,
            thumbnail_height: 9,
            temp_dir: Some(root.join("tmp")),
        })
        .unwrap()
    }

    #[test]
    fn output_layout_follows_unique_id() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(dir.path());
        let id = "My_Video_abc123_20240101_120000";

        assert_eq!(
            store.blog_path(id),
            dir.path().join("output/blogs/My_Video_abc123_20240101_120000_blog.txt")
        );
        assert_eq!(
            store.frames_dir(id),
            dir.path().join("output/images/My_Video_abc123_20240101_120000_frames")
        );
        assert!(store.audio_path(id).starts_with(store.scratch_dir()));
    }

    #[test]
    fn persist_frames_renumbers_from_one() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(dir.path());
        let scratch = store.scratch_frames_dir("item");
        fs_err::create_dir_all(&scratch).unwrap();

        let mut paths = Vec::new();
        for name in ["frame_a.jpg", "frame_b.jpg"] {
            let path = scratch.join(name);
            fs_err::write(&path, name).unwrap();
            paths.push(path);
        }

        let moved = store.persist_frames(&FrameSet::new(paths.clone()), "item").unwrap();

        assert_eq!(moved.len(), 2);
        assert!(moved.paths()[0].ends_with("item_frames/thumbnail_1.jpg"));
        assert_eq!(fs_err::read_to_string(&moved.paths()[1]).unwrap(), "frame_b.jpg");
        assert!(paths.iter().all(|p| !p.exists()));
    }

    #[test]
    fn scratch_guard_removes_files_and_dirs_on_drop() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("audio.mp3");
        let frames = dir.path().join("frames");
        fs_err::write(&file, b"x").unwrap();
        fs_err::create_dir_all(&frames).unwrap();
        fs_err::write(frames.join("frame_1.jpg"), b"y").unwrap();

        {
            let mut guard = ScratchGuard::new();
            guard.track(&file);
            guard.track(&frames);
            guard.track(dir.path().join("never-created.mp4"));
            assert_eq!(guard.tracked().len(), 3);
        }

        assert!(!file.exists());
        assert!(!frames.exists());
    }

    #[test]
    fn save_text_creates_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(dir.path());
        let path = store.blog_path("id");

        store.save_text(&path, "hello").unwrap();

        assert_eq!(fs_err::read_to_string(path).unwrap(), "hello");
    }
}

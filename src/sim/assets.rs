/// Asset store: object sprites and Simon animation frames.
///
/// Layout under the asset directory:
///   objects/row1.txt … row7.txt          one ASCII sprite per table row
///   animation/DISSOLVE0001_NNNNN.txt     one text frame per decay step
///
/// Sprites are loaded once at startup; a missing or empty sprite is replaced
/// by a placeholder shape. Frames are read lazily the first time they are
/// asked for, and a missing frame is remembered so the disk is not hit again.

use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::domain::floaters::{Model, ModelShape, MODEL_ROWS};

#[derive(Debug, Error)]
pub enum AssetError {
    #[error("{0} not found")]
    NotFound(PathBuf),
    #[error("{0} is empty")]
    Empty(PathBuf),
    #[error("could not read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

pub fn model_path(dir: &Path, row: usize) -> PathBuf {
    dir.join("objects").join(format!("row{}.txt", row + 1))
}

pub fn frame_path(dir: &Path, index: u32) -> PathBuf {
    dir.join("animation").join(format!("DISSOLVE0001_{index:05}.txt"))
}

/// Read a text sprite: trailing whitespace and blank edge lines dropped.
pub fn read_sprite(path: &Path) -> Result<Vec<String>, AssetError> {
    let text = std::fs::read_to_string(path).map_err(|e| match e.kind() {
        io::ErrorKind::NotFound => AssetError::NotFound(path.to_path_buf()),
        _ => AssetError::Io { path: path.to_path_buf(), source: e },
    })?;
    let mut lines: Vec<String> = text.lines().map(|l| l.trim_end().to_string()).collect();
    while lines.last().is_some_and(|l| l.is_empty()) {
        lines.pop();
    }
    let first = lines.iter().position(|l| !l.is_empty());
    match first {
        Some(start) => Ok(lines.split_off(start)),
        None => Err(AssetError::Empty(path.to_path_buf())),
    }
}

#[derive(Debug)]
pub struct AssetStore {
    dir: PathBuf,
    pub models: Vec<Model>,
    frames: HashMap<u32, Option<Vec<String>>>,
}

impl AssetStore {
    pub fn load(dir: &Path) -> AssetStore {
        if !dir.is_dir() {
            log::warn!("asset directory {} missing; using placeholders", dir.display());
        }
        let models = (0..MODEL_ROWS).map(|row| load_model(dir, row)).collect();
        AssetStore { dir: dir.to_path_buf(), models, frames: HashMap::new() }
    }

    /// Placeholder models only, nothing read from disk.
    pub fn placeholders() -> AssetStore {
        AssetStore {
            dir: PathBuf::new(),
            models: (0..MODEL_ROWS).map(Model::placeholder).collect(),
            frames: HashMap::new(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn sprite_count(&self) -> usize {
        self.models.iter().filter(|m| m.shape == ModelShape::Sprite).count()
    }

    /// Animation frame by index, loading it on first use.
    pub fn frame(&mut self, index: u32) -> Option<&[String]> {
        if self.dir.as_os_str().is_empty() {
            return None;
        }
        let dir = &self.dir;
        self.frames
            .entry(index)
            .or_insert_with(|| match read_sprite(&frame_path(dir, index)) {
                Ok(lines) => Some(lines),
                Err(e) => {
                    log::debug!("frame {index} skipped: {e}");
                    None
                }
            })
            .as_deref()
    }
}

fn load_model(dir: &Path, row: usize) -> Model {
    let path = model_path(dir, row);
    match read_sprite(&path) {
        Ok(lines) => {
            log::info!("loaded sprite {}", path.display());
            Model { row, shape: ModelShape::Sprite, lines }
        }
        Err(e) => {
            let model = Model::placeholder(row);
            log::warn!("{e}; row {} uses placeholder {:?}", row + 1, model.shape);
            model
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::floaters::Placeholder;

    fn scratch(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("decay-assets-{}-{name}", std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(dir.join("objects")).unwrap();
        std::fs::create_dir_all(dir.join("animation")).unwrap();
        dir
    }

    #[test]
    fn paths() {
        let d = Path::new("/a");
        assert_eq!(model_path(d, 0), PathBuf::from("/a/objects/row1.txt"));
        assert_eq!(frame_path(d, 10042), PathBuf::from("/a/animation/DISSOLVE0001_10042.txt"));
    }

    #[test]
    fn missing_and_empty_sprites_fall_back() {
        let dir = scratch("fallback");
        std::fs::write(model_path(&dir, 0), "\n  /\\\n /  \\\n\n").unwrap();
        std::fs::write(model_path(&dir, 1), "   \n\n").unwrap();

        let store = AssetStore::load(&dir);
        assert_eq!(store.models.len(), MODEL_ROWS);
        assert_eq!(store.models[0].shape, ModelShape::Sprite);
        assert_eq!(store.models[0].lines, vec!["  /\\".to_string(), " /  \\".to_string()]);
        assert_eq!(store.models[1].shape, ModelShape::Placeholder(Placeholder::Cone));
        assert_eq!(store.models[3].shape, ModelShape::Placeholder(Placeholder::Cube));
        assert_eq!(store.sprite_count(), 1);
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn frames_load_lazily_and_missing_are_skipped() {
        let dir = scratch("frames");
        std::fs::write(frame_path(&dir, 10000), "###\n# #\n").unwrap();
        let mut store = AssetStore::load(&dir);

        assert_eq!(store.frame(10000).map(|f| f.len()), Some(2));
        assert!(store.frame(10001).is_none());
        // Written after the miss: still absent, the miss is cached
        std::fs::write(frame_path(&dir, 10001), "x\n").unwrap();
        assert!(store.frame(10001).is_none());
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn placeholder_store_has_no_frames() {
        let mut store = AssetStore::placeholders();
        assert_eq!(store.sprite_count(), 0);
        assert!(store.frame(10000).is_none());
    }
}

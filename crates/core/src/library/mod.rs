use std::{
    fs,
    path::{Path, PathBuf},
};

use tracing::{info, warn};

use crate::{compile, LibraryConfig, Result, Story, StoryError};

/// All stories found below a library root.
///
/// Layout: `<root>/<stories_dir>/<folder>/<story>.<markup_extension>` plus
/// the audio clips the story references, next to the markup file.
#[derive(Debug, Clone)]
pub struct StoryLibrary {
    stories_root: PathBuf,
    stories: Vec<Story>,
}

impl StoryLibrary {
    /// Loads every story. The first story that cannot be read or compiled
    /// aborts loading.
    pub fn load(root: &Path, config: &LibraryConfig) -> Result<Self> {
        Self::load_with(root, config, |folder, err| {
            Err(StoryError::msg(format!("story `{folder}`: {err}")))
        })
    }

    /// Loads every story that compiles and skips the others.
    pub fn load_lenient(root: &Path, config: &LibraryConfig) -> Result<Self> {
        Self::load_with(root, config, |folder, err| {
            warn!(folder, %err, "skipping story");
            Ok(())
        })
    }

    fn load_with<F>(root: &Path, config: &LibraryConfig, mut on_error: F) -> Result<Self>
    where
        F: FnMut(&str, StoryError) -> Result<()>,
    {
        let stories_root = root.join(&config.stories_dir);
        let mut stories = Vec::new();

        for folder in story_folders(&stories_root)? {
            match load_story(&stories_root, &folder, &config.markup_extension) {
                Ok(story) => stories.push(story),
                Err(err) => on_error(&folder, err)?,
            }
        }

        info!(root = %stories_root.display(), count = stories.len(), "loaded stories");
        Ok(Self {
            stories_root,
            stories,
        })
    }

    pub fn stories(&self) -> &[Story] {
        &self.stories
    }

    pub fn titles(&self) -> Vec<&str> {
        self.stories.iter().map(Story::title).collect()
    }

    /// Story with the given title.
    pub fn get(&self, title: &str) -> Result<&Story> {
        self.stories
            .iter()
            .find(|story| story.title() == title)
            .ok_or_else(|| StoryError::UnknownStory(title.to_string()))
    }

    /// Path of a clip referenced by `story`.
    pub fn clip_path(&self, story: &Story, clip: &str) -> PathBuf {
        self.stories_root.join(story.folder()).join(clip)
    }
}

/// Non-empty sub-folders of `stories_root`, in name order.
fn story_folders(stories_root: &Path) -> Result<Vec<String>> {
    let mut folders = Vec::new();
    for entry in fs::read_dir(stories_root)? {
        let entry = entry?;
        if !entry.file_type()?.is_dir() {
            continue;
        }
        if fs::read_dir(entry.path())?.next().is_none() {
            continue;
        }
        folders.push(entry.file_name().to_string_lossy().into_owned());
    }
    folders.sort();
    Ok(folders)
}

fn load_story(stories_root: &Path, folder: &str, extension: &str) -> Result<Story> {
    let path = markup_file(&stories_root.join(folder), extension)?
        .ok_or_else(|| StoryError::MissingStoryFile(folder.to_string()))?;
    let source = fs::read_to_string(&path)?;
    compile(&source, folder)
}

/// First file (in name order) with the markup extension.
fn markup_file(folder: &Path, extension: &str) -> Result<Option<PathBuf>> {
    let mut candidates = Vec::new();
    for entry in fs::read_dir(folder)? {
        let path = entry?.path();
        if path.is_file() && path.extension().is_some_and(|ext| ext == extension) {
            candidates.push(path);
        }
    }
    candidates.sort();
    Ok(candidates.into_iter().next())
}

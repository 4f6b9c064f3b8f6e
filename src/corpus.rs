//! The set of images we benchmark against.

use tokio::fs;

use crate::{error::BenchError, prelude::*};

/// File extensions we treat as images. Compared case-insensitively.
const SUPPORTED_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg"];

/// A single image in the corpus.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ImageRef {
    /// Full path to the image.
    path: PathBuf,

    /// The file name, used in reports.
    name: String,
}

impl ImageRef {
    /// Create a new image reference. The display name is the path's basename.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Self { path, name }
    }

    /// The path to the image.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The display name of the image.
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// An ordered collection of images, sorted by name.
#[derive(Clone, Debug, Default)]
pub struct ImageCorpus {
    images: Vec<ImageRef>,
}

impl ImageCorpus {
    /// Build a corpus from a list of images, sorting them by name.
    pub fn from_images(mut images: Vec<ImageRef>) -> Self {
        images.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.path.cmp(&b.path)));
        Self { images }
    }

    /// Load every supported image in `dir`.
    ///
    /// Subdirectories are not searched. An empty directory gives an empty
    /// corpus.
    #[instrument(level = "debug", skip_all, fields(dir = %dir.display()))]
    pub async fn load(dir: &Path) -> Result<Self, BenchError> {
        let not_found = |source| BenchError::CorpusNotFound {
            path: dir.to_owned(),
            source,
        };

        let mut entries = fs::read_dir(dir).await.map_err(not_found)?;
        let mut images = vec![];
        while let Some(entry) = entries.next_entry().await.map_err(not_found)? {
            let path = entry.path();
            if !has_supported_extension(&path) {
                trace!(path = %path.display(), "Skipping non-image file");
                continue;
            }
            // Follow symlinks, but don't treat directories named `x.png` as images.
            match fs::metadata(&path).await {
                Ok(metadata) if metadata.is_file() => images.push(ImageRef::new(path)),
                Ok(_) => {}
                Err(err) => warn!(path = %path.display(), "Cannot stat image: {err}"),
            }
        }

        let corpus = Self::from_images(images);
        debug!(count = corpus.len(), "Loaded image corpus");
        Ok(corpus)
    }

    /// The images, in benchmark order.
    pub fn images(&self) -> &[ImageRef] {
        &self.images
    }

    /// How many images do we have?
    pub fn len(&self) -> usize {
        self.images.len()
    }

    /// Is the corpus empty?
    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }
}

/// Does this path end in one of [`SUPPORTED_EXTENSIONS`]?
fn has_supported_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| {
            SUPPORTED_EXTENSIONS
                .iter()
                .any(|supported| ext.eq_ignore_ascii_case(supported))
        })
}

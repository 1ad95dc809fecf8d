//! Copying external images into managed storage and removing them again.
//!
//! The host supplies two capabilities: a [`FileSource`] that can read bytes
//! from whatever reference the image picker hands out, and a [`ManagedDir`]
//! where the application keeps its own copies. [`AssetManager`] sits on top
//! of both and never lets a segment point at a file that failed to import.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use uuid::Uuid;

use crate::{ContentSegment, NotesError, Result};

/// Reads the bytes behind an external image reference.
pub trait FileSource: Send + Sync {
    fn read(&self, reference: &str) -> io::Result<Vec<u8>>;
}

/// The application-controlled area that holds imported images.
///
/// References handed out by [`write`](Self::write) must be recognisable by
/// [`contains`](Self::contains).
pub trait ManagedDir: Send + Sync {
    /// True if `reference` points into this directory.
    fn contains(&self, reference: &str) -> bool;

    /// Stores `bytes` under `name` and returns the reference to the new file.
    fn write(&self, name: &str, bytes: &[u8]) -> io::Result<String>;

    /// Deletes the file behind `reference`.
    fn remove(&self, reference: &str) -> io::Result<()>;

    fn exists(&self, reference: &str) -> bool;
}

/// Reads plain filesystem paths and `file://` URIs.
#[derive(Debug, Default, Clone)]
pub struct LocalFileSource;

impl FileSource for LocalFileSource {
    fn read(&self, reference: &str) -> io::Result<Vec<u8>> {
        let path = reference.strip_prefix("file://").unwrap_or(reference);
        fs::read(path)
    }
}

/// A managed directory on the local filesystem.
#[derive(Debug, Clone)]
pub struct LocalManagedDir {
    root: PathBuf,
}

impl LocalManagedDir {
    /// Uses `root` as the image directory, creating it if needed.
    pub fn new<P: AsRef<Path>>(root: P) -> io::Result<Self> {
        fs::create_dir_all(root.as_ref())?;
        Ok(Self { root: root.as_ref().to_path_buf() })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl ManagedDir for LocalManagedDir {
    fn contains(&self, reference: &str) -> bool {
        Path::new(reference).parent() == Some(self.root.as_path())
    }

    fn write(&self, name: &str, bytes: &[u8]) -> io::Result<String> {
        let path = self.root.join(name);
        fs::write(&path, bytes)?;
        Ok(path.to_string_lossy().into_owned())
    }

    fn remove(&self, reference: &str) -> io::Result<()> {
        fs::remove_file(reference)
    }

    fn exists(&self, reference: &str) -> bool {
        Path::new(reference).is_file()
    }
}

/// Keeps image references and managed files in step.
pub struct AssetManager {
    source: Box<dyn FileSource>,
    dir: Box<dyn ManagedDir>,
}

impl AssetManager {
    pub fn new(source: impl FileSource + 'static, dir: impl ManagedDir + 'static) -> Self {
        Self { source: Box::new(source), dir: Box::new(dir) }
    }

    /// An asset manager over local files, keeping images in `images_dir`.
    pub fn local<P: AsRef<Path>>(images_dir: P) -> Result<Self> {
        Ok(Self::new(LocalFileSource, LocalManagedDir::new(images_dir)?))
    }

    pub fn is_managed(&self, reference: &str) -> bool {
        self.dir.contains(reference)
    }

    /// Returns a managed reference for `reference`, copying the image into
    /// managed storage first if it is not there already.
    ///
    /// Calling this on a managed reference returns it unchanged and touches
    /// no files, provided the file is still there.
    ///
    /// # Errors
    ///
    /// Returns [`NotesError::ImageImport`] if the source cannot be read or a
    /// managed reference names a file that has been removed, and
    /// [`NotesError::Io`] if the copy cannot be written.
    pub fn import_if_external(&self, reference: &str) -> Result<String> {
        if self.is_managed(reference) {
            if !self.dir.exists(reference) {
                return Err(NotesError::ImageImport {
                    reference: reference.to_string(),
                    source: io::Error::from(io::ErrorKind::NotFound),
                });
            }
            return Ok(reference.to_string());
        }
        let bytes = self.source.read(reference).map_err(|source| NotesError::ImageImport {
            reference: reference.to_string(),
            source,
        })?;
        let name = generated_name(reference);
        let managed = self.dir.write(&name, &bytes)?;
        log::debug!("imported image {reference} as {managed}");
        Ok(managed)
    }

    /// Imports every image segment of `content`, returning the rewritten
    /// content and the references that were newly created.
    ///
    /// If any import fails, the files created so far are removed again and
    /// the error is returned.
    pub fn import_content(
        &self,
        content: Vec<ContentSegment>,
    ) -> Result<(Vec<ContentSegment>, Vec<String>)> {
        let mut imported = Vec::new();
        let mut out = Vec::with_capacity(content.len());
        for segment in content {
            match segment {
                ContentSegment::Image { reference } => {
                    let managed = match self.import_if_external(&reference) {
                        Ok(managed) => managed,
                        Err(e) => {
                            self.discard(&imported);
                            return Err(e);
                        }
                    };
                    if managed != reference {
                        imported.push(managed.clone());
                    }
                    out.push(ContentSegment::Image { reference: managed });
                }
                text @ ContentSegment::Text { .. } => out.push(text),
            }
        }
        Ok((out, imported))
    }

    /// Deletes the managed file behind `reference`.
    ///
    /// A file that is already gone is not an error, and unmanaged references
    /// are left alone.
    pub fn remove(&self, reference: &str) -> Result<()> {
        if !self.is_managed(reference) {
            log::debug!("not removing unmanaged image {reference}");
            return Ok(());
        }
        match self.dir.remove(reference) {
            Ok(()) => {
                log::debug!("removed image {reference}");
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    pub fn exists(&self, reference: &str) -> bool {
        self.dir.exists(reference)
    }

    /// Best-effort removal used for cleanup once the database is authoritative.
    pub(crate) fn discard(&self, references: &[String]) {
        for reference in references {
            if let Err(e) = self.remove(reference) {
                log::warn!("failed to remove image {reference}: {e}");
            }
        }
    }
}

/// `img_<uuid>.<ext>`, keeping a short alphanumeric extension from the source.
fn generated_name(reference: &str) -> String {
    let ext = Path::new(reference)
        .extension()
        .and_then(|e| e.to_str())
        .filter(|e| !e.is_empty() && e.len() <= 5 && e.chars().all(|c| c.is_ascii_alphanumeric()))
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_else(|| "jpg".to_string());
    format!("img_{}.{}", Uuid::new_v4().simple(), ext)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn setup() -> (AssetManager, TempDir, TempDir) {
        let images = TempDir::new().unwrap();
        let outside = TempDir::new().unwrap();
        let assets = AssetManager::local(images.path()).unwrap();
        (assets, images, outside)
    }

    fn external_image(dir: &TempDir, name: &str, bytes: &[u8]) -> String {
        let path = dir.path().join(name);
        fs::write(&path, bytes).unwrap();
        path.to_string_lossy().into_owned()
    }

    fn managed_file_count(dir: &TempDir) -> usize {
        fs::read_dir(dir.path()).unwrap().count()
    }

    #[test]
    fn test_import_copies_external_image() {
        let (assets, images, outside) = setup();
        let source = external_image(&outside, "photo.PNG", b"png-bytes");

        let managed = assets.import_if_external(&source).unwrap();

        assert_ne!(managed, source);
        assert!(assets.is_managed(&managed));
        assert!(!assets.is_managed(&source));
        assert!(managed.ends_with(".png"));
        assert_eq!(fs::read(&managed).unwrap(), b"png-bytes");
        assert_eq!(managed_file_count(&images), 1);
    }

    #[test]
    fn test_import_accepts_file_uri() {
        let (assets, _images, outside) = setup();
        let source = external_image(&outside, "a.jpg", b"x");
        let managed = assets.import_if_external(&format!("file://{source}")).unwrap();
        assert_eq!(fs::read(managed).unwrap(), b"x");
    }

    #[test]
    fn test_import_is_idempotent_for_managed_reference() {
        let (assets, images, outside) = setup();
        let source = external_image(&outside, "a.jpg", b"x");
        let managed = assets.import_if_external(&source).unwrap();

        let again = assets.import_if_external(&managed).unwrap();
        let third = assets.import_if_external(&again).unwrap();

        assert_eq!(again, managed);
        assert_eq!(third, managed);
        assert_eq!(managed_file_count(&images), 1);
    }

    #[test]
    fn test_import_rejects_removed_managed_file() {
        let (assets, images, outside) = setup();
        let managed = assets
            .import_if_external(&external_image(&outside, "a.jpg", b"a"))
            .unwrap();
        let fresh = external_image(&outside, "b.jpg", b"b");
        assets.remove(&managed).unwrap();

        let result = assets.import_content(vec![
            ContentSegment::image(fresh),
            ContentSegment::image(managed.clone()),
        ]);

        match result {
            Err(NotesError::ImageImport { reference, source }) => {
                assert_eq!(reference, managed);
                assert_eq!(source.kind(), io::ErrorKind::NotFound);
            }
            other => panic!("expected ImageImport, got {other:?}"),
        }
        assert_eq!(managed_file_count(&images), 0, "the copy made before the failure is discarded");
    }

    #[test]
    fn test_import_unreadable_source_fails() {
        let (assets, images, outside) = setup();
        let missing = outside.path().join("missing.jpg");
        let result = assets.import_if_external(&missing.to_string_lossy());

        assert!(matches!(result, Err(NotesError::ImageImport { .. })));
        assert_eq!(managed_file_count(&images), 0);
    }

    #[test]
    fn test_import_content_rolls_back_on_failure() {
        let (assets, images, outside) = setup();
        let good = external_image(&outside, "good.jpg", b"ok");
        let bad = outside.path().join("nope.jpg").to_string_lossy().into_owned();

        let result = assets.import_content(vec![
            ContentSegment::image(good),
            ContentSegment::text("between"),
            ContentSegment::image(bad),
        ]);

        assert!(result.is_err());
        assert_eq!(managed_file_count(&images), 0, "partial imports must be discarded");
    }

    #[test]
    fn test_import_content_reports_only_new_files() {
        let (assets, _images, outside) = setup();
        let first = assets
            .import_if_external(&external_image(&outside, "a.jpg", b"a"))
            .unwrap();
        let fresh = external_image(&outside, "b.gif", b"b");

        let (content, imported) = assets
            .import_content(vec![
                ContentSegment::text("t"),
                ContentSegment::image(first.clone()),
                ContentSegment::image(fresh),
            ])
            .unwrap();

        assert_eq!(imported.len(), 1);
        assert_eq!(content[0], ContentSegment::text("t"));
        assert_eq!(content[1], ContentSegment::image(first));
        assert_eq!(content[2], ContentSegment::image(imported[0].clone()));
    }

    #[test]
    fn test_remove_is_noop_when_absent() {
        let (assets, _images, outside) = setup();
        let managed = assets
            .import_if_external(&external_image(&outside, "a.jpg", b"a"))
            .unwrap();

        assets.remove(&managed).unwrap();
        assert!(!assets.exists(&managed));
        assets.remove(&managed).unwrap();
    }

    #[test]
    fn test_remove_leaves_unmanaged_files_alone() {
        let (assets, _images, outside) = setup();
        let source = external_image(&outside, "keep.jpg", b"k");
        assets.remove(&source).unwrap();
        assert!(Path::new(&source).exists());
    }

    #[test]
    fn test_generated_name_extension() {
        assert!(generated_name("/a/b/c.webp").ends_with(".webp"));
        assert!(generated_name("content://media/42").ends_with(".jpg"));
        assert!(generated_name("/a/b/c.not-an-ext").ends_with(".jpg"));
        assert_ne!(generated_name("/x.jpg"), generated_name("/x.jpg"));
    }
}

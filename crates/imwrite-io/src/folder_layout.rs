//! Output file naming.

use crate::error::Result;
use std::path::{Component, Path, PathBuf};

/// Builds organized output filenames inside `output_dir`.
///
/// Filenames follow
/// `output_dir/[rel/][subject/]subject[_postfix][_idx][_key-value...][extension]`
/// where `rel` is the subject's directory relative to `data_root_dir`.
///
/// ```
/// use imwrite_io::FolderLayout;
///
/// let layout = FolderLayout::new("/test_run_1")
///     .with_postfix("seg")
///     .with_extension(".nii");
/// let name = layout.filename("Sub-A", Some("00"), &[("modality", "T1")]).unwrap();
/// assert_eq!(name.to_str(), Some("/test_run_1/Sub-A_seg_00_modality-T1.nii"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FolderLayout {
    pub output_dir: PathBuf,
    pub postfix: String,
    pub extension: String,
    /// Put each output in a folder named after its subject.
    pub parent: bool,
    /// Create missing output directories.
    pub makedirs: bool,
    /// Root of the input tree whose structure is mirrored in `output_dir`.
    pub data_root_dir: Option<PathBuf>,
}

impl FolderLayout {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            postfix: String::new(),
            extension: String::new(),
            parent: false,
            makedirs: false,
            data_root_dir: None,
        }
    }

    pub fn with_postfix(mut self, postfix: impl Into<String>) -> Self {
        self.postfix = postfix.into();
        self
    }

    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = extension.into();
        self
    }

    pub fn with_parent(mut self, parent: bool) -> Self {
        self.parent = parent;
        self
    }

    pub fn with_makedirs(mut self, makedirs: bool) -> Self {
        self.makedirs = makedirs;
        self
    }

    pub fn with_data_root_dir(mut self, data_root_dir: impl Into<PathBuf>) -> Self {
        self.data_root_dir = Some(data_root_dir.into());
        self
    }

    /// Filename for `subject`.
    ///
    /// When `subject` is a path its file stem is used as the name (a `.gz`
    /// suffix and the extension before it are both removed) and its directory
    /// is mirrored relative to `data_root_dir`.
    pub fn filename<P: AsRef<Path>>(
        &self,
        subject: P,
        idx: Option<&str>,
        extra: &[(&str, &str)],
    ) -> Result<PathBuf> {
        let base = create_file_basename(
            &self.postfix,
            subject.as_ref(),
            &self.output_dir,
            self.data_root_dir.as_deref(),
            self.parent,
            idx,
            self.makedirs,
        )?;
        let mut name = base.into_os_string();
        for (key, value) in extra {
            name.push(format!("_{key}-{value}"));
        }
        name.push(&self.extension);
        Ok(PathBuf::from(name))
    }
}

/// Output path without extension for `input_file_name`.
pub fn create_file_basename(
    postfix: &str,
    input_file_name: &Path,
    folder_path: &Path,
    data_root_dir: Option<&Path>,
    separate_folder: bool,
    patch_index: Option<&str>,
    makedirs: bool,
) -> Result<PathBuf> {
    let stem = strip_extension(input_file_name);
    let file_dir = input_file_name
        .parent()
        .filter(|dir| !dir.as_os_str().is_empty());

    let mut output = folder_path.to_path_buf();
    if let (Some(root), Some(dir)) = (data_root_dir, file_dir) {
        if !root.as_os_str().is_empty() {
            output.push(relative_path(dir, root)?);
        }
    }
    if separate_folder {
        output.push(&stem);
    }
    if makedirs {
        std::fs::create_dir_all(&output)?;
    }

    let mut name = stem;
    if !postfix.is_empty() {
        name.push('_');
        name.push_str(postfix);
    }
    if let Some(idx) = patch_index {
        name.push('_');
        name.push_str(idx);
    }
    output.push(name);
    Ok(normalize(&output))
}

fn strip_extension(path: &Path) -> String {
    let stem = |p: &Path| {
        p.file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default()
    };
    let name = stem(path);
    if path.extension().is_some_and(|ext| ext == "gz") {
        stem(Path::new(&name))
    } else {
        name
    }
}

/// Remove `.` components and fold `..` into the preceding component.
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                let folded = matches!(out.components().next_back(), Some(Component::Normal(_)));
                if folded {
                    out.pop();
                } else if !out.has_root() {
                    out.push("..");
                }
            }
            other => out.push(other),
        }
    }
    out
}

/// `path` relative to `base`, computed lexically.
fn relative_path(path: &Path, base: &Path) -> Result<PathBuf> {
    let absolute = |p: &Path| -> Result<PathBuf> {
        if p.is_absolute() {
            Ok(normalize(p))
        } else {
            Ok(normalize(&std::env::current_dir()?.join(p)))
        }
    };
    let path = absolute(path)?;
    let base = absolute(base)?;

    let path_parts: Vec<Component> = path.components().collect();
    let base_parts: Vec<Component> = base.components().collect();
    let common = path_parts
        .iter()
        .zip(&base_parts)
        .take_while(|(a, b)| a == b)
        .count();

    let mut rel = PathBuf::new();
    for _ in common..base_parts.len() {
        rel.push("..");
    }
    for part in &path_parts[common..] {
        rel.push(part);
    }
    Ok(rel)
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use proptest::prelude::*;
    use tempfile::tempdir;

    #[test]
    fn test_subject_postfix_index_and_extras() -> Result<()> {
        let layout = FolderLayout::new("/test_run_1/")
            .with_postfix("seg")
            .with_extension(".nii");
        let name = layout.filename("Sub-A", Some("00"), &[("modality", "T1")])?;
        assert_eq!(name, PathBuf::from("/test_run_1/Sub-A_seg_00_modality-T1.nii"));
        Ok(())
    }

    #[test]
    fn test_defaults() -> Result<()> {
        let name = FolderLayout::new("out").filename("subject", None, &[])?;
        assert_eq!(name, PathBuf::from("out/subject"));
        Ok(())
    }

    #[test]
    fn test_extension_is_replaced() -> Result<()> {
        let layout = FolderLayout::new("out").with_extension(".png");
        let name = layout.filename("/data/case.nii.gz", None, &[])?;
        assert_eq!(name, PathBuf::from("out/case.png"));
        let name = layout.filename("/data/case.v1.nii", None, &[])?;
        assert_eq!(name, PathBuf::from("out/case.v1.png"));
        Ok(())
    }

    #[test]
    fn test_parent_folder() -> Result<()> {
        let layout = FolderLayout::new("out").with_parent(true).with_postfix("trans");
        let name = layout.filename("/data/img.nii", Some("3"), &[])?;
        assert_eq!(name, PathBuf::from("out/img/img_trans_3"));
        Ok(())
    }

    #[test]
    fn test_data_root_dir_is_mirrored() -> Result<()> {
        let layout = FolderLayout::new("/out")
            .with_data_root_dir("/data")
            .with_extension(".nii.gz");
        let name = layout.filename("/data/site1/patient7/img.nii.gz", None, &[])?;
        assert_eq!(name, PathBuf::from("/out/site1/patient7/img.nii.gz"));

        // Subjects outside the root climb out of it.
        let name = layout.filename("/other/img.nii", None, &[])?;
        assert_eq!(name, PathBuf::from("/other/img.nii.gz"));
        Ok(())
    }

    #[test]
    fn test_makedirs() -> Result<()> {
        let dir = tempdir()?;
        let layout = FolderLayout::new(dir.path().join("nested"))
            .with_parent(true)
            .with_makedirs(true);
        let name = layout.filename("case", None, &[])?;
        assert!(dir.path().join("nested").join("case").is_dir());
        assert_eq!(name, dir.path().join("nested").join("case").join("case"));
        Ok(())
    }

    #[test]
    fn test_relative_path() -> Result<()> {
        assert_eq!(
            relative_path(Path::new("/a/b/c"), Path::new("/a"))?,
            PathBuf::from("b/c")
        );
        assert_eq!(
            relative_path(Path::new("/a/x"), Path::new("/a/b"))?,
            PathBuf::from("../x")
        );
        assert_eq!(relative_path(Path::new("/a"), Path::new("/a"))?, PathBuf::new());
        Ok(())
    }

    proptest! {
        #[test]
        fn test_filename_shape(
            subject in "[A-Za-z][A-Za-z0-9-]{0,8}",
            postfix in "[a-z]{0,4}",
            idx in proptest::option::of("[0-9]{1,3}"),
        ) {
            let layout = FolderLayout::new("/out")
                .with_postfix(postfix.clone())
                .with_extension(".nii.gz");
            let name = layout.filename(&subject, idx.as_deref(), &[]).unwrap();
            prop_assert_eq!(name.parent(), Some(Path::new("/out")));

            let file = name.file_name().unwrap().to_string_lossy().into_owned();
            prop_assert!(file.starts_with(&subject));
            prop_assert!(file.ends_with(".nii.gz"));
            if !postfix.is_empty() {
                let expected = format!("{subject}_{postfix}");
                prop_assert!(file.contains(&expected));
            }
        }
    }
}

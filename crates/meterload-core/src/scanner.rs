//! Input discovery: expands files and directories into the list of sources to import

use crate::error::Result;
use crate::parser::SourceFormat;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Expand input paths into source files.
///
/// Files are kept as given, in argument order, whatever their extension
/// (the loader reports unsupported ones). A directory expands recursively to
/// the supported spreadsheet files below it, sorted by path, at the position
/// the directory held in the argument list.
pub fn collect_inputs<P: AsRef<Path>>(paths: &[P]) -> Result<Vec<PathBuf>> {
    let mut inputs = Vec::new();

    for path in paths {
        let path = path.as_ref();
        if !path.is_dir() {
            inputs.push(path.to_path_buf());
            continue;
        }

        let found = scan_directory(path)?;
        if found.is_empty() {
            tracing::warn!(dir = %path.display(), "no spreadsheet files found");
        } else {
            tracing::debug!(dir = %path.display(), files = found.len(), "scanned directory");
        }
        inputs.extend(found);
    }

    Ok(inputs)
}

/// Supported files under `root`, sorted by path
pub fn scan_directory(root: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in WalkDir::new(root).follow_links(true) {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        // Skip lock/temp files spreadsheet tools leave next to open workbooks
        let hidden = path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.starts_with('.') || n.starts_with("~$"));
        if !hidden && SourceFormat::detect(path).is_some() {
            files.push(path.to_path_buf());
        }
    }

    files.sort();
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn touch(path: &Path) {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, "x").unwrap();
    }

    #[test]
    fn test_scan_directory_sorted_and_filtered() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        touch(&root.join("b.csv"));
        touch(&root.join("a.XLSX"));
        touch(&root.join("sub").join("c.ods"));
        touch(&root.join("notes.docx"));
        touch(&root.join("~$a.xlsx"));
        touch(&root.join(".hidden.csv"));

        let files = scan_directory(root).unwrap();
        assert_eq!(
            files,
            vec![root.join("a.XLSX"), root.join("b.csv"), root.join("sub").join("c.ods")]
        );
    }

    #[test]
    fn test_collect_inputs_keeps_file_order() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        let z = root.join("z.csv");
        let a = root.join("a.csv");
        touch(&z);
        touch(&a);
        let folder = root.join("more");
        touch(&folder.join("m2.csv"));
        touch(&folder.join("m1.csv"));

        let inputs = collect_inputs(&[z.clone(), folder.clone(), a.clone()]).unwrap();
        assert_eq!(
            inputs,
            vec![z, folder.join("m1.csv"), folder.join("m2.csv"), a]
        );
    }

    #[test]
    fn test_collect_inputs_passes_missing_files_through() {
        let inputs = collect_inputs(&["does/not/exist.csv"]).unwrap();
        assert_eq!(inputs, vec![PathBuf::from("does/not/exist.csv")]);
    }

    #[test]
    fn test_empty_directory() {
        let dir = tempfile::tempdir().unwrap();
        assert!(collect_inputs(&[dir.path()]).unwrap().is_empty());
    }
}

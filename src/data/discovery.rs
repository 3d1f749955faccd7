use std::cmp::Ordering;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{GanError, Result};

/// Compares two strings treating runs of ASCII digits as numbers, so that
/// `img2.png` sorts before `img10.png`.
pub fn natural_cmp(a: &str, b: &str) -> Ordering {
    let mut left = Chunks::new(a);
    let mut right = Chunks::new(b);

    loop {
        match (left.next(), right.next()) {
            (None, None) => return Ordering::Equal,
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(l), Some(r)) => {
                let ord = compare_chunks(l, r);
                if ord != Ordering::Equal {
                    return ord;
                }
            }
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Chunk<'a> {
    Digits(&'a str),
    Text(&'a str),
}

struct Chunks<'a> {
    rest: &'a str,
}

impl<'a> Chunks<'a> {
    fn new(s: &'a str) -> Self {
        Self { rest: s }
    }
}

impl<'a> Iterator for Chunks<'a> {
    type Item = Chunk<'a>;

    fn next(&mut self) -> Option<Chunk<'a>> {
        let first = self.rest.chars().next()?;
        let digits = first.is_ascii_digit();
        let end = self
            .rest
            .char_indices()
            .find(|(_, c)| c.is_ascii_digit() != digits)
            .map(|(i, _)| i)
            .unwrap_or(self.rest.len());
        let (head, tail) = self.rest.split_at(end);
        self.rest = tail;
        Some(if digits {
            Chunk::Digits(head)
        } else {
            Chunk::Text(head)
        })
    }
}

fn compare_chunks(left: Chunk<'_>, right: Chunk<'_>) -> Ordering {
    match (left, right) {
        (Chunk::Digits(l), Chunk::Digits(r)) => {
            let lt = l.trim_start_matches('0');
            let rt = r.trim_start_matches('0');
            // equal values: fewer leading zeros first
            lt.len()
                .cmp(&rt.len())
                .then_with(|| lt.cmp(rt))
                .then_with(|| l.len().cmp(&r.len()))
        }
        (Chunk::Text(l), Chunk::Text(r)) => l.cmp(r),
        (Chunk::Digits(_), Chunk::Text(_)) => Ordering::Less,
        (Chunk::Text(_), Chunk::Digits(_)) => Ordering::Greater,
    }
}

/// Sorts paths by their natural order
pub fn natural_sort(paths: &mut [PathBuf]) {
    paths.sort_by(|a, b| natural_cmp(&a.to_string_lossy(), &b.to_string_lossy()));
}

/// Lists the files under `root` whose extension is one of `extensions`.
///
/// If `root` has subdirectories every subdirectory is a class partition and
/// files are collected one level down; otherwise files come straight from
/// `root`. Returns `NoDataFound` when nothing matches.
pub fn discover_files(root: &Path, extensions: &[&str]) -> Result<Vec<PathBuf>> {
    let entries = match list_dir(root) {
        Ok(entries) => entries,
        Err(GanError::Io { source, .. }) if source.kind() == ErrorKind::NotFound => {
            return Err(GanError::NoDataFound {
                path: root.to_path_buf(),
            })
        }
        Err(err) => return Err(err),
    };

    let partitions: Vec<&PathBuf> = entries.iter().filter(|p| p.is_dir()).collect();

    let mut files = if partitions.is_empty() {
        matching(&entries, extensions)
    } else {
        debug!(
            root = %root.display(),
            partitions = partitions.len(),
            "treating subdirectories as class partitions"
        );
        let mut files = Vec::new();
        for dir in partitions {
            files.extend(matching(&list_dir(dir)?, extensions));
        }
        files
    };

    if files.is_empty() {
        return Err(GanError::NoDataFound {
            path: root.to_path_buf(),
        });
    }

    natural_sort(&mut files);
    Ok(files)
}

fn list_dir(dir: &Path) -> Result<Vec<PathBuf>> {
    let read = fs::read_dir(dir).map_err(|e| GanError::io(dir, e))?;
    let mut entries = Vec::new();
    for entry in read {
        let entry = entry.map_err(|e| GanError::io(dir, e))?;
        entries.push(entry.path());
    }
    Ok(entries)
}

fn matching(entries: &[PathBuf], extensions: &[&str]) -> Vec<PathBuf> {
    entries
        .iter()
        .filter(|p| p.is_file() && has_extension(p, extensions))
        .cloned()
        .collect()
}

fn has_extension(path: &Path, extensions: &[&str]) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| extensions.iter().any(|e| ext.eq_ignore_ascii_case(e)))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn touch(dir: &Path, name: &str) {
        fs::write(dir.join(name), b"").unwrap();
    }

    #[test]
    fn test_natural_cmp_orders_numbers_by_value() {
        let mut names = vec!["img10.png", "img2.png", "img1.png", "img02.png"];
        names.sort_by(|a, b| natural_cmp(a, b));
        assert_eq!(names, vec!["img1.png", "img2.png", "img02.png", "img10.png"]);
    }

    #[test]
    fn test_natural_cmp_text_and_prefixes() {
        assert_eq!(natural_cmp("a", "b"), Ordering::Less);
        assert_eq!(natural_cmp("a", "a1"), Ordering::Less);
        assert_eq!(natural_cmp("9", "a"), Ordering::Less);
        assert_eq!(natural_cmp("x100y", "x100y"), Ordering::Equal);
        assert_eq!(natural_cmp("x100y2", "x100y10"), Ordering::Less);
    }

    #[test]
    fn test_discover_flat_directory() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "3.png");
        touch(dir.path(), "20.png");
        touch(dir.path(), "1.PNG");
        touch(dir.path(), "notes.txt");

        let files = discover_files(dir.path(), &["png"]).unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["1.PNG", "3.png", "20.png"]);
    }

    #[test]
    fn test_discover_class_partitions() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("cats")).unwrap();
        fs::create_dir(dir.path().join("dogs")).unwrap();
        touch(&dir.path().join("cats"), "b.jpg");
        touch(&dir.path().join("dogs"), "a.jpg");
        touch(dir.path(), "top.jpg");

        let files = discover_files(dir.path(), &["jpg"]).unwrap();
        assert_eq!(files.len(), 2);
        assert!(files[0].ends_with("cats/b.jpg"));
        assert!(files[1].ends_with("dogs/a.jpg"));
    }

    #[test]
    fn test_discover_empty_directory_names_root() {
        let dir = tempfile::tempdir().unwrap();
        let err = discover_files(dir.path(), &["png"]).unwrap_err();
        assert!(matches!(err, GanError::NoDataFound { .. }));
        assert!(err.to_string().contains(&dir.path().display().to_string()));
    }

    #[test]
    fn test_discover_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope");
        let err = discover_files(&missing, &["png"]).unwrap_err();
        assert!(matches!(err, GanError::NoDataFound { .. }));
    }
}

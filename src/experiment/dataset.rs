//! Dataset loading from a JSONL manifest.
//!
//! One entry per line; image paths are relative to the manifest:
//!
//! ```text
//! {"image_id": "071214904", "image": "images/071214904.jpg",
//!  "questions": ["Who wrote this book?", "Is this a comic book?"],
//!  "answers": ["Alan Moore", "Yes"]}
//! ```
//!
//! Loading is all-or-nothing: any bad line aborts with a [`DatasetError`].

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

use super::collaborators::{DatasetEntry, ImageData};

/// Fatal dataset problems.
#[derive(Debug, Error)]
pub enum DatasetError {
    #[error("cannot read manifest {path}: {source}")]
    Manifest {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("manifest line {line}: {source}")]
    Malformed {
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("cannot read image {path} for entry {image_id}: {source}")]
    Image {
        image_id: String,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("entry {image_id} has {questions} questions but {answers} answers")]
    Misaligned {
        image_id: String,
        questions: usize,
        answers: usize,
    },
}

#[derive(Debug, Deserialize)]
struct ManifestLine {
    image_id: String,
    image: PathBuf,
    questions: Vec<String>,
    answers: Vec<String>,
}

/// Load up to `limit` entries from a JSONL manifest, in file order.
///
/// Blank lines are skipped. Image bytes are read eagerly.
pub fn load_manifest(path: &Path, limit: Option<usize>) -> Result<Vec<DatasetEntry>, DatasetError> {
    let file = File::open(path).map_err(|source| DatasetError::Manifest {
        path: path.to_path_buf(),
        source,
    })?;
    let base = path.parent().unwrap_or_else(|| Path::new("."));
    let limit = limit.unwrap_or(usize::MAX);

    let mut entries = Vec::new();
    for (idx, line) in BufReader::new(file).lines().enumerate() {
        if entries.len() >= limit {
            break;
        }
        let line = line.map_err(|source| DatasetError::Manifest {
            path: path.to_path_buf(),
            source,
        })?;
        if line.trim().is_empty() {
            continue;
        }

        let raw: ManifestLine = serde_json::from_str(&line).map_err(|source| DatasetError::Malformed {
            line: idx + 1,
            source,
        })?;

        if raw.questions.len() != raw.answers.len() {
            return Err(DatasetError::Misaligned {
                image_id: raw.image_id,
                questions: raw.questions.len(),
                answers: raw.answers.len(),
            });
        }

        let image_path = base.join(&raw.image);
        let bytes = std::fs::read(&image_path).map_err(|source| DatasetError::Image {
            image_id: raw.image_id.clone(),
            path: image_path.clone(),
            source,
        })?;

        entries.push(DatasetEntry {
            image_id: raw.image_id,
            image: ImageData::new(bytes, mime_for(&image_path)),
            questions: raw.questions,
            answers: raw.answers,
        });
    }

    tracing::info!("Loaded {} images from {}", entries.len(), path.display());
    Ok(entries)
}

fn mime_for(path: &Path) -> &'static str {
    match path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .as_deref()
    {
        Some("png") => "image/png",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        _ => "image/jpeg",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_manifest(dir: &Path, lines: &[&str]) -> PathBuf {
        let path = dir.join("manifest.jsonl");
        let mut file = File::create(&path).unwrap();
        for line in lines {
            writeln!(file, "{}", line).unwrap();
        }
        path
    }

    #[test]
    fn test_load_with_limit() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.jpg"), b"jpeg-a").unwrap();
        std::fs::write(dir.path().join("b.png"), b"png-b").unwrap();

        let manifest = write_manifest(
            dir.path(),
            &[
                r#"{"image_id": "a", "image": "a.jpg", "questions": ["q1", "q2"], "answers": ["x", "y"]}"#,
                "",
                r#"{"image_id": "b", "image": "b.png", "questions": ["q3"], "answers": ["z"]}"#,
            ],
        );

        let all = load_manifest(&manifest, None).unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].image.bytes, b"jpeg-a");
        assert_eq!(all[0].image.mime, "image/jpeg");
        assert_eq!(all[1].image.mime, "image/png");
        assert_eq!(all[1].questions, vec!["q3"]);

        let first = load_manifest(&manifest, Some(1)).unwrap();
        assert_eq!(first.len(), 1);
        assert_eq!(first[0].image_id, "a");
    }

    #[test]
    fn test_missing_manifest_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_manifest(&dir.path().join("nope.jsonl"), None).unwrap_err();
        assert!(matches!(err, DatasetError::Manifest { .. }));
    }

    #[test]
    fn test_missing_image_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let manifest = write_manifest(
            dir.path(),
            &[r#"{"image_id": "a", "image": "gone.jpg", "questions": [], "answers": []}"#],
        );
        let err = load_manifest(&manifest, None).unwrap_err();
        assert!(matches!(err, DatasetError::Image { .. }));
    }

    #[test]
    fn test_malformed_and_misaligned_lines() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.jpg"), b"x").unwrap();

        let manifest = write_manifest(dir.path(), &["{not json"]);
        let err = load_manifest(&manifest, None).unwrap_err();
        assert!(matches!(err, DatasetError::Malformed { line: 1, .. }));

        let manifest = write_manifest(
            dir.path(),
            &[r#"{"image_id": "a", "image": "a.jpg", "questions": ["q1", "q2"], "answers": ["x"]}"#],
        );
        let err = load_manifest(&manifest, None).unwrap_err();
        assert!(matches!(err, DatasetError::Misaligned { questions: 2, answers: 1, .. }));
    }
}

//! Output Materializer (C8) — §4.3.
//!
//! Turns a completed backend job into a content row: copies (Primary) or
//! references in place (Mock) the first descriptor as the primary file,
//! the rest as alternate-resolution paths, then inserts into `items` and
//! links tags.

use std::path::{Path, PathBuf};

use chrono::{Datelike, Utc};
use uuid::Uuid;

use genonaut_backend::{resolve_output_path, GenerationBackend, OutputDescriptor};
use genonaut_core::error::GenonautError;
use genonaut_core::ports::{ContentStore, Result};
use genonaut_core::types::{BackendKind, NewContentRow, Source};

/// Inserts the materialized row and returns the new content id.
pub async fn materialize(
    backend_kind: BackendKind,
    backend: &dyn GenerationBackend,
    content_store: &dyn ContentStore,
    job_id: i64,
    user_id: Uuid,
    prompt: &str,
    tags: Vec<String>,
    descriptors: Vec<OutputDescriptor>,
) -> Result<i64> {
    let Some(primary_descriptor) = descriptors.first() else {
        return Err(GenonautError::OutputMissing(format!(
            "job {job_id} completed with no output descriptors"
        )));
    };

    let primary_path = place_file(backend_kind, backend, user_id, primary_descriptor).await?;

    let mut alt_paths = std::collections::BTreeMap::new();
    for (i, descriptor) in descriptors.iter().enumerate().skip(1) {
        let path = place_file(backend_kind, backend, user_id, descriptor).await?;
        alt_paths.insert(format!("alt_{i}"), path_to_string(&path));
    }

    let row = NewContentRow {
        source: Source::Items,
        title: format!("job-{job_id}"),
        content_type: infer_content_type(&primary_path),
        path: path_to_string(&primary_path),
        alt_paths,
        prompt: prompt.to_string(),
        creator_id: user_id,
        is_private: false,
        item_metadata: serde_json::json!({ "job_id": job_id, "backend": backend_kind.as_str() }),
        tags,
    };

    content_store.insert_item(row).await
}

/// Resolves a descriptor's path, failing with `output_missing` (§4.3) when
/// the result isn't actually readable, then either copies it into the
/// user-and-date-partitioned tree (Primary) or leaves it in place (Mock).
async fn place_file(
    backend_kind: BackendKind,
    backend: &dyn GenerationBackend,
    user_id: Uuid,
    descriptor: &OutputDescriptor,
) -> Result<PathBuf> {
    let source_path = resolve_output_path(backend.output_dir(), descriptor);

    if tokio::fs::metadata(&source_path).await.is_err() {
        return Err(GenonautError::OutputMissing(format!(
            "{} is not a readable file",
            source_path.display()
        )));
    }

    match backend_kind {
        BackendKind::Mock => Ok(source_path),
        BackendKind::Primary => copy_into_partitioned_tree(&source_path, user_id).await,
    }
}

async fn copy_into_partitioned_tree(source_path: &Path, user_id: Uuid) -> Result<PathBuf> {
    let now = Utc::now();
    let dest_dir = PathBuf::from("generations")
        .join(user_id.to_string())
        .join(format!("{:04}", now.year()))
        .join(format!("{:02}", now.month()))
        .join(format!("{:02}", now.day()));

    tokio::fs::create_dir_all(&dest_dir)
        .await
        .map_err(|e| GenonautError::Internal(anyhow::anyhow!(e)))?;

    let file_name = source_path
        .file_name()
        .ok_or_else(|| GenonautError::OutputMissing("output path has no file name".into()))?;
    let dest_path = dest_dir.join(file_name);

    tokio::fs::copy(source_path, &dest_path)
        .await
        .map_err(|e| GenonautError::Internal(anyhow::anyhow!(e)))?;

    Ok(dest_path)
}

fn path_to_string(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

fn infer_content_type(path: &Path) -> String {
    match path.extension().and_then(|e| e.to_str()) {
        Some("png") => "image/png".to_string(),
        Some("jpg") | Some("jpeg") => "image/jpeg".to_string(),
        Some("webp") => "image/webp".to_string(),
        _ => "application/octet-stream".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use genonaut_backend::MockBackend;
    use genonaut_core::cursor::Cursor;
    use genonaut_core::planner::TagFilter;
    use genonaut_core::ports::Page;

    #[test]
    fn infer_content_type_recognizes_common_image_extensions() {
        assert_eq!(infer_content_type(Path::new("a.png")), "image/png");
        assert_eq!(infer_content_type(Path::new("a.jpg")), "image/jpeg");
        assert_eq!(
            infer_content_type(Path::new("a.bin")),
            "application/octet-stream"
        );
    }

    #[derive(Default)]
    struct FakeContentStore {
        inserted: Mutex<Vec<NewContentRow>>,
    }

    #[async_trait]
    impl ContentStore for FakeContentStore {
        async fn insert_item(&self, row: NewContentRow) -> Result<i64> {
            let mut inserted = self.inserted.lock().unwrap();
            inserted.push(row);
            Ok(inserted.len() as i64)
        }

        async fn get(&self, _id: i64, _source: Source) -> Result<genonaut_core::types::ContentRow> {
            unimplemented!("not exercised by the materializer test")
        }

        async fn query(
            &self,
            _filter: &TagFilter,
            _creator_id: Option<Uuid>,
            _cursor: Option<&Cursor>,
            _limit: u32,
        ) -> Result<Page<genonaut_core::types::ContentRow>> {
            unimplemented!("not exercised by the materializer test")
        }
    }

    #[tokio::test]
    async fn mock_backend_materializes_in_place_without_copying() {
        let tmp = tempfile::tempdir().unwrap();
        let output_dir = tmp.path().join("output");
        let input_dir = tmp.path().join("input");
        tokio::fs::create_dir_all(&output_dir).await.unwrap();
        tokio::fs::create_dir_all(&input_dir).await.unwrap();
        let fixture_path = input_dir.join("fixture.jpg");
        tokio::fs::write(&fixture_path, b"fake jpeg bytes").await.unwrap();

        let backend = MockBackend::with_fixture(
            &output_dir,
            OutputDescriptor {
                filename: "../input/fixture.jpg".into(),
                subfolder: String::new(),
                kind: "output".into(),
            },
        );
        let store = FakeContentStore::default();
        let user_id = Uuid::new_v4();

        let content_id = materialize(
            BackendKind::Mock,
            &backend,
            &store,
            42,
            user_id,
            "a cat wearing a hat",
            vec!["backend:mock".into()],
            vec![OutputDescriptor {
                filename: "../input/fixture.jpg".into(),
                subfolder: String::new(),
                kind: "output".into(),
            }],
        )
        .await
        .unwrap();

        assert_eq!(content_id, 1);
        let inserted = store.inserted.lock().unwrap();
        assert_eq!(inserted[0].path, fixture_path.to_string_lossy());
        assert_eq!(inserted[0].content_type, "image/jpeg");
        assert_eq!(inserted[0].creator_id, user_id);
    }

    #[tokio::test]
    async fn missing_output_file_fails_with_output_missing() {
        let tmp = tempfile::tempdir().unwrap();
        let output_dir = tmp.path().join("output");
        tokio::fs::create_dir_all(&output_dir).await.unwrap();

        let backend = MockBackend::new(&output_dir);
        let store = FakeContentStore::default();

        let err = materialize(
            BackendKind::Mock,
            &backend,
            &store,
            1,
            Uuid::new_v4(),
            "prompt",
            vec![],
            vec![OutputDescriptor {
                filename: "does_not_exist.jpg".into(),
                subfolder: String::new(),
                kind: "output".into(),
            }],
        )
        .await
        .unwrap_err();

        assert!(matches!(err, GenonautError::OutputMissing(_)));
    }
}

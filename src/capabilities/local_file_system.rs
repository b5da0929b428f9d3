//! Local filesystem storage provider.
//!
//! Project and annotation files live on the host side; the sandboxed UI
//! reads and writes them only through the `LocalFileSystem` proxy.
//! Containers are directories, assets are files; all paths arrive as
//! JSON strings from the UI.

use futures_util::future::BoxFuture;
use serde_json::Value;

use crate::router::error::HandlerError;
use crate::router::proxy::Capability;

/// Error kind for filesystem failures
pub const IO_ERROR_KIND: &str = "IoError";
/// Error kind for malformed arguments
pub const INVALID_ARGS_KIND: &str = "InvalidArgsError";

const METHODS: &[&str] = &[
    "readText",
    "writeText",
    "deleteFile",
    "listFiles",
    "listContainers",
    "createContainer",
    "deleteContainer",
    "exists",
];

/// Storage provider registered on the router as proxy
/// `"LocalFileSystem"`
#[derive(Debug, Default)]
pub struct LocalFileSystem;

impl LocalFileSystem {
    pub fn new() -> Self {
        Self
    }

    async fn read_text(path: &str) -> Result<Value, HandlerError> {
        let text = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| io_error(path, e))?;
        Ok(Value::String(text))
    }

    async fn write_text(path: &str, contents: &str) -> Result<Value, HandlerError> {
        tokio::fs::write(path, contents)
            .await
            .map_err(|e| io_error(path, e))?;
        Ok(Value::Null)
    }

    async fn delete_file(path: &str) -> Result<Value, HandlerError> {
        tokio::fs::remove_file(path)
            .await
            .map_err(|e| io_error(path, e))?;
        Ok(Value::Null)
    }

    async fn exists(path: &str) -> Result<Value, HandlerError> {
        Ok(Value::Bool(tokio::fs::try_exists(path).await.unwrap_or(false)))
    }

    /// Non-recursive listing; full paths, sorted
    async fn list_entries(folder: &str, want_dirs: bool) -> Result<Value, HandlerError> {
        let mut read_dir = tokio::fs::read_dir(folder)
            .await
            .map_err(|e| io_error(folder, e))?;
        let mut paths = Vec::new();
        while let Some(entry) = read_dir.next_entry().await.map_err(|e| io_error(folder, e))? {
            let file_type = entry.file_type().await.map_err(|e| io_error(folder, e))?;
            if file_type.is_dir() == want_dirs {
                paths.push(entry.path().to_string_lossy().into_owned());
            }
        }
        paths.sort();
        Ok(Value::Array(paths.into_iter().map(Value::String).collect()))
    }

    async fn create_container(folder: &str) -> Result<Value, HandlerError> {
        tokio::fs::create_dir_all(folder)
            .await
            .map_err(|e| io_error(folder, e))?;
        Ok(Value::Null)
    }

    async fn delete_container(folder: &str) -> Result<Value, HandlerError> {
        tokio::fs::remove_dir_all(folder)
            .await
            .map_err(|e| io_error(folder, e))?;
        Ok(Value::Null)
    }
}

impl Capability for LocalFileSystem {
    fn methods(&self) -> &[&str] {
        METHODS
    }

    fn invoke<'a>(
        &'a self,
        method: &'a str,
        args: Vec<Value>,
    ) -> BoxFuture<'a, Result<Value, HandlerError>> {
        Box::pin(async move {
            match method {
                "readText" => Self::read_text(str_arg(&args, 0)?).await,
                "writeText" => Self::write_text(str_arg(&args, 0)?, str_arg(&args, 1)?).await,
                "deleteFile" => Self::delete_file(str_arg(&args, 0)?).await,
                "listFiles" => Self::list_entries(str_arg(&args, 0)?, false).await,
                "listContainers" => Self::list_entries(str_arg(&args, 0)?, true).await,
                "createContainer" => Self::create_container(str_arg(&args, 0)?).await,
                "deleteContainer" => Self::delete_container(str_arg(&args, 0)?).await,
                "exists" => Self::exists(str_arg(&args, 0)?).await,
                // The router only forwards names from METHODS
                other => Err(HandlerError::new(
                    INVALID_ARGS_KIND,
                    format!("LocalFileSystem has no method: {other}"),
                )),
            }
        })
    }
}

fn io_error(path: &str, err: std::io::Error) -> HandlerError {
    HandlerError::new(IO_ERROR_KIND, format!("{path}: {err}"))
}

fn str_arg(args: &[Value], index: usize) -> Result<&str, HandlerError> {
    args.get(index).and_then(Value::as_str).ok_or_else(|| {
        HandlerError::new(
            INVALID_ARGS_KIND,
            format!("expected a string argument at position {index}"),
        )
    })
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;

    fn path_arg(path: &std::path::Path) -> Value {
        json!(path.to_string_lossy())
    }

    #[tokio::test]
    async fn test_write_then_read_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("project.json");
        let fs = LocalFileSystem::new();

        let written = fs
            .invoke("writeText", vec![path_arg(&file), json!("{\"name\":\"cells\"}")])
            .await
            .unwrap();
        assert_eq!(written, Value::Null);

        let read = fs.invoke("readText", vec![path_arg(&file)]).await.unwrap();
        assert_eq!(read, json!("{\"name\":\"cells\"}"));
    }

    #[tokio::test]
    async fn test_read_missing_file_is_io_error() {
        let fs = LocalFileSystem::new();
        let err = fs
            .invoke("readText", vec![json!("/nonexistent/taglab/file.json")])
            .await
            .unwrap_err();
        assert_eq!(err.kind, IO_ERROR_KIND);
        assert!(err.message.contains("/nonexistent/taglab/file.json"));
    }

    #[tokio::test]
    async fn test_missing_argument_is_invalid_args() {
        let fs = LocalFileSystem::new();
        let err = fs.invoke("readText", vec![]).await.unwrap_err();
        assert_eq!(err.kind, INVALID_ARGS_KIND);

        // Wrong type counts too
        let err = fs.invoke("readText", vec![json!(42)]).await.unwrap_err();
        assert_eq!(err.kind, INVALID_ARGS_KIND);
    }

    #[tokio::test]
    async fn test_list_files_excludes_containers_and_sorts() {
        let dir = tempfile::tempdir().unwrap();
        let fs = LocalFileSystem::new();
        tokio::fs::write(dir.path().join("b.png"), b"").await.unwrap();
        tokio::fs::write(dir.path().join("a.png"), b"").await.unwrap();
        tokio::fs::create_dir(dir.path().join("sub")).await.unwrap();

        let listed = fs
            .invoke("listFiles", vec![path_arg(dir.path())])
            .await
            .unwrap();
        let expected = json!([
            dir.path().join("a.png").to_string_lossy(),
            dir.path().join("b.png").to_string_lossy(),
        ]);
        assert_eq!(listed, expected);

        let containers = fs
            .invoke("listContainers", vec![path_arg(dir.path())])
            .await
            .unwrap();
        assert_eq!(containers, json!([dir.path().join("sub").to_string_lossy()]));
    }

    #[tokio::test]
    async fn test_container_lifecycle() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("projects").join("cells");
        let fs = LocalFileSystem::new();

        fs.invoke("createContainer", vec![path_arg(&nested)])
            .await
            .unwrap();
        assert_eq!(
            fs.invoke("exists", vec![path_arg(&nested)]).await.unwrap(),
            json!(true)
        );

        tokio::fs::write(nested.join("x.json"), b"{}").await.unwrap();
        fs.invoke("deleteContainer", vec![path_arg(&nested)])
            .await
            .unwrap();
        assert_eq!(
            fs.invoke("exists", vec![path_arg(&nested)]).await.unwrap(),
            json!(false)
        );
    }

    #[tokio::test]
    async fn test_delete_file() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("stale.json");
        tokio::fs::write(&file, b"{}").await.unwrap();

        let fs = LocalFileSystem::new();
        fs.invoke("deleteFile", vec![path_arg(&file)]).await.unwrap();
        assert!(!file.exists());
    }

    #[test]
    fn test_method_set_is_closed_and_fixed() {
        let fs = LocalFileSystem::new();
        assert!(fs.methods().contains(&"readText"));
        assert!(fs.methods().contains(&"deleteContainer"));
        assert!(!fs.methods().contains(&"selectContainer"));
    }
}

//! Async calling convention over the blocking core.
//!
//! Every method moves a clone of the handle onto tokio's blocking pool and
//! awaits it, so each call is a suspension point. Two calls on the same
//! handle are not ordered against each other; callers that need ordering
//! await one before starting the next.

use std::io;

use tokio::task;

use crate::error::{FileError, Result};
use crate::handle::FileHandle;
use crate::permission::PermissionSet;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AsyncFileHandle {
    inner: FileHandle,
}

impl AsyncFileHandle {
    pub fn new(inner: FileHandle) -> Self {
        Self { inner }
    }

    pub fn inner(&self) -> &FileHandle {
        &self.inner
    }

    pub fn into_inner(self) -> FileHandle {
        self.inner
    }

    async fn run<T, F>(&self, op: F) -> Result<T>
    where
        F: FnOnce(FileHandle) -> T + Send + 'static,
        T: Send + 'static,
    {
        let handle = self.inner.clone();
        task::spawn_blocking(move || op(handle))
            .await
            .map_err(|e| FileError::Io(io::Error::other(e)))
    }

    pub async fn exists(&self) -> Result<bool> {
        self.run(|h| h.exists()).await
    }

    pub async fn is_directory(&self) -> Result<bool> {
        self.run(|h| h.is_directory()).await
    }

    pub async fn is_file(&self) -> Result<bool> {
        self.run(|h| h.is_file()).await
    }

    pub async fn length(&self) -> Result<u64> {
        self.run(|h| h.length()).await
    }

    pub async fn last_modified(&self) -> Result<i64> {
        self.run(|h| h.last_modified()).await
    }

    pub async fn canonical_path(&self) -> Result<String> {
        self.run(|h| h.canonical_path()).await?
    }

    pub async fn total_space(&self) -> Result<u64> {
        self.run(|h| h.total_space()).await?
    }

    pub async fn free_space(&self) -> Result<u64> {
        self.run(|h| h.free_space()).await?
    }

    pub async fn usable_space(&self) -> Result<u64> {
        self.run(|h| h.usable_space()).await?
    }

    pub async fn permissions(&self) -> Result<PermissionSet> {
        self.run(|h| h.permissions()).await?
    }

    pub async fn list(&self) -> Result<Option<Vec<String>>> {
        self.run(|h| h.list()).await
    }

    pub async fn list_files(&self) -> Result<Option<Vec<AsyncFileHandle>>> {
        let files = self.run(|h| h.list_files()).await?;
        Ok(files.map(|files| files.into_iter().map(AsyncFileHandle::new).collect()))
    }

    pub async fn create_new_file(&self) -> Result<bool> {
        self.run(|h| h.create_new_file()).await
    }

    pub async fn delete(&self) -> Result<bool> {
        self.run(|h| h.delete()).await
    }

    pub async fn mkdir(&self) -> Result<bool> {
        self.run(|h| h.mkdir()).await
    }

    pub async fn mkdirs(&self) -> Result<bool> {
        self.run(|h| h.mkdirs()).await
    }

    pub async fn rename_to(&self, dest: &AsyncFileHandle) -> Result<bool> {
        let dest = dest.inner.clone();
        self.run(move |h| h.rename_to(&dest)).await
    }

    pub async fn set_last_modified(&self, time: i64) -> Result<bool> {
        self.run(move |h| h.set_last_modified(time)).await?
    }

    pub async fn set_read_only(&self) -> Result<bool> {
        self.run(|h| h.set_read_only()).await?
    }

    pub async fn set_writable(&self, value: bool, owner_only: bool) -> Result<bool> {
        self.run(move |h| h.set_writable(value, owner_only)).await?
    }

    pub async fn set_readable(&self, value: bool, owner_only: bool) -> Result<bool> {
        self.run(move |h| h.set_readable(value, owner_only)).await?
    }

    pub async fn set_executable(&self, value: bool, owner_only: bool) -> Result<bool> {
        self.run(move |h| h.set_executable(value, owner_only)).await?
    }

    pub async fn set_permissions(&self, perms: PermissionSet) -> Result<bool> {
        self.run(move |h| h.set_permissions(perms)).await?
    }

    pub async fn child(
        &self,
        name: &str,
        is_directory: bool,
        mime_type: Option<&str>,
    ) -> Result<Option<AsyncFileHandle>> {
        let name = name.to_string();
        let mime_type = mime_type.map(str::to_string);
        let child = self
            .run(move |h| h.child(&name, is_directory, mime_type.as_deref()))
            .await?;
        Ok(child.map(AsyncFileHandle::new))
    }

    /// Whole content, `None` when the file cannot be opened.
    pub async fn read_bytes(&self) -> Result<Option<Vec<u8>>> {
        self.run(|h| match h.open_input_stream() {
            Some(source) => source.read_all().map(Some).map_err(FileError::from),
            None => Ok(None),
        })
        .await?
    }

    /// Write `data` and close. `false` when the file cannot be opened.
    pub async fn write_bytes(&self, data: Vec<u8>, append: bool) -> Result<bool> {
        self.run(move |h| -> Result<bool> {
            use std::io::Write;

            match h.open_output_stream(append) {
                Some(mut sink) => {
                    sink.write_all(&data)?;
                    sink.close()?;
                    Ok(true)
                }
                None => Ok(false),
            }
        })
        .await?
    }
}

impl From<FileHandle> for AsyncFileHandle {
    fn from(inner: FileHandle) -> Self {
        Self::new(inner)
    }
}

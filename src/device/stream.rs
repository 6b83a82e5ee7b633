use crate::error::DeviceError;
use crate::reading_log::ReadingLog;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// One configured pointing device and its reading log
#[derive(Debug)]
pub struct DeviceStream {
    id: String,
    path: Option<PathBuf>,
    log: Arc<ReadingLog>,
}

impl DeviceStream {
    pub fn new<S: Into<String>>(id: S, path: Option<PathBuf>) -> Self {
        Self {
            id: id.into(),
            path,
            log: Arc::new(ReadingLog::new()),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn log(&self) -> Arc<ReadingLog> {
        Arc::clone(&self.log)
    }
}

/// Fixed mapping from device id to stream, in configuration order.
///
/// Built once before any task starts and never resized afterwards.
#[derive(Debug, Default)]
pub struct DeviceRegistry {
    streams: Vec<Arc<DeviceStream>>,
    index: HashMap<String, usize>,
}

impl DeviceRegistry {
    pub fn new(streams: Vec<DeviceStream>) -> Result<Self, DeviceError> {
        let mut index = HashMap::with_capacity(streams.len());
        for (position, stream) in streams.iter().enumerate() {
            if index.insert(stream.id.clone(), position).is_some() {
                return Err(DeviceError::DuplicateId(stream.id.clone()));
            }
        }

        Ok(Self {
            streams: streams.into_iter().map(Arc::new).collect(),
            index,
        })
    }

    pub fn get(&self, id: &str) -> Option<&Arc<DeviceStream>> {
        self.index.get(id).map(|&position| &self.streams[position])
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<DeviceStream>> {
        self.streams.iter()
    }

    pub fn ids(&self) -> Vec<String> {
        self.streams.iter().map(|s| s.id.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.streams.len()
    }

    pub fn is_empty(&self) -> bool {
        self.streams.is_empty()
    }
}

/// Device ids for a list of paths: the last path component when
/// `id_from_path` is set, otherwise the position in the list.
pub fn derive_device_ids<P: AsRef<Path>>(paths: &[P], id_from_path: bool) -> Vec<String> {
    paths
        .iter()
        .enumerate()
        .map(|(position, path)| {
            let path = path.as_ref();
            if id_from_path {
                path.file_name()
                    .map(|name| name.to_string_lossy().into_owned())
                    .unwrap_or_else(|| path.display().to_string())
            } else {
                position.to_string()
            }
        })
        .collect()
}

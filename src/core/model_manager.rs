// Model cache - resolves configured model sources to local files

use crate::core::config::ModelSource;
use std::path::{Path, PathBuf};

#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    #[error("Model file not found: {0}")]
    NotFound(PathBuf),

    #[error("Model download failed: {0}")]
    Download(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Model cache I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type ModelResult<T> = Result<T, ModelError>;

/// Model manager for caching and loading ML models
pub struct ModelManager {
    cache_dir: PathBuf,
}

impl ModelManager {
    /// Create a new model manager with cache directory
    pub fn new(cache_dir: PathBuf) -> ModelResult<Self> {
        std::fs::create_dir_all(&cache_dir)?;
        Ok(Self { cache_dir })
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    /// Local cache path for a model role and source, keeping the source's extension
    pub fn get_model_path(&self, name: &str, source: &ModelSource) -> PathBuf {
        let extension = match source {
            ModelSource::LocalFile(path) => path
                .extension()
                .map(|ext| ext.to_string_lossy().into_owned()),
            ModelSource::Url(url) => url
                .rsplit('/')
                .next()
                .and_then(|last| last.rsplit_once('.'))
                .map(|(_, ext)| ext.to_string()),
        };

        match extension {
            Some(ext) if !ext.is_empty() => self.cache_dir.join(format!("{}.{}", name, ext)),
            _ => self.cache_dir.join(name),
        }
    }

    pub fn is_cached(&self, name: &str, source: &ModelSource) -> bool {
        self.get_model_path(name, source).exists()
    }

    /// Copy or download a model into the cache if it isn't there yet
    pub async fn ensure_model(&self, name: &str, source: &ModelSource) -> ModelResult<PathBuf> {
        let model_path = self.get_model_path(name, source);

        if model_path.exists() {
            tracing::debug!(model = name, path = %model_path.display(), "Model already cached");
            return Ok(model_path);
        }

        match source {
            ModelSource::LocalFile(path) => {
                if !path.exists() {
                    return Err(ModelError::NotFound(path.clone()));
                }
                tracing::info!(model = name, from = %path.display(), "Caching local model");
                tokio::fs::copy(path, &model_path).await?;
            }
            ModelSource::Url(url) => {
                tracing::info!(model = name, url = %url, "Downloading model");
                let bytes = Self::download(url.clone()).await?;
                tokio::fs::write(&model_path, bytes).await?;
            }
        }

        Ok(model_path)
    }

    async fn download(url: String) -> ModelResult<Vec<u8>> {
        tokio::task::spawn_blocking(move || -> ModelResult<Vec<u8>> {
            let response = reqwest::blocking::get(&url)?.error_for_status()?;
            Ok(response.bytes()?.to_vec())
        })
        .await
        .map_err(|e| ModelError::Download(e.to_string()))?
    }

    /// Cached model files with their sizes in bytes
    pub fn cached_models(&self) -> ModelResult<Vec<(PathBuf, u64)>> {
        let mut models = Vec::new();
        for entry in std::fs::read_dir(&self.cache_dir)? {
            let entry = entry?;
            let metadata = entry.metadata()?;
            if metadata.is_file() {
                models.push((entry.path(), metadata.len()));
            }
        }
        Ok(models)
    }

    pub fn cache_size(&self) -> ModelResult<u64> {
        Ok(self.cached_models()?.iter().map(|(_, size)| size).sum())
    }

    /// Remove every cached model, keeping the directory; returns how many were removed
    pub fn clear_cache(&self) -> ModelResult<usize> {
        let models = self.cached_models()?;
        for (path, _) in &models {
            std::fs::remove_file(path)?;
        }
        tracing::info!(removed = models.len(), dir = %self.cache_dir.display(), "Model cache cleared");
        Ok(models.len())
    }
}

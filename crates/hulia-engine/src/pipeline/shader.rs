use std::borrow::Cow;
use std::path::{Path, PathBuf};

use thiserror::Error;

/// Entry point name used when none is given.
pub const DEFAULT_ENTRY_POINT: &str = "main";

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum ShaderStage {
    Vertex,
    Fragment,
}

/// Encoding of a shader blob.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum ShaderFormat {
    /// SPIR-V words, little-endian.
    Spirv,
    /// WGSL source text.
    Wgsl,
}

/// Resource counts a shader stage declares.
///
/// These must equal what the pipeline binds for that stage.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq, Hash)]
pub struct ShaderResources {
    pub samplers: u32,
    pub uniform_buffers: u32,
    pub storage_buffers: u32,
    pub storage_textures: u32,
}

impl ShaderResources {
    pub const NONE: ShaderResources = ShaderResources {
        samplers: 0,
        uniform_buffers: 0,
        storage_buffers: 0,
        storage_textures: 0,
    };

    pub const fn samplers(count: u32) -> Self {
        Self {
            samplers: count,
            ..Self::NONE
        }
    }
}

#[derive(Debug, Error)]
pub enum ShaderError {
    #[error("failed to read shader {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("SPIR-V blob of {len} bytes is not a whole number of words")]
    MisalignedSpirv { len: usize },

    #[error("SPIR-V blob has bad magic number {0:#010x}")]
    BadMagic(u32),

    #[error("WGSL shader is not valid UTF-8")]
    InvalidUtf8(#[from] std::string::FromUtf8Error),

    #[error("shader blob is empty")]
    Empty,
}

const SPIRV_MAGIC: u32 = 0x0723_0203;

/// Compiled or source shader code plus the metadata pipeline creation needs.
#[derive(Debug, Clone, PartialEq)]
pub struct ShaderSource {
    pub label: Option<String>,
    pub stage: ShaderStage,
    pub entry_point: String,
    pub code: ShaderCode,
    pub resources: ShaderResources,
}

/// Decoded shader blob.
#[derive(Debug, Clone, PartialEq)]
pub enum ShaderCode {
    Spirv(Vec<u32>),
    Wgsl(String),
}

impl ShaderCode {
    pub fn format(&self) -> ShaderFormat {
        match self {
            ShaderCode::Spirv(_) => ShaderFormat::Spirv,
            ShaderCode::Wgsl(_) => ShaderFormat::Wgsl,
        }
    }

    /// Decodes a raw blob of the given format.
    pub fn from_bytes(format: ShaderFormat, bytes: Vec<u8>) -> Result<Self, ShaderError> {
        if bytes.is_empty() {
            return Err(ShaderError::Empty);
        }
        match format {
            ShaderFormat::Spirv => {
                if bytes.len() % 4 != 0 {
                    return Err(ShaderError::MisalignedSpirv { len: bytes.len() });
                }
                let words: Vec<u32> = bytes
                    .chunks_exact(4)
                    .map(|w| u32::from_le_bytes([w[0], w[1], w[2], w[3]]))
                    .collect();
                if words[0] != SPIRV_MAGIC {
                    return Err(ShaderError::BadMagic(words[0]));
                }
                Ok(ShaderCode::Spirv(words))
            }
            ShaderFormat::Wgsl => Ok(ShaderCode::Wgsl(String::from_utf8(bytes)?)),
        }
    }
}

impl ShaderSource {
    /// WGSL source held in memory.
    pub fn wgsl(stage: ShaderStage, source: impl Into<String>, resources: ShaderResources) -> Self {
        Self {
            label: None,
            stage,
            entry_point: DEFAULT_ENTRY_POINT.to_string(),
            code: ShaderCode::Wgsl(source.into()),
            resources,
        }
    }

    /// Reads a shader blob whole from `path`.
    ///
    /// The stage is taken from the caller; nothing is inferred from the file
    /// name or contents beyond the format check.
    pub fn from_file(
        path: impl AsRef<Path>,
        stage: ShaderStage,
        format: ShaderFormat,
        resources: ShaderResources,
    ) -> Result<Self, ShaderError> {
        let path = path.as_ref();
        let bytes = std::fs::read(path).map_err(|source| ShaderError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        log::debug!("read {} byte {:?} shader from {}", bytes.len(), stage, path.display());

        Ok(Self {
            label: Some(path.display().to_string()),
            stage,
            entry_point: DEFAULT_ENTRY_POINT.to_string(),
            code: ShaderCode::from_bytes(format, bytes)?,
            resources,
        })
    }

    pub fn with_entry_point(mut self, entry_point: impl Into<String>) -> Self {
        self.entry_point = entry_point.into();
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn label(&self) -> Cow<'_, str> {
        match &self.label {
            Some(l) => Cow::Borrowed(l),
            None => Cow::Owned(format!("{:?} shader", self.stage)),
        }
    }
}

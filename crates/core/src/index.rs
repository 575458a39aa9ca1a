use crate::error::IndexError;
use crate::models::{Chunk, QueryResult};
use sha2::{Digest, Sha256};
use std::fs;
use std::path::Path;
use tracing::info;

pub const VECTORS_FILE: &str = "vectors.bin";
pub const METADATA_FILE: &str = "chunks.json";

const MAGIC: [u8; 4] = *b"SRVI";
const FORMAT_VERSION: u16 = 2;
const DIGEST_LEN: usize = 32;
/// Magic, version, dimension, count, model id length and digest; the model id bytes follow the length.
const FIXED_HEADER_LEN: usize = 4 + 2 + 4 + 8 + 2 + DIGEST_LEN;

pub trait VectorIndex {
    fn dimension(&self) -> usize;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Appends vectors and their chunks in lock-step. Nothing is appended on error.
    fn add(&mut self, vectors: &[Vec<f32>], metadata: &[Chunk]) -> Result<(), IndexError>;

    /// Up to `k` entries by ascending squared L2 distance, ties by insertion order.
    fn search(&self, query: &[f32], k: usize) -> Result<Vec<QueryResult>, IndexError>;
}

/// Exact brute-force index. Vector `i` lives at `vectors[i * dimension..]` and belongs to `chunks[i]`.
#[derive(Debug, Clone)]
pub struct FlatL2Index {
    dimension: usize,
    model_id: String,
    vectors: Vec<f32>,
    chunks: Vec<Chunk>,
}

impl FlatL2Index {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            model_id: String::new(),
            vectors: Vec::new(),
            chunks: Vec::new(),
        }
    }

    /// Records the embedding model whose vectors this index holds.
    pub fn with_model(mut self, model_id: impl Into<String>) -> Self {
        self.model_id = model_id.into();
        self
    }

    pub fn model_id(&self) -> &str {
        &self.model_id
    }

    pub fn chunks(&self) -> &[Chunk] {
        &self.chunks
    }

    pub fn vector(&self, position: usize) -> Option<&[f32]> {
        let start = position.checked_mul(self.dimension)?;
        self.vectors.get(start..start + self.dimension)
    }

    /// Both artifacts are present under `dir`.
    pub fn exists(dir: &Path) -> bool {
        dir.join(VECTORS_FILE).is_file() && dir.join(METADATA_FILE).is_file()
    }

    pub fn save(&self, dir: &Path) -> Result<(), IndexError> {
        let dimension = u32::try_from(self.dimension)
            .map_err(|_| IndexError::UnsupportedDimension(self.dimension))?;
        let model_len =
            u16::try_from(self.model_id.len()).map_err(|_| IndexError::ModelIdTooLong {
                model_id: self.model_id.clone(),
                max: u16::MAX as usize,
            })?;

        fs::create_dir_all(dir)?;

        let metadata = serde_json::to_vec_pretty(&self.chunks)?;
        let digest: [u8; DIGEST_LEN] = Sha256::digest(&metadata).into();

        let mut buffer =
            Vec::with_capacity(FIXED_HEADER_LEN + self.model_id.len() + self.vectors.len() * 4);
        buffer.extend_from_slice(&MAGIC);
        buffer.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
        buffer.extend_from_slice(&dimension.to_le_bytes());
        buffer.extend_from_slice(&(self.len() as u64).to_le_bytes());
        buffer.extend_from_slice(&model_len.to_le_bytes());
        buffer.extend_from_slice(self.model_id.as_bytes());
        buffer.extend_from_slice(&digest);
        for value in &self.vectors {
            buffer.extend_from_slice(&value.to_le_bytes());
        }

        fs::write(dir.join(METADATA_FILE), &metadata)?;
        fs::write(dir.join(VECTORS_FILE), &buffer)?;

        info!(
            dir = %dir.display(),
            vector_count = self.len(),
            dimension = self.dimension,
            model = %self.model_id,
            "saved index"
        );
        Ok(())
    }

    pub fn load(dir: &Path) -> Result<Self, IndexError> {
        let vectors_path = dir.join(VECTORS_FILE);
        let metadata_path = dir.join(METADATA_FILE);
        for path in [&vectors_path, &metadata_path] {
            if !path.is_file() {
                return Err(IndexError::IndexNotFound(path.clone()));
            }
        }

        let bytes = fs::read(&vectors_path)?;
        let metadata = fs::read(&metadata_path)?;

        let mut reader = ByteReader::new(&bytes);
        if reader.take(4)? != MAGIC {
            return Err(IndexError::CorruptIndex(format!(
                "{} is not a vector artifact",
                vectors_path.display()
            )));
        }
        let version = reader.u16()?;
        if version != FORMAT_VERSION {
            return Err(IndexError::CorruptIndex(format!(
                "unsupported vector artifact version {version}"
            )));
        }
        let dimension = reader.u32()? as usize;
        let count = usize::try_from(reader.u64()?)
            .map_err(|_| IndexError::CorruptIndex("vector count overflows usize".to_string()))?;
        if dimension == 0 && count > 0 {
            return Err(IndexError::CorruptIndex(
                "vectors recorded with dimension 0".to_string(),
            ));
        }
        let model_len = reader.u16()? as usize;
        let model_id = std::str::from_utf8(reader.take(model_len)?)
            .map_err(|_| IndexError::CorruptIndex("model id is not utf-8".to_string()))?
            .to_string();
        let recorded_digest = reader.take(DIGEST_LEN)?;

        let chunks: Vec<Chunk> = serde_json::from_slice(&metadata).map_err(|error| {
            IndexError::CorruptIndex(format!("{}: {error}", metadata_path.display()))
        })?;

        if chunks.len() != count {
            return Err(IndexError::CorruptIndex(format!(
                "vector count {count} does not match metadata count {}",
                chunks.len()
            )));
        }

        if Sha256::digest(&metadata).as_slice() != recorded_digest {
            return Err(IndexError::CorruptIndex(
                "metadata artifact does not belong to this vector artifact".to_string(),
            ));
        }

        let payload_len = count
            .checked_mul(dimension)
            .and_then(|values| values.checked_mul(4))
            .ok_or_else(|| IndexError::CorruptIndex("vector payload overflows".to_string()))?;
        let payload = reader.take(payload_len)?;
        if !reader.is_exhausted() {
            return Err(IndexError::CorruptIndex(
                "trailing bytes after vector payload".to_string(),
            ));
        }

        let vectors = payload
            .chunks_exact(4)
            .map(|value| f32::from_le_bytes([value[0], value[1], value[2], value[3]]))
            .collect();

        info!(
            dir = %dir.display(),
            vector_count = count,
            dimension,
            model = %model_id,
            "loaded index"
        );

        Ok(Self {
            dimension,
            model_id,
            vectors,
            chunks,
        })
    }
}

impl VectorIndex for FlatL2Index {
    fn dimension(&self) -> usize {
        self.dimension
    }

    fn len(&self) -> usize {
        self.chunks.len()
    }

    fn add(&mut self, vectors: &[Vec<f32>], metadata: &[Chunk]) -> Result<(), IndexError> {
        if vectors.len() != metadata.len() {
            return Err(IndexError::CountMismatch {
                vectors: vectors.len(),
                metadata: metadata.len(),
            });
        }

        if self.dimension == 0 && !vectors.is_empty() {
            return Err(IndexError::UnsupportedDimension(0));
        }

        if let Some((position, vector)) = vectors
            .iter()
            .enumerate()
            .find(|(_, vector)| vector.len() != self.dimension)
        {
            return Err(IndexError::DimensionMismatch {
                expected: self.dimension,
                actual: vector.len(),
                position,
            });
        }

        self.vectors.reserve(vectors.len() * self.dimension);
        for vector in vectors {
            self.vectors.extend_from_slice(vector);
        }
        self.chunks.extend_from_slice(metadata);
        Ok(())
    }

    fn search(&self, query: &[f32], k: usize) -> Result<Vec<QueryResult>, IndexError> {
        if query.len() != self.dimension {
            return Err(IndexError::DimensionMismatch {
                expected: self.dimension,
                actual: query.len(),
                position: 0,
            });
        }

        if k == 0 || self.chunks.is_empty() {
            return Ok(Vec::new());
        }

        let mut scored: Vec<(usize, f32)> = self
            .vectors
            .chunks_exact(self.dimension.max(1))
            .take(self.chunks.len())
            .map(|stored| squared_l2(query, stored))
            .enumerate()
            .collect();

        scored.sort_by(|left, right| left.1.total_cmp(&right.1).then(left.0.cmp(&right.0)));
        scored.truncate(k);

        Ok(scored
            .into_iter()
            .map(|(position, score)| QueryResult::from_chunk(&self.chunks[position], score))
            .collect())
    }
}

pub fn squared_l2(left: &[f32], right: &[f32]) -> f32 {
    left.iter()
        .zip(right)
        .map(|(a, b)| {
            let delta = a - b;
            delta * delta
        })
        .sum()
}

struct ByteReader<'a> {
    bytes: &'a [u8],
    cursor: usize,
}

impl<'a> ByteReader<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, cursor: 0 }
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8], IndexError> {
        let end = self
            .cursor
            .checked_add(len)
            .filter(|end| *end <= self.bytes.len())
            .ok_or_else(|| {
                IndexError::CorruptIndex(format!(
                    "vector artifact truncated at byte {} (wanted {len} more)",
                    self.cursor
                ))
            })?;
        let slice = &self.bytes[self.cursor..end];
        self.cursor = end;
        Ok(slice)
    }

    fn array<const N: usize>(&mut self) -> Result<[u8; N], IndexError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    fn u16(&mut self) -> Result<u16, IndexError> {
        Ok(u16::from_le_bytes(self.array()?))
    }

    fn u32(&mut self) -> Result<u32, IndexError> {
        Ok(u32::from_le_bytes(self.array()?))
    }

    fn u64(&mut self) -> Result<u64, IndexError> {
        Ok(u64::from_le_bytes(self.array()?))
    }

    fn is_exhausted(&self) -> bool {
        self.cursor == self.bytes.len()
    }
}

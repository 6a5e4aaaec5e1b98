//! Core data model: client/request/job identifiers, chunk framing, and the
//! tensor wire format.
//!
//! Byte strings are concatenated with ASCII `#` (client # req) and `@`
//! (job @ partial) sentinels. Neither byte may appear inside a client
//! address or a request id; callers must validate at ingress with
//! [`validate_ingress_bytes`].

use crate::error::{ProtocolError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

const JOB_SEP: u8 = b'#';
const PARTIAL_SEP: u8 = b'@';

/// Opaque client route assigned by the transport to a subscriber.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClientAddr(pub Vec<u8>);

/// Opaque, client-chosen label for a single in-flight request.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ReqId(pub Vec<u8>);

impl ClientAddr {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Result<Self> {
        let bytes = bytes.into();
        validate_ingress_bytes(&bytes, "client address")?;
        Ok(Self(bytes))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl ReqId {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Result<Self> {
        let bytes = bytes.into();
        validate_ingress_bytes(&bytes, "request id")?;
        Ok(Self(bytes))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Display for ClientAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", String::from_utf8_lossy(&self.0))
    }
}

impl fmt::Display for ReqId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", String::from_utf8_lossy(&self.0))
    }
}

/// Reject client addresses / request ids that would collide with the
/// `#` / `@` framing sentinels.
pub fn validate_ingress_bytes(bytes: &[u8], field: &'static str) -> Result<()> {
    if bytes.contains(&JOB_SEP) {
        return Err(ProtocolError::ReservedByte { field, sentinel: '#' });
    }
    if bytes.contains(&PARTIAL_SEP) {
        return Err(ProtocolError::ReservedByte { field, sentinel: '@' });
    }
    Ok(())
}

/// Uniquely identifies a submitted request within the broker's lifetime:
/// `client_addr # req_id`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct JobId {
    pub client: ClientAddr,
    pub req: ReqId,
}

impl JobId {
    pub fn new(client: ClientAddr, req: ReqId) -> Self {
        Self { client, req }
    }

    /// Concatenate into the wire form `client_addr # req_id`.
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.client.0.len() + 1 + self.req.0.len());
        out.extend_from_slice(&self.client.0);
        out.push(JOB_SEP);
        out.extend_from_slice(&self.req.0);
        out
    }

    /// Split a wire-form job id back into its two parts.
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        let idx = bytes
            .iter()
            .position(|&b| b == JOB_SEP)
            .ok_or_else(|| ProtocolError::MalformedChunkId(bytes.to_vec()))?;
        let client = ClientAddr(bytes[..idx].to_vec());
        let req = ReqId(bytes[idx + 1..].to_vec());
        Ok(Self { client, req })
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.client, self.req)
    }
}

/// The starting byte offset of a chunk within its originating batch. Zero
/// when the request fit in a single chunk.
pub type PartialId = u64;

/// What Workers see as their input label and what the Sink parses to
/// reattach a result to its Job: `job_id` optionally suffixed with
/// `@partial_id`. The suffix is only present when a batch was actually
/// partitioned; a whole, unpartitioned batch carries no `@` at all.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkId {
    pub job: JobId,
    pub partial: Option<PartialId>,
}

impl ChunkId {
    /// Chunk id for a batch that fit entirely in one chunk.
    pub fn whole(job: JobId) -> Self {
        Self { job, partial: None }
    }

    /// Chunk id for one slice of a partitioned batch.
    pub fn part(job: JobId, partial: PartialId) -> Self {
        Self { job, partial: Some(partial) }
    }

    /// The partial id used for sorting/reassembly; defaults to zero when
    /// the chunk carried no `@` suffix.
    pub fn partial_or_zero(&self) -> PartialId {
        self.partial.unwrap_or(0)
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut out = self.job.encode();
        if let Some(p) = self.partial {
            out.push(PARTIAL_SEP);
            out.extend_from_slice(p.to_string().as_bytes());
        }
        out
    }

    pub fn parse(bytes: &[u8]) -> Result<Self> {
        match bytes.iter().rposition(|&b| b == PARTIAL_SEP) {
            Some(idx) => {
                let partial_str = std::str::from_utf8(&bytes[idx + 1..])
                    .map_err(|_| ProtocolError::MalformedChunkId(bytes.to_vec()))?;
                let partial: PartialId = partial_str
                    .parse()
                    .map_err(|_| ProtocolError::MalformedChunkId(bytes.to_vec()))?;
                let job = JobId::parse(&bytes[..idx])?;
                Ok(Self { job, partial: Some(partial) })
            }
            None => {
                let job = JobId::parse(bytes)?;
                Ok(Self { job, partial: None })
            }
        }
    }
}

impl fmt::Display for ChunkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.partial {
            Some(p) => write!(f, "{}@{}", self.job, p),
            None => write!(f, "{}", self.job),
        }
    }
}

/// Reserved control-plane sentinel payloads. `Register` is internal
/// (Ventilator -> Sink) and must never be sent by a client.
pub mod sentinel {
    pub const TERMINATION: &[u8] = b"TERMINATION";
    pub const SHOW_CONFIG: &[u8] = b"SHOW_CONFIG";
    pub const REGISTER: &[u8] = b"REGISTER";
}

/// Stable subset of dtype strings the broker will reshape a raw buffer
/// against. Follows the textual convention of the host's numeric library.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DType {
    Float32,
    Float64,
    Int32,
    Int64,
}

impl DType {
    pub fn elem_size(self) -> usize {
        match self {
            DType::Float32 | DType::Int32 => 4,
            DType::Float64 | DType::Int64 => 8,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            DType::Float32 => "float32",
            DType::Float64 => "float64",
            DType::Int32 => "int32",
            DType::Int64 => "int64",
        }
    }
}

impl std::str::FromStr for DType {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "float32" => Ok(DType::Float32),
            "float64" => Ok(DType::Float64),
            "int32" => Ok(DType::Int32),
            "int64" => Ok(DType::Int64),
            other => Err(ProtocolError::UnknownDType(other.to_string())),
        }
    }
}

/// `{dtype, shape}` header for a tensor frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TensorHeader {
    pub dtype: DType,
    pub shape: Vec<u64>,
}

impl TensorHeader {
    /// Leading dimension: number of items/rows this tensor covers.
    pub fn rows(&self) -> u64 {
        self.shape.first().copied().unwrap_or(0)
    }

    fn expected_byte_len(&self) -> usize {
        let elems: u64 = self.shape.iter().product();
        elems as usize * self.dtype.elem_size()
    }
}

/// A tensor on the wire: a JSON header frame plus a raw contiguous
/// little-endian buffer whose length equals `prod(shape) * sizeof(dtype)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tensor {
    pub header: TensorHeader,
    pub bytes: Vec<u8>,
}

impl Tensor {
    pub fn new(dtype: DType, shape: Vec<u64>, bytes: Vec<u8>) -> Result<Self> {
        let header = TensorHeader { dtype, shape };
        let expected = header.expected_byte_len();
        if bytes.len() != expected {
            return Err(ProtocolError::TensorLengthMismatch { expected, got: bytes.len() });
        }
        Ok(Self { header, bytes })
    }

    pub fn rows(&self) -> u64 {
        self.header.rows()
    }

    /// Pack into the two wire frames `(header_json, raw_bytes)`.
    pub fn pack(&self) -> Result<(Vec<u8>, Vec<u8>)> {
        Ok((serde_json::to_vec(&self.header)?, self.bytes.clone()))
    }

    /// Reconstruct from the two wire frames.
    pub fn unpack(header_bytes: &[u8], raw_bytes: &[u8]) -> Result<Self> {
        let header: TensorHeader = serde_json::from_slice(header_bytes)?;
        let expected = header.expected_byte_len();
        if raw_bytes.len() != expected {
            return Err(ProtocolError::TensorLengthMismatch { expected, got: raw_bytes.len() });
        }
        Ok(Self { header, bytes: raw_bytes.to_vec() })
    }

    /// Concatenate tensors along axis 0. Callers are responsible for
    /// ordering `parts` by partial id first; trailing dimensions and dtype
    /// must match across all parts.
    pub fn concat(parts: Vec<Tensor>) -> Result<Tensor> {
        let mut iter = parts.into_iter();
        let first = match iter.next() {
            Some(t) => t,
            None => {
                return Ok(Tensor {
                    header: TensorHeader { dtype: DType::Float32, shape: vec![0] },
                    bytes: Vec::new(),
                })
            }
        };

        let dtype = first.header.dtype;
        let trailing = first.header.shape[1..].to_vec();
        let mut rows = first.header.rows();
        let mut bytes = first.bytes;

        for part in iter {
            if part.header.dtype != dtype || part.header.shape[1..] != trailing[..] {
                return Err(ProtocolError::TensorLengthMismatch {
                    expected: bytes.len(),
                    got: part.bytes.len(),
                });
            }
            rows += part.header.rows();
            bytes.extend_from_slice(&part.bytes);
        }

        let mut shape = vec![rows];
        shape.extend(trailing);
        Tensor::new(dtype, shape, bytes)
    }
}

/// The closed set of pooling options the encoder recognizes. The broker
/// core never interprets this tag; it only carries it through configuration
/// snapshots and worker spawn arguments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PoolingStrategy {
    ReduceMean,
    ReduceMax,
    ReduceMeanMax,
    #[serde(alias = "CLS_TOKEN")]
    FirstToken,
    #[serde(alias = "SEP_TOKEN")]
    LastToken,
    None,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(s: &str) -> ClientAddr {
        ClientAddr::new(s.as_bytes().to_vec()).unwrap()
    }

    fn req(s: &str) -> ReqId {
        ReqId::new(s.as_bytes().to_vec()).unwrap()
    }

    #[test]
    fn job_id_roundtrip() {
        let job = JobId::new(addr("client-1"), req("req-9"));
        let encoded = job.encode();
        assert_eq!(encoded, b"client-1#req-9");
        let parsed = JobId::parse(&encoded).unwrap();
        assert_eq!(parsed, job);
    }

    #[test]
    fn chunk_id_whole_batch_has_no_at_suffix() {
        let job = JobId::new(addr("c"), req("r"));
        let chunk = ChunkId::whole(job.clone());
        assert_eq!(chunk.encode(), b"c#r");
        let parsed = ChunkId::parse(&chunk.encode()).unwrap();
        assert_eq!(parsed.partial_or_zero(), 0);
        assert_eq!(parsed.job, job);
    }

    #[test]
    fn chunk_id_partitioned_roundtrip() {
        let job = JobId::new(addr("c"), req("r"));
        let chunk = ChunkId::part(job.clone(), 8);
        let encoded = chunk.encode();
        assert_eq!(encoded, b"c#r@8");
        let parsed = ChunkId::parse(&encoded).unwrap();
        assert_eq!(parsed.job, job);
        assert_eq!(parsed.partial, Some(8));
    }

    #[test]
    fn reserved_bytes_rejected() {
        assert!(ClientAddr::new(b"has#hash".to_vec()).is_err());
        assert!(ReqId::new(b"has@at".to_vec()).is_err());
    }

    #[test]
    fn tensor_concat_preserves_row_order() {
        let a = Tensor::new(DType::Int32, vec![2, 4], vec![0; 2 * 4 * 4]).unwrap();
        let b = Tensor::new(DType::Int32, vec![1, 4], vec![1; 1 * 4 * 4]).unwrap();
        let combined = Tensor::concat(vec![a, b]).unwrap();
        assert_eq!(combined.header.shape, vec![3, 4]);
        assert_eq!(combined.bytes.len(), 3 * 4 * 4);
    }

    #[test]
    fn tensor_length_mismatch_is_rejected() {
        let err = Tensor::new(DType::Float32, vec![2, 4], vec![0; 10]).unwrap_err();
        assert!(matches!(err, ProtocolError::TensorLengthMismatch { .. }));
    }
}

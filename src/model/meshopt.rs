//! EXT_meshopt_compression
//!
//! gltfpack stores compressed buffer views in one buffer and points the
//! accessors at a second "fallback" buffer that holds no data. Before any
//! accessor is read, each compressed view is decoded into its slot of the
//! fallback buffer.
//!
//! Three stream kinds exist: vertex attributes (byte-lane delta coding in
//! blocks), triangle lists (edge/vertex FIFO coding) and plain index
//! sequences (zigzag varints). Attribute streams may carry a filter that
//! packs normals, rotations or floats into fewer bits.

use serde::Deserialize;
use thiserror::Error;

pub const EXTENSION: &str = "EXT_meshopt_compression";

const VERTEX_HEADER: u8 = 0xa0;
const INDEX_HEADER: u8 = 0xe0;
const SEQUENCE_HEADER: u8 = 0xd0;

const BYTE_GROUP: usize = 16;
const VERTEX_BLOCK_BYTES: usize = 8192;
const VERTEX_BLOCK_MAX: usize = 256;
const VERTEX_TAIL_MIN: usize = 32;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum MeshoptError {
    #[error("unrecognized stream header 0x{0:02x}")]
    Header(u8),
    #[error("compressed stream ends early")]
    Truncated,
    #[error("compressed stream has unused trailing bytes")]
    TrailingData,
    #[error("byte stride {stride} is invalid for {usage}")]
    Stride { stride: usize, usage: &'static str },
    #[error("triangle stream holds {0} indices, not a multiple of 3")]
    TriangleCount(usize),
    #[error("source range {offset}+{length} lies outside buffer {buffer}")]
    SourceRange { buffer: usize, offset: usize, length: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum StreamMode {
    Attributes,
    Triangles,
    Indices,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Filter {
    #[default]
    None,
    Octahedral,
    Quaternion,
    Exponential,
}

/// The extension object on a buffer view
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompressedView {
    pub buffer: usize,
    #[serde(default)]
    pub byte_offset: usize,
    pub byte_length: usize,
    pub byte_stride: usize,
    pub count: usize,
    pub mode: StreamMode,
    #[serde(default)]
    pub filter: Filter,
}

impl CompressedView {
    /// Decode `source` (the bytes at `buffer[byte_offset..][..byte_length]`)
    /// into `count * byte_stride` plain bytes
    pub fn decode(&self, source: &[u8]) -> Result<Vec<u8>, MeshoptError> {
        let stride = self.byte_stride;
        let mut out = match self.mode {
            StreamMode::Attributes => decode_vertex_buffer(source, self.count, stride)?,
            StreamMode::Triangles => index_bytes(&decode_index_buffer(source, self.count)?, stride)?,
            StreamMode::Indices => index_bytes(&decode_index_sequence(source, self.count)?, stride)?,
        };
        match self.filter {
            Filter::None => {}
            Filter::Octahedral => decode_octahedral(&mut out, stride)?,
            Filter::Quaternion => decode_quaternion(&mut out, stride)?,
            Filter::Exponential => decode_exponential(&mut out, stride)?,
        }
        Ok(out)
    }
}

// =============================================================================
// Extension data from the raw document
// =============================================================================

#[derive(Deserialize)]
struct ViewExtensions {
    #[serde(rename = "EXT_meshopt_compression")]
    meshopt: Option<CompressedView>,
}

#[derive(Deserialize)]
struct BufferExtensions {
    #[serde(rename = "EXT_meshopt_compression")]
    meshopt: Option<FallbackMarker>,
}

#[derive(Deserialize)]
struct FallbackMarker {
    #[serde(default)]
    fallback: bool,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawView {
    buffer: usize,
    #[serde(default)]
    byte_offset: usize,
    extensions: Option<ViewExtensions>,
}

#[derive(Deserialize)]
struct RawBuffer {
    extensions: Option<BufferExtensions>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawDocument {
    #[serde(default)]
    buffers: Vec<RawBuffer>,
    #[serde(default)]
    buffer_views: Vec<RawView>,
}

/// Where one compressed view decodes to
#[derive(Debug, Clone, PartialEq)]
pub struct ViewTarget {
    pub view: usize,
    pub buffer: usize,
    pub byte_offset: usize,
    pub compressed: CompressedView,
}

/// Every use of the extension in one document
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Compression {
    pub views: Vec<ViewTarget>,
    pub fallback_buffers: Vec<usize>,
}

impl Compression {
    /// Collect the extension objects from glTF JSON text
    pub fn from_json(json: &[u8]) -> Result<Self, serde_json::Error> {
        let raw: RawDocument = serde_json::from_slice(json)?;
        let views = raw
            .buffer_views
            .into_iter()
            .enumerate()
            .filter_map(|(view, raw)| {
                let compressed = raw.extensions?.meshopt?;
                Some(ViewTarget {
                    view,
                    buffer: raw.buffer,
                    byte_offset: raw.byte_offset,
                    compressed,
                })
            })
            .collect();
        let fallback_buffers = raw
            .buffers
            .iter()
            .enumerate()
            .filter(|(_, b)| {
                b.extensions
                    .as_ref()
                    .and_then(|e| e.meshopt.as_ref())
                    .is_some_and(|m| m.fallback)
            })
            .map(|(i, _)| i)
            .collect();
        Ok(Self { views, fallback_buffers })
    }

    pub fn is_fallback(&self, buffer: usize) -> bool {
        self.fallback_buffers.contains(&buffer)
    }
}

// =============================================================================
// Vertex attribute streams
// =============================================================================

fn unzigzag8(v: u8) -> u8 {
    0u8.wrapping_sub(v & 1) ^ (v >> 1)
}

fn unzigzag32(v: u32) -> u32 {
    (v >> 1) ^ (v & 1).wrapping_neg()
}

fn vertex_block_size(stride: usize) -> usize {
    ((VERTEX_BLOCK_BYTES / stride) & !(BYTE_GROUP - 1)).min(VERTEX_BLOCK_MAX)
}

/// One group of 16 lane bytes. `mode` picks 0 bits (all zero), 2 or 4 bits
/// with an all-ones escape to a following literal byte, or 16 raw bytes.
fn decode_byte_group(data: &[u8], pos: usize, group: &mut [u8], mode: u8) -> Result<usize, MeshoptError> {
    match mode {
        0 => {
            group.fill(0);
            Ok(pos)
        }
        3 => {
            let raw = data.get(pos..pos + BYTE_GROUP).ok_or(MeshoptError::Truncated)?;
            group.copy_from_slice(raw);
            Ok(pos + BYTE_GROUP)
        }
        _ => {
            let bits: usize = if mode == 1 { 2 } else { 4 };
            let per_byte = 8 / bits;
            let packed_len = BYTE_GROUP / per_byte;
            let packed = data.get(pos..pos + packed_len).ok_or(MeshoptError::Truncated)?;
            let escape = (1u8 << bits) - 1;
            let mut extra = pos + packed_len;
            for (i, slot) in group.iter_mut().enumerate() {
                // Most significant bits first
                let shift = 8 - bits * (i % per_byte + 1);
                let v = (packed[i / per_byte] >> shift) & escape;
                *slot = if v == escape {
                    let literal = *data.get(extra).ok_or(MeshoptError::Truncated)?;
                    extra += 1;
                    literal
                } else {
                    v
                };
            }
            Ok(extra)
        }
    }
}

/// One byte lane of a block: 2-bit group modes, then the groups
fn decode_lane(data: &[u8], mut pos: usize, lane: &mut [u8]) -> Result<usize, MeshoptError> {
    let groups = lane.len() / BYTE_GROUP;
    let header_len = groups.div_ceil(4);
    let header = data.get(pos..pos + header_len).ok_or(MeshoptError::Truncated)?;
    pos += header_len;
    for (g, group) in lane.chunks_exact_mut(BYTE_GROUP).enumerate() {
        let mode = (header[g / 4] >> ((g % 4) * 2)) & 3;
        pos = decode_byte_group(data, pos, group, mode)?;
    }
    Ok(pos)
}

pub fn decode_vertex_buffer(data: &[u8], count: usize, stride: usize) -> Result<Vec<u8>, MeshoptError> {
    if stride == 0 || stride > 256 || stride % 4 != 0 {
        return Err(MeshoptError::Stride { stride, usage: "attributes" });
    }
    let header = *data.first().ok_or(MeshoptError::Truncated)?;
    if data.len() < 1 + stride {
        return Err(MeshoptError::Truncated);
    }
    if header & 0xf0 != VERTEX_HEADER || header & 0x0f > 0 {
        return Err(MeshoptError::Header(header));
    }

    // Deltas of the first vertex are taken against the stream's tail
    let mut last = data[data.len() - stride..].to_vec();
    let mut out = vec![0u8; count * stride];
    let mut lane = [0u8; VERTEX_BLOCK_MAX];
    let block = vertex_block_size(stride);
    let mut pos = 1;

    let mut start = 0;
    while start < count {
        let n = block.min(count - start);
        let aligned = n.next_multiple_of(BYTE_GROUP);
        for (k, prev) in last.iter_mut().enumerate() {
            pos = decode_lane(data, pos, &mut lane[..aligned])?;
            let mut p = *prev;
            for (i, &delta) in lane[..n].iter().enumerate() {
                p = unzigzag8(delta).wrapping_add(p);
                out[(start + i) * stride + k] = p;
            }
            *prev = p;
        }
        start += n;
    }

    if data.len().checked_sub(pos) != Some(stride.max(VERTEX_TAIL_MIN)) {
        return Err(MeshoptError::TrailingData);
    }
    Ok(out)
}

// =============================================================================
// Index streams
// =============================================================================

fn read_varint(data: &[u8], pos: &mut usize) -> Result<u32, MeshoptError> {
    let mut next = || {
        let b = *data.get(*pos).ok_or(MeshoptError::Truncated)?;
        *pos += 1;
        Ok::<u8, MeshoptError>(b)
    };
    let lead = next()?;
    if lead < 128 {
        return Ok(lead as u32);
    }
    let mut result = (lead & 127) as u32;
    let mut shift = 7;
    for _ in 0..4 {
        let group = next()?;
        result |= ((group & 127) as u32) << shift;
        shift += 7;
        if group < 128 {
            break;
        }
    }
    Ok(result)
}

fn read_delta_index(data: &[u8], pos: &mut usize, last: u32) -> Result<u32, MeshoptError> {
    Ok(last.wrapping_add(unzigzag32(read_varint(data, pos)?)))
}

/// Recently seen edges and vertices, both 16-entry rings
struct Fifos {
    edges: [[u32; 2]; 16],
    edge_at: usize,
    vertices: [u32; 16],
    vertex_at: usize,
}

impl Fifos {
    fn new() -> Self {
        Self {
            edges: [[u32::MAX; 2]; 16],
            edge_at: 0,
            vertices: [u32::MAX; 16],
            vertex_at: 0,
        }
    }

    fn edge(&self, back: usize) -> (u32, u32) {
        let [a, b] = self.edges[self.edge_at.wrapping_sub(1 + back) & 15];
        (a, b)
    }

    /// `distance` counts from the slot just written (1 = newest)
    fn vertex(&self, distance: usize) -> u32 {
        self.vertices[self.vertex_at.wrapping_sub(distance) & 15]
    }

    fn push_vertex(&mut self, v: u32, advance: bool) {
        self.vertices[self.vertex_at] = v;
        if advance {
            self.vertex_at = (self.vertex_at + 1) & 15;
        }
    }

    fn push_edge(&mut self, a: u32, b: u32) {
        self.edges[self.edge_at] = [a, b];
        self.edge_at = (self.edge_at + 1) & 15;
    }
}

/// Triangle list stream (versions 0 and 1)
pub fn decode_index_buffer(data: &[u8], count: usize) -> Result<Vec<u32>, MeshoptError> {
    if count % 3 != 0 {
        return Err(MeshoptError::TriangleCount(count));
    }
    let triangles = count / 3;
    // Header, one code per triangle, and the 16-byte aux table at the end
    if data.len() < 1 + triangles + 16 {
        return Err(MeshoptError::Truncated);
    }
    let header = data[0];
    let version = header & 0x0f;
    if header & 0xf0 != INDEX_HEADER || version > 1 {
        return Err(MeshoptError::Header(header));
    }

    let codes = &data[1..1 + triangles];
    let data_end = data.len() - 16;
    let aux_table = &data[data_end..];
    let fec_max = if version >= 1 { 13 } else { 15 };

    let mut fifo = Fifos::new();
    let mut next = 0u32;
    let mut last = 0u32;
    let mut pos = 1 + triangles;
    let mut out = Vec::with_capacity(count);

    for &code in codes {
        if pos > data_end {
            return Err(MeshoptError::Truncated);
        }
        if code < 0xf0 {
            // Reuse an edge, third vertex new, cached or explicit
            let (a, b) = fifo.edge((code >> 4) as usize);
            let fec = (code & 15) as usize;
            let c = if fec < fec_max {
                let c = if fec == 0 { next } else { fifo.vertex(1 + fec) };
                if fec == 0 {
                    next += 1;
                }
                fifo.push_vertex(c, fec == 0);
                c
            } else {
                last = match fec {
                    13 => last.wrapping_sub(1),
                    14 => last.wrapping_add(1),
                    _ => read_delta_index(data, &mut pos, last)?,
                };
                fifo.push_vertex(last, true);
                last
            };
            out.extend_from_slice(&[a, b, c]);
            fifo.push_edge(c, b);
            fifo.push_edge(a, c);
        } else {
            // Fresh triangle: vertex sources from the aux table or a full byte
            let (fea, aux) = if code < 0xfe {
                (0, aux_table[(code & 15) as usize])
            } else {
                let aux = *data.get(pos).ok_or(MeshoptError::Truncated)?;
                pos += 1;
                if aux == 0 {
                    next = 0;
                }
                (if code == 0xfe { 0 } else { 15 }, aux)
            };
            let feb = (aux >> 4) as usize;
            let fec = (aux & 15) as usize;

            let mut take = |fe: usize| {
                if fe == 0 {
                    next += 1;
                    next - 1
                } else if fe == 15 {
                    0
                } else {
                    fifo.vertex(fe)
                }
            };
            let mut a = take(fea);
            let mut b = take(feb);
            let mut c = take(fec);
            for (fe, v) in [(fea, &mut a), (feb, &mut b), (fec, &mut c)] {
                if fe == 15 {
                    last = read_delta_index(data, &mut pos, last)?;
                    *v = last;
                }
            }

            out.extend_from_slice(&[a, b, c]);
            fifo.push_vertex(a, true);
            fifo.push_vertex(b, feb == 0 || feb == 15);
            fifo.push_vertex(c, fec == 0 || fec == 15);
            fifo.push_edge(b, a);
            fifo.push_edge(c, b);
            fifo.push_edge(a, c);
        }
    }

    if pos != data_end {
        return Err(MeshoptError::TrailingData);
    }
    Ok(out)
}

/// Index sequence stream: varint deltas against one of two baselines
pub fn decode_index_sequence(data: &[u8], count: usize) -> Result<Vec<u32>, MeshoptError> {
    if data.len() < 1 + count + 4 {
        return Err(MeshoptError::Truncated);
    }
    let header = data[0];
    if header & 0xf0 != SEQUENCE_HEADER || header & 0x0f > 1 {
        return Err(MeshoptError::Header(header));
    }

    let data_end = data.len() - 4;
    let mut baselines = [0u32; 2];
    let mut pos = 1;
    let mut out = Vec::with_capacity(count);
    for _ in 0..count {
        if pos >= data_end {
            return Err(MeshoptError::Truncated);
        }
        let v = read_varint(data, &mut pos)?;
        let slot = (v & 1) as usize;
        let index = baselines[slot].wrapping_add(unzigzag32(v >> 1));
        baselines[slot] = index;
        out.push(index);
    }
    if pos != data_end {
        return Err(MeshoptError::TrailingData);
    }
    Ok(out)
}

fn index_bytes(indices: &[u32], stride: usize) -> Result<Vec<u8>, MeshoptError> {
    match stride {
        2 => Ok(indices.iter().flat_map(|&i| (i as u16).to_le_bytes()).collect()),
        4 => Ok(indices.iter().flat_map(|&i| i.to_le_bytes()).collect()),
        _ => Err(MeshoptError::Stride { stride, usage: "indices" }),
    }
}

// =============================================================================
// Filters
// =============================================================================

fn round_signed(v: f32) -> i32 {
    (v + if v >= 0.0 { 0.5 } else { -0.5 }) as i32
}

/// Octahedral xy with z carrying the unit length, back to a unit vector
fn octahedral(x: f32, y: f32, one: f32, max: f32) -> [i32; 3] {
    let z = one - x.abs() - y.abs();
    let t = z.min(0.0);
    let x = x + if x >= 0.0 { t } else { -t };
    let y = y + if y >= 0.0 { t } else { -t };
    let s = max / (x * x + y * y + z * z).sqrt();
    [round_signed(x * s), round_signed(y * s), round_signed(z * s)]
}

fn decode_octahedral(data: &mut [u8], stride: usize) -> Result<(), MeshoptError> {
    match stride {
        4 => {
            for v in data.chunks_exact_mut(4) {
                let [x, y, z] = [v[0], v[1], v[2]].map(|b| b as i8 as f32);
                let n = octahedral(x, y, z, 127.0);
                for (dst, c) in v.iter_mut().zip(n) {
                    *dst = c as i8 as u8;
                }
            }
        }
        8 => {
            for v in data.chunks_exact_mut(8) {
                let c = |i: usize| i16::from_le_bytes([v[i * 2], v[i * 2 + 1]]) as f32;
                let n = octahedral(c(0), c(1), c(2), 32767.0);
                for (i, c) in n.into_iter().enumerate() {
                    v[i * 2..i * 2 + 2].copy_from_slice(&(c as i16).to_le_bytes());
                }
            }
        }
        _ => return Err(MeshoptError::Stride { stride, usage: "octahedral filter" }),
    }
    Ok(())
}

/// Three smallest components plus the index of the dropped largest one,
/// which is stored in the low two bits of the fourth
fn decode_quaternion(data: &mut [u8], stride: usize) -> Result<(), MeshoptError> {
    if stride != 8 {
        return Err(MeshoptError::Stride { stride, usage: "quaternion filter" });
    }
    for v in data.chunks_exact_mut(8) {
        let c: [i16; 4] = std::array::from_fn(|i| i16::from_le_bytes([v[i * 2], v[i * 2 + 1]]));
        let scale = std::f32::consts::FRAC_1_SQRT_2 / (c[3] | 3) as f32;
        let x = c[0] as f32 * scale;
        let y = c[1] as f32 * scale;
        let z = c[2] as f32 * scale;
        let w = (1.0 - x * x - y * y - z * z).max(0.0).sqrt();

        let largest = (c[3] & 3) as usize;
        let mut put = |slot: usize, value: i32| {
            let at = (largest + slot) & 3;
            v[at * 2..at * 2 + 2].copy_from_slice(&(value as i16).to_le_bytes());
        };
        put(1, round_signed(x * 32767.0));
        put(2, round_signed(y * 32767.0));
        put(3, round_signed(z * 32767.0));
        put(0, (w * 32767.0 + 0.5) as i32);
    }
    Ok(())
}

/// 24-bit signed mantissa with an 8-bit signed exponent, per 32-bit word
fn decode_exponential(data: &mut [u8], stride: usize) -> Result<(), MeshoptError> {
    if stride % 4 != 0 {
        return Err(MeshoptError::Stride { stride, usage: "exponential filter" });
    }
    for word in data.chunks_exact_mut(4) {
        let v = u32::from_le_bytes([word[0], word[1], word[2], word[3]]);
        let mantissa = ((v << 8) as i32) >> 8;
        let exponent = (v as i32) >> 24;
        let value = f32::from_bits((exponent.wrapping_add(127) as u32) << 23) * mantissa as f32;
        word.copy_from_slice(&value.to_le_bytes());
    }
    Ok(())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Two 4-byte vertices (1,2,3,4) and (1,2,3,8), one lane per group mode
    pub(crate) fn two_vertex_stream() -> Vec<u8> {
        let mut s = vec![VERTEX_HEADER];
        // lane 0, 2-bit: deltas 1, 0
        s.extend_from_slice(&[0x01, 0x80, 0, 0, 0]);
        // lane 1, 4-bit: deltas 2, 0
        s.extend_from_slice(&[0x02, 0x40, 0, 0, 0, 0, 0, 0, 0]);
        // lane 2, 2-bit with an escaped literal: deltas 3, 0
        s.extend_from_slice(&[0x01, 0xc0, 0, 0, 0, 0x06]);
        // lane 3, raw bytes: deltas 4, 4
        s.push(0x03);
        let mut raw = [0u8; 16];
        raw[0] = 8;
        raw[1] = 8;
        s.extend_from_slice(&raw);
        s.extend_from_slice(&[0u8; 32]);
        s
    }

    /// Three vertices of 12 bytes, every one the float normal (0, 0, 1)
    pub(crate) fn unit_z_normals_stream() -> Vec<u8> {
        let mut s = vec![VERTEX_HEADER];
        s.extend_from_slice(&[0u8; 10]); // lanes 0..10 are all zero
        for first in [255u8, 126] {
            // 0x80 and 0x3f zigzagged, then no change
            s.push(0x03);
            let mut raw = [0u8; 16];
            raw[0] = first;
            s.extend_from_slice(&raw);
        }
        s.extend_from_slice(&[0u8; 32]);
        s
    }

    /// Triangles (0, 1, 2) then (2, 1, 7): one aux-table triangle, then an
    /// edge reuse with an explicit third index
    pub(crate) fn two_triangle_stream() -> Vec<u8> {
        let mut s = vec![INDEX_HEADER | 1, 0xf0, 0x1f, 0x0e];
        s.extend_from_slice(&[0u8; 16]);
        s
    }

    #[test]
    fn test_unzigzag() {
        assert_eq!(unzigzag8(0), 0);
        assert_eq!(unzigzag8(1), 255);
        assert_eq!(unzigzag8(2), 1);
        assert_eq!(unzigzag8(255), 0x80);
        assert_eq!(unzigzag32(3), u32::MAX - 1);
    }

    #[test]
    fn test_vertex_stream_decodes_every_group_mode() {
        let out = decode_vertex_buffer(&two_vertex_stream(), 2, 4).unwrap();
        assert_eq!(out, vec![1, 2, 3, 4, 1, 2, 3, 8]);
    }

    #[test]
    fn test_vertex_stream_rejects_bad_input() {
        let mut stream = two_vertex_stream();
        assert_eq!(decode_vertex_buffer(&stream, 2, 6), Err(MeshoptError::Stride { stride: 6, usage: "attributes" }));
        stream.push(0);
        assert_eq!(decode_vertex_buffer(&stream, 2, 4), Err(MeshoptError::TrailingData));
        stream[0] = 0xa1;
        assert_eq!(decode_vertex_buffer(&stream, 2, 4), Err(MeshoptError::Header(0xa1)));
        assert_eq!(decode_vertex_buffer(&[VERTEX_HEADER, 0x03], 1, 4), Err(MeshoptError::Truncated));
    }

    #[test]
    fn test_float_normals_stream() {
        let out = decode_vertex_buffer(&unit_z_normals_stream(), 3, 12).unwrap();
        let floats: Vec<f32> = out.chunks_exact(4).map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]])).collect();
        assert_eq!(floats, vec![0.0, 0.0, 1.0, 0.0, 0.0, 1.0, 0.0, 0.0, 1.0]);
    }

    #[test]
    fn test_triangle_stream() {
        assert_eq!(decode_index_buffer(&two_triangle_stream(), 6).unwrap(), vec![0, 1, 2, 2, 1, 7]);
        assert_eq!(decode_index_buffer(&two_triangle_stream(), 4), Err(MeshoptError::TriangleCount(4)));

        let mut unused = two_triangle_stream();
        unused.insert(4, 0);
        assert_eq!(decode_index_buffer(&unused, 6), Err(MeshoptError::TrailingData));
    }

    #[test]
    fn test_triangle_stream_version_zero_reads_cached_vertex() {
        // Second triangle reuses edge (2, 1) and the oldest cached vertex (0)
        let mut s = vec![INDEX_HEADER, 0xf0, 0x12];
        s.extend_from_slice(&[0u8; 16]);
        assert_eq!(decode_index_buffer(&s, 6).unwrap(), vec![0, 1, 2, 2, 1, 0]);
    }

    #[test]
    fn test_index_sequence_stream() {
        let s = [SEQUENCE_HEADER | 1, 20, 4, 6, 0, 0, 0, 0];
        assert_eq!(decode_index_sequence(&s, 3).unwrap(), vec![5, 6, 4]);

        // 300 needs a two-byte varint
        let s = [SEQUENCE_HEADER, 176, 9, 0, 0, 0, 0];
        assert_eq!(decode_index_sequence(&s, 1).unwrap(), vec![300]);
    }

    #[test]
    fn test_index_bytes_follow_stride() {
        assert_eq!(index_bytes(&[1, 258], 2).unwrap(), vec![1, 0, 2, 1]);
        assert_eq!(index_bytes(&[1], 4).unwrap(), vec![1, 0, 0, 0]);
        assert!(index_bytes(&[1], 3).is_err());
    }

    #[test]
    fn test_octahedral_filter() {
        let mut data = vec![0, 0, 127, 9, 127, 0, 127, 9];
        decode_octahedral(&mut data, 4).unwrap();
        assert_eq!(data, vec![0, 0, 127, 9, 127, 0, 0, 9]);
    }

    #[test]
    fn test_quaternion_filter_restores_largest_component() {
        // Largest component is x (index 0), the rest are zero
        let mut data = Vec::new();
        for c in [0i16, 0, 0, 32764] {
            data.extend_from_slice(&c.to_le_bytes());
        }
        decode_quaternion(&mut data, 8).unwrap();
        let q: Vec<i16> = data.chunks_exact(2).map(|b| i16::from_le_bytes([b[0], b[1]])).collect();
        assert_eq!(q, vec![32767, 0, 0, 0]);
    }

    #[test]
    fn test_exponential_filter() {
        let mut data = Vec::new();
        data.extend_from_slice(&0xff00_0003u32.to_le_bytes()); // 3 * 2^-1
        data.extend_from_slice(&0x02ff_fffeu32.to_le_bytes()); // -2 * 2^2
        decode_exponential(&mut data, 8).unwrap();
        let f: Vec<f32> = data.chunks_exact(4).map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]])).collect();
        assert_eq!(f, vec![1.5, -8.0]);
    }

    #[test]
    fn test_extension_objects_from_json() {
        let json = br#"{
            "buffers": [
                { "byteLength": 64 },
                { "byteLength": 48, "extensions": { "EXT_meshopt_compression": { "fallback": true } } }
            ],
            "bufferViews": [
                { "buffer": 0, "byteLength": 12 },
                { "buffer": 1, "byteOffset": 36, "byteLength": 6,
                  "extensions": { "EXT_meshopt_compression": {
                      "buffer": 0, "byteOffset": 12, "byteLength": 20,
                      "byteStride": 2, "count": 3, "mode": "TRIANGLES" } } }
            ]
        }"#;
        let compression = Compression::from_json(json).unwrap();
        assert!(compression.is_fallback(1));
        assert!(!compression.is_fallback(0));
        assert_eq!(compression.views.len(), 1);
        let target = &compression.views[0];
        assert_eq!((target.view, target.buffer, target.byte_offset), (1, 1, 36));
        assert_eq!(target.compressed.mode, StreamMode::Triangles);
        assert_eq!(target.compressed.filter, Filter::None);
        assert_eq!(target.compressed.byte_offset, 12);
    }
}

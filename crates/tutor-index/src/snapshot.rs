//! In-memory snapshot plus the on-disk codecs for its two files.
//!
//! `vectors.bin` is a little-endian header (`TVEC`, format version, row count
//! as u64, dimension as u32) followed by `rows * dim` f32 values. `meta.jsonl`
//! holds one `{"source", "chunk", "text"}` object per row, in row order.

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{BufRead, Read, Write};

use tutor_core::types::Chunk;
use tutor_core::{Error, Result};

pub const VECTORS_FILE: &str = "vectors.bin";
pub const META_FILE: &str = "meta.jsonl";

const MAGIC: &[u8; 4] = b"TVEC";
const FORMAT_VERSION: u32 = 1;

/// Unit-normalized vectors (row-major) and the chunk behind each row.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    dim: usize,
    data: Vec<f32>,
    meta: Vec<Chunk>,
}

impl Snapshot {
    /// Rows must all have length `dim` and match `meta` one to one.
    pub fn new(dim: usize, rows: Vec<Vec<f32>>, meta: Vec<Chunk>) -> Result<Self> {
        if rows.len() != meta.len() {
            return Err(Error::CorruptSnapshot(format!("{} vectors for {} metadata rows", rows.len(), meta.len())));
        }
        if let Some(bad) = rows.iter().position(|r| r.len() != dim) {
            return Err(Error::CorruptSnapshot(format!("row {bad} has dimension {}, expected {dim}", rows[bad].len())));
        }
        let data = rows.into_iter().flatten().collect();
        Ok(Self { dim, data, meta })
    }

    pub fn dim(&self) -> usize { self.dim }
    pub fn len(&self) -> usize { self.meta.len() }
    pub fn is_empty(&self) -> bool { self.meta.is_empty() }
    pub fn meta(&self) -> &[Chunk] { &self.meta }

    pub fn row(&self, i: usize) -> &[f32] { &self.data[i * self.dim..(i + 1) * self.dim] }

    pub fn rows(&self) -> impl Iterator<Item = (&[f32], &Chunk)> {
        self.data.chunks_exact(self.dim.max(1)).zip(self.meta.iter())
    }

    pub fn write_vectors<W: Write>(&self, w: &mut W) -> Result<()> {
        w.write_all(MAGIC)?;
        w.write_u32::<LittleEndian>(FORMAT_VERSION)?;
        w.write_u64::<LittleEndian>(self.len() as u64)?;
        w.write_u32::<LittleEndian>(self.dim as u32)?;
        for x in &self.data { w.write_f32::<LittleEndian>(*x)?; }
        Ok(())
    }

    pub fn write_meta<W: Write>(&self, w: &mut W) -> Result<()> {
        for chunk in &self.meta {
            serde_json::to_writer(&mut *w, chunk)?;
            w.write_all(b"\n")?;
        }
        Ok(())
    }

    /// Decode both files and check that they describe the same rows.
    pub fn read<R: Read, M: BufRead>(vectors: &mut R, meta: M) -> Result<Self> { Self::decode(vectors, meta, None) }

    /// Like [`Snapshot::read`], but the vectors header must announce `rows`
    /// rows of `dim` values before anything is allocated for them. The
    /// dimension of an empty snapshot is not checked.
    pub fn read_expecting<R: Read, M: BufRead>(vectors: &mut R, meta: M, rows: usize, dim: usize) -> Result<Self> {
        Self::decode(vectors, meta, Some((rows, dim)))
    }

    fn decode<R: Read, M: BufRead>(vectors: &mut R, meta: M, expected: Option<(usize, usize)>) -> Result<Self> {
        let (dim, rows) = read_vectors(vectors, expected)?;
        let meta = read_meta(meta)?;
        Snapshot::new(dim, rows, meta)
    }
}

fn read_vectors<R: Read>(r: &mut R, expected: Option<(usize, usize)>) -> Result<(usize, Vec<Vec<f32>>)> {
    let corrupt = |what: &str, e: std::io::Error| Error::CorruptSnapshot(format!("{VECTORS_FILE}: {what}: {e}"));
    let mut magic = [0u8; 4];
    r.read_exact(&mut magic).map_err(|e| corrupt("header", e))?;
    if &magic != MAGIC { return Err(Error::CorruptSnapshot(format!("{VECTORS_FILE}: bad magic"))); }
    let version = r.read_u32::<LittleEndian>().map_err(|e| corrupt("header", e))?;
    if version != FORMAT_VERSION { return Err(Error::CorruptSnapshot(format!("{VECTORS_FILE}: unsupported version {version}"))); }
    let rows = r.read_u64::<LittleEndian>().map_err(|e| corrupt("header", e))? as usize;
    let dim = r.read_u32::<LittleEndian>().map_err(|e| corrupt("header", e))? as usize;
    if let Some((want_rows, want_dim)) = expected {
        if rows != want_rows || (rows > 0 && dim != want_dim) {
            return Err(Error::CorruptSnapshot(format!("{VECTORS_FILE}: header says {rows}x{dim}, expected {want_rows}x{want_dim}")));
        }
    }
    if rows > 0 && dim == 0 { return Err(Error::CorruptSnapshot(format!("{VECTORS_FILE}: {rows} rows of dimension 0"))); }
    // capacity grows with the bytes actually read, so a lying header fails as truncated
    let mut out = Vec::with_capacity(rows.min(1 << 16));
    for _ in 0..rows {
        let mut row = Vec::with_capacity(dim.min(1 << 12));
        for _ in 0..dim {
            row.push(r.read_f32::<LittleEndian>().map_err(|e| corrupt("truncated rows", e))?);
        }
        out.push(row);
    }
    let mut trailing = [0u8; 1];
    if r.read(&mut trailing)? != 0 { return Err(Error::CorruptSnapshot(format!("{VECTORS_FILE}: trailing bytes"))); }
    Ok((dim, out))
}

fn read_meta<M: BufRead>(meta: M) -> Result<Vec<Chunk>> {
    let mut out = Vec::new();
    for (n, line) in meta.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() { continue; }
        let chunk: Chunk = serde_json::from_str(&line).map_err(|e| Error::CorruptSnapshot(format!("{META_FILE} line {}: {e}", n + 1)))?;
        out.push(chunk);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn chunk(source: &str, ordinal: usize, text: &str) -> Chunk { Chunk { source: source.into(), ordinal, text: text.into() } }

    #[test]
    fn mismatched_lengths_are_rejected() {
        let err = Snapshot::new(2, vec![vec![1.0, 0.0]], vec![]).unwrap_err();
        assert!(matches!(err, Error::CorruptSnapshot(_)));
        let err = Snapshot::new(2, vec![vec![1.0]], vec![chunk("a", 0, "x")]).unwrap_err();
        assert!(matches!(err, Error::CorruptSnapshot(_)));
    }

    #[test]
    fn files_decode_to_the_same_snapshot() {
        let snap = Snapshot::new(2, vec![vec![1.0, 0.0], vec![0.0, 1.0]], vec![chunk("a.md", 0, "one"), chunk("a.md", 1, "two")]).unwrap();
        let (mut v, mut m) = (Vec::new(), Vec::new());
        snap.write_vectors(&mut v).unwrap();
        snap.write_meta(&mut m).unwrap();
        assert_eq!(v.len(), 4 + 4 + 8 + 4 + 4 * 4);
        assert_eq!(String::from_utf8(m.clone()).unwrap().lines().next().unwrap(), r#"{"source":"a.md","chunk":0,"text":"one"}"#);
        let back = Snapshot::read(&mut Cursor::new(v), Cursor::new(m)).unwrap();
        assert_eq!(back, snap);
        assert_eq!(back.row(1), &[0.0, 1.0]);
    }

    #[test]
    fn header_shape_is_checked_before_reading_rows() {
        let snap = Snapshot::new(2, vec![vec![1.0, 0.0]], vec![chunk("a", 0, "x")]).unwrap();
        let mut v = Vec::new();
        snap.write_vectors(&mut v).unwrap();
        v[16..20].copy_from_slice(&u32::MAX.to_le_bytes());
        let mut m = Vec::new();
        snap.write_meta(&mut m).unwrap();

        let err = Snapshot::read_expecting(&mut Cursor::new(v.clone()), Cursor::new(m.clone()), 1, 2).unwrap_err();
        assert!(matches!(&err, Error::CorruptSnapshot(msg) if msg.contains("expected 1x2")), "{err}");
        assert!(matches!(Snapshot::read(&mut Cursor::new(v), Cursor::new(m)), Err(Error::CorruptSnapshot(_))));
    }

    #[test]
    fn truncated_vectors_are_corrupt() {
        let snap = Snapshot::new(3, vec![vec![1.0, 0.0, 0.0]], vec![chunk("a", 0, "x")]).unwrap();
        let mut v = Vec::new();
        snap.write_vectors(&mut v).unwrap();
        v.truncate(v.len() - 2);
        let mut m = Vec::new();
        snap.write_meta(&mut m).unwrap();
        assert!(matches!(Snapshot::read(&mut Cursor::new(v), Cursor::new(m)), Err(Error::CorruptSnapshot(_))));
    }
}

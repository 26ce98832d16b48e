use std::fmt;
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use memmap2::{Mmap, MmapMut};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::StoreError;
use crate::util::field_catalogue::{decode_complex, decode_integer};
use crate::util::{Chunk, ChunkLayout, ComplexExtended, Field, FieldCatalogue, FieldKind, PixelData};

const INDEX_MAGIC: &[u8; 4] = b"DZIX";
const INDEX_VERSION: u32 = 1;
const INDEX_HEADER: usize = 16;
const INDEX_RECORD: usize = 64;

const MANIFEST_FILE: &str = "manifest.json";
const MASK_FILE: &str = "mask.bin";
const INDEX_FILE: &str = "index.bin";
const INDEX_PARTIAL_FILE: &str = "index.bin.partial";

/// Pixels of the image a run computes.
#[derive(Clone)]
pub enum Subset {
    All,
    Predicate(Arc<dyn Fn(usize, usize) -> bool + Send + Sync>),
}

impl Subset {
    pub fn predicate<F>(predicate: F) -> Subset
        where F: Fn(usize, usize) -> bool + Send + Sync + 'static {
        Subset::Predicate(Arc::new(predicate))
    }

    #[inline]
    pub fn contains(&self, image_x: usize, image_y: usize) -> bool {
        match self {
            Subset::All => true,
            Subset::Predicate(predicate) => predicate(image_x, image_y),
        }
    }
}

impl Default for Subset {
    fn default() -> Self {
        Subset::All
    }
}

impl fmt::Debug for Subset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Subset::All => write!(f, "Subset::All"),
            Subset::Predicate(_) => write!(f, "Subset::Predicate(..)"),
        }
    }
}

/// Location of one chunk inside the mask and field files. The stored range counts
/// computed pixels, the mask range covers every pixel of the tile.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct ChunkRecord {
    pub chunk: Chunk,
    pub mask_begin: usize,
    pub stored_begin: usize,
    pub stored_end: usize,
}

impl ChunkRecord {
    #[inline]
    pub fn stored_count(&self) -> usize {
        self.stored_end - self.stored_begin
    }

    fn encode(&self, output: &mut Vec<u8>) {
        let values = [
            self.chunk.rank,
            self.chunk.x,
            self.chunk.y,
            self.chunk.width,
            self.chunk.height,
            self.mask_begin,
            self.stored_begin,
            self.stored_end
        ];

        for value in values.iter() {
            output.extend_from_slice(&(*value as u64).to_le_bytes());
        }
    }

    fn decode(input: &[u8]) -> ChunkRecord {
        let value = |i: usize| {
            let mut bytes = [0u8; 8];
            bytes.copy_from_slice(&input[8 * i..8 * i + 8]);
            u64::from_le_bytes(bytes) as usize
        };

        ChunkRecord {
            chunk: Chunk {
                rank: value(0),
                x: value(1),
                y: value(2),
                width: value(3),
                height: value(4)
            },
            mask_begin: value(5),
            stored_begin: value(6),
            stored_end: value(7)
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Manifest {
    pub run_name: String,
    pub settings: serde_json::Value,
    pub layout: ChunkLayout,
    pub catalogue: FieldCatalogue,
    pub stored_pixels: usize,
    pub references: usize,
}

struct MappedFile {
    map: MmapMut,
    length: usize,
}

impl MappedFile {
    // Zero length maps are not allowed, empty fields keep one unused byte
    fn create(path: &Path, length: usize) -> Result<MappedFile, StoreError> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)
            .map_err(|e| StoreError::io(path, e))?;

        file.set_len(length.max(1) as u64).map_err(|e| StoreError::io(path, e))?;

        let map = unsafe { MmapMut::map_mut(&file) }.map_err(|e| StoreError::io(path, e))?;

        Ok(MappedFile {
            map,
            length
        })
    }

    #[inline]
    fn bytes(&self) -> &[u8] {
        &self.map[..self.length]
    }
}

/// Output of a run while it is being computed.
pub struct ResultStore {
    directory: PathBuf,
    run_name: String,
    settings: serde_json::Value,
    layout: ChunkLayout,
    catalogue: FieldCatalogue,
    records: Vec<ChunkRecord>,
    mask: MappedFile,
    fields: Vec<(Field, MappedFile)>,
}

impl ResultStore {
    /// Lays out the run directory for the given subset. Any index left by an earlier
    /// run of the same name is removed first, so readers never attach to a mix.
    pub fn create(root: &Path,
                  run_name: &str,
                  layout: ChunkLayout,
                  catalogue: FieldCatalogue,
                  subset: &Subset,
                  settings: serde_json::Value) -> Result<ResultStore, StoreError> {
        let directory = root.join(run_name);
        fs::create_dir_all(&directory).map_err(|e| StoreError::io(&directory, e))?;

        for stale in &[INDEX_FILE, INDEX_PARTIAL_FILE] {
            let path = directory.join(stale);

            if path.exists() {
                fs::remove_file(&path).map_err(|e| StoreError::io(&path, e))?;
            }
        }

        let mut mask = MappedFile::create(&directory.join(MASK_FILE), layout.pixel_count())?;
        let mut records = Vec::with_capacity(layout.len());

        let mut mask_begin = 0;
        let mut stored = 0;

        for chunk in layout.chunks() {
            let stored_begin = stored;

            for (local, (i, j)) in chunk.pixels().enumerate() {
                let selected = subset.contains(i, j);
                mask.map[mask_begin + local] = selected as u8;
                stored += selected as usize;
            }

            records.push(ChunkRecord {
                chunk,
                mask_begin,
                stored_begin,
                stored_end: stored
            });

            mask_begin += chunk.pixel_count();
        }

        let mut fields = Vec::with_capacity(catalogue.fields().len());

        for field in catalogue.fields() {
            let path = directory.join(field.file_name());
            fields.push((*field, MappedFile::create(&path, stored * field.kind().size())?));
        }

        let store = ResultStore {
            directory,
            run_name: run_name.to_owned(),
            settings,
            layout,
            catalogue,
            records,
            mask,
            fields
        };

        store.write_manifest(0)?;

        debug!("created store {:?} with {} chunks and {} stored pixels", store.directory, store.records.len(), stored);

        Ok(store)
    }

    #[inline]
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    #[inline]
    pub fn layout(&self) -> &ChunkLayout {
        &self.layout
    }

    #[inline]
    pub fn catalogue(&self) -> &FieldCatalogue {
        &self.catalogue
    }

    #[inline]
    pub fn records(&self) -> &[ChunkRecord] {
        &self.records
    }

    pub fn stored_pixels(&self) -> usize {
        self.records.last().map_or(0, |record| record.stored_end)
    }

    /// One writer per chunk, each owning disjoint slices of every field file.
    pub fn chunk_writers(&mut self) -> Vec<ChunkWriter<'_>> {
        let ResultStore { records, mask, fields, .. } = self;

        let mask: &MappedFile = mask;
        let mask_bytes = mask.bytes();

        let mut writers = records.iter()
            .map(|record| ChunkWriter {
                record: *record,
                mask: &mask_bytes[record.mask_begin..record.mask_begin + record.chunk.pixel_count()],
                fields: Vec::with_capacity(fields.len())
            })
            .collect::<Vec<_>>();

        for (field, mapped) in fields.iter_mut() {
            let size = field.kind().size();
            let length = mapped.length;
            let mut remaining: &mut [u8] = &mut mapped.map[..length];

            for writer in writers.iter_mut() {
                let (current, rest) = std::mem::take(&mut remaining).split_at_mut(writer.record.stored_count() * size);
                writer.fields.push((*field, current));
                remaining = rest;
            }
        }

        writers
    }

    fn write_manifest(&self, references: usize) -> Result<(), StoreError> {
        let manifest = Manifest {
            run_name: self.run_name.clone(),
            settings: self.settings.clone(),
            layout: self.layout,
            catalogue: self.catalogue.clone(),
            stored_pixels: self.stored_pixels(),
            references
        };

        let path = self.directory.join(MANIFEST_FILE);
        let file = File::create(&path).map_err(|e| StoreError::io(&path, e))?;
        serde_json::to_writer_pretty(file, &manifest)?;

        Ok(())
    }

    /// Flushes every field and publishes the chunk index. The index is written under
    /// a temporary name and renamed once complete.
    pub fn finalize(self, references: usize) -> Result<PathBuf, StoreError> {
        self.mask.map.flush().map_err(|e| StoreError::io(self.directory.join(MASK_FILE), e))?;

        for (field, mapped) in &self.fields {
            mapped.map.flush().map_err(|e| StoreError::io(self.directory.join(field.file_name()), e))?;
        }

        self.write_manifest(references)?;

        let mut index = Vec::with_capacity(INDEX_HEADER + INDEX_RECORD * self.records.len());
        index.extend_from_slice(INDEX_MAGIC);
        index.extend_from_slice(&INDEX_VERSION.to_le_bytes());
        index.extend_from_slice(&(self.records.len() as u64).to_le_bytes());

        for record in &self.records {
            record.encode(&mut index);
        }

        let partial = self.directory.join(INDEX_PARTIAL_FILE);
        let finished = self.directory.join(INDEX_FILE);

        fs::write(&partial, &index).map_err(|e| StoreError::io(&partial, e))?;
        fs::rename(&partial, &finished).map_err(|e| StoreError::io(&finished, e))?;

        debug!("finalized store {:?}", self.directory);

        Ok(self.directory)
    }
}

/// Mutable view of one chunk of a store.
pub struct ChunkWriter<'a> {
    record: ChunkRecord,
    mask: &'a [u8],
    fields: Vec<(Field, &'a mut [u8])>,
}

impl<'a> ChunkWriter<'a> {
    #[inline]
    pub fn record(&self) -> ChunkRecord {
        self.record
    }

    #[inline]
    pub fn chunk(&self) -> Chunk {
        self.record.chunk
    }

    /// One byte per tile pixel in row-major order, non-zero when the pixel is stored.
    #[inline]
    pub fn mask(&self) -> &'a [u8] {
        self.mask
    }

    /// Image coordinates and stored position of the computed pixels of the chunk.
    pub fn stored_pixels(&self) -> Vec<(usize, usize, usize)> {
        let mask = self.mask;

        self.record.chunk.pixels()
            .enumerate()
            .filter(|(local, _)| mask[*local] != 0)
            .enumerate()
            .map(|(position, (_, (i, j)))| (position, i, j))
            .collect()
    }

    pub fn write_pixel(&mut self, position: usize, pixel: &PixelData) {
        for (field, bytes) in self.fields.iter_mut() {
            let size = field.kind().size();
            field.encode(pixel, &mut bytes[position * size..(position + 1) * size]);
        }
    }

    fn slot(&self, field: Field, position: usize) -> Option<&[u8]> {
        let size = field.kind().size();

        self.fields.iter()
            .find(|(other, _)| *other == field)
            .map(|(_, bytes)| &bytes[position * size..(position + 1) * size])
    }

    pub fn read_code(&self, field: Field, position: usize) -> Option<u8> {
        self.slot(field, position).map(|bytes| bytes[0])
    }

    pub fn read_integer(&self, field: Field, position: usize) -> Option<i64> {
        self.slot(field, position).map(decode_integer)
    }

    pub fn read_complex(&self, field: Field, position: usize) -> Option<ComplexExtended> {
        self.slot(field, position).map(decode_complex)
    }
}

/// Read only access to a finalized run.
pub struct ResultReader {
    directory: PathBuf,
    manifest: Manifest,
    records: Vec<ChunkRecord>,
    mask: Mmap,
    fields: Vec<(Field, Mmap)>,
}

fn map_file(path: &Path) -> Result<Mmap, StoreError> {
    let file = File::open(path).map_err(|e| StoreError::io(path, e))?;
    unsafe { Mmap::map(&file) }.map_err(|e| StoreError::io(path, e))
}

impl ResultReader {
    pub fn open(root: &Path, run_name: &str) -> Result<ResultReader, StoreError> {
        let directory = root.join(run_name);
        let index_path = directory.join(INDEX_FILE);

        if !index_path.exists() {
            return Err(StoreError::NotFinalized(directory));
        }

        let manifest_path = directory.join(MANIFEST_FILE);
        let manifest_file = File::open(&manifest_path).map_err(|e| StoreError::io(&manifest_path, e))?;
        let manifest: Manifest = serde_json::from_reader(manifest_file)?;

        let index = map_file(&index_path)?;
        let corrupt = |reason: String| StoreError::CorruptIndex {
            path: index_path.clone(),
            reason
        };

        if index.len() < INDEX_HEADER || &index[0..4] != INDEX_MAGIC {
            return Err(corrupt("bad header".to_owned()));
        }

        let mut version = [0u8; 4];
        version.copy_from_slice(&index[4..8]);
        let version = u32::from_le_bytes(version);

        if version != INDEX_VERSION {
            return Err(corrupt(format!("unsupported version {}", version)));
        }

        let mut count = [0u8; 8];
        count.copy_from_slice(&index[8..16]);
        let count = u64::from_le_bytes(count) as usize;

        if count != manifest.layout.len() || index.len() != INDEX_HEADER + count * INDEX_RECORD {
            return Err(corrupt(format!("{} records for {} chunks", count, manifest.layout.len())));
        }

        let records = index[INDEX_HEADER..]
            .chunks_exact(INDEX_RECORD)
            .map(ChunkRecord::decode)
            .collect::<Vec<_>>();

        let mask = map_file(&directory.join(MASK_FILE))?;

        let mut fields = Vec::with_capacity(manifest.catalogue.fields().len());

        for field in manifest.catalogue.fields() {
            fields.push((*field, map_file(&directory.join(field.file_name()))?));
        }

        // every range handed out later must lie inside the mapped files
        for (rank, record) in records.iter().enumerate() {
            if record.chunk != manifest.layout.chunk(rank) {
                return Err(corrupt(format!("chunk {} does not match the layout", rank)));
            }

            let mask_end = record.mask_begin.checked_add(record.chunk.pixel_count());

            if mask_end.map_or(true, |end| end > mask.len()) {
                return Err(corrupt(format!("mask range of chunk {} is outside {} bytes", rank, mask.len())));
            }

            if record.stored_begin > record.stored_end || record.stored_end > manifest.stored_pixels {
                return Err(corrupt(format!("stored range {}..{} of chunk {} is outside {} pixels",
                                           record.stored_begin, record.stored_end, rank, manifest.stored_pixels)));
            }

            for (field, map) in fields.iter() {
                if record.stored_end * field.kind().size() > map.len() {
                    return Err(corrupt(format!("{} is too short for chunk {}", field.file_name(), rank)));
                }
            }
        }

        Ok(ResultReader {
            directory,
            manifest,
            records,
            mask,
            fields
        })
    }

    #[inline]
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    #[inline]
    pub fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    #[inline]
    pub fn layout(&self) -> &ChunkLayout {
        &self.manifest.layout
    }

    #[inline]
    pub fn catalogue(&self) -> &FieldCatalogue {
        &self.manifest.catalogue
    }

    #[inline]
    pub fn chunk_count(&self) -> usize {
        self.records.len()
    }

    pub fn record(&self, rank: usize) -> Result<ChunkRecord, StoreError> {
        self.records.get(rank).copied().ok_or(StoreError::ChunkOutOfRange {
            rank,
            count: self.records.len()
        })
    }

    pub fn mask(&self, rank: usize) -> Result<&[u8], StoreError> {
        let record = self.record(rank)?;
        Ok(&self.mask[record.mask_begin..record.mask_begin + record.chunk.pixel_count()])
    }

    /// Raw bytes of one field of one chunk, checked against the expected kind.
    pub fn chunk_field(&self, rank: usize, name: &str, kind: FieldKind) -> Result<&[u8], StoreError> {
        let record = self.record(rank)?;

        let (field, map) = self.fields.iter()
            .find(|(field, _)| field.name() == name)
            .ok_or_else(|| StoreError::UnknownField(name.to_owned()))?;

        if field.kind() != kind {
            return Err(StoreError::KindMismatch {
                field: name.to_owned(),
                stored: field.kind(),
                requested: kind
            });
        }

        let size = kind.size();
        Ok(&map[record.stored_begin * size..record.stored_end * size])
    }

    pub fn read_complex(&self, rank: usize, name: &str) -> Result<Vec<ComplexExtended>, StoreError> {
        let bytes = self.chunk_field(rank, name, FieldKind::Complex)?;
        Ok(bytes.chunks_exact(FieldKind::Complex.size()).map(decode_complex).collect())
    }

    pub fn read_integer(&self, rank: usize, name: &str) -> Result<Vec<i64>, StoreError> {
        let bytes = self.chunk_field(rank, name, FieldKind::Integer)?;
        Ok(bytes.chunks_exact(FieldKind::Integer.size()).map(decode_integer).collect())
    }

    pub fn read_code(&self, rank: usize, name: &str) -> Result<Vec<u8>, StoreError> {
        Ok(self.chunk_field(rank, name, FieldKind::Code)?.to_vec())
    }

    // Scatters stored values of every chunk back to image order
    fn scatter<T: Copy>(&self, mut read: impl FnMut(usize) -> Result<Vec<T>, StoreError>) -> Result<Vec<Option<T>>, StoreError> {
        let layout = self.layout();
        let mut output = vec![None; layout.pixel_count()];

        for rank in 0..self.records.len() {
            let record = self.record(rank)?;
            let mask = self.mask(rank)?;
            let values = read(rank)?;
            let mut position = 0;

            for (local, (i, j)) in record.chunk.pixels().enumerate() {
                if mask[local] != 0 {
                    output[j * layout.image_width + i] = Some(values[position]);
                    position += 1;
                }
            }
        }

        Ok(output)
    }

    /// Code field in image row-major order, `None` where the pixel was not computed.
    pub fn image_codes(&self, name: &str) -> Result<Vec<Option<u8>>, StoreError> {
        self.scatter(|rank| self.read_code(rank, name))
    }

    pub fn image_integers(&self, name: &str) -> Result<Vec<Option<i64>>, StoreError> {
        self.scatter(|rank| self.read_integer(rank, name))
    }

    pub fn image_complex(&self, name: &str) -> Result<Vec<Option<ComplexExtended>>, StoreError> {
        self.scatter(|rank| self.read_complex(rank, name))
    }

    /// Subset of the pixels whose stored code is one of `codes`, for recomputing part
    /// of a finished run.
    pub fn subset_from_codes(&self, name: &str, codes: &[u8]) -> Result<Subset, StoreError> {
        let width = self.layout().image_width;
        let mut selected = Vec::new();

        for rank in 0..self.records.len() {
            let record = self.record(rank)?;
            let mask = self.mask(rank)?;
            let values = self.chunk_field(rank, name, FieldKind::Code)?;

            let stored = record.chunk.pixels()
                .zip(mask.iter())
                .filter(|(_, computed)| **computed != 0)
                .map(|(pixel, _)| pixel);

            for ((i, j), code) in stored.zip(values.iter()) {
                if codes.contains(code) {
                    selected.push(j * width + i);
                }
            }
        }

        selected.sort_unstable();

        let selected = Arc::new(selected);

        Ok(Subset::predicate(move |i, j| selected.binary_search(&(j * width + i)).is_ok()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::StopReason;

    fn catalogue() -> FieldCatalogue {
        FieldCatalogue::from_names(&["dzndc"], false).unwrap()
    }

    fn fill(store: &mut ResultStore) {
        for mut writer in store.chunk_writers() {
            for (position, i, j) in writer.stored_pixels() {
                let mut pixel = PixelData::new(i, j, ComplexExtended::zero(), 0);
                pixel.iteration = i + 10 * j;
                pixel.stop_reason = if i == j { StopReason::Escaped } else { StopReason::MaxIteration };
                pixel.z_current = ComplexExtended::new2(i as f64, j as f64, -2000);

                writer.write_pixel(position, &pixel);
            }
        }
    }

    #[test]
    fn finalized_store_reads_back_by_chunk() {
        let root = tempfile::tempdir().unwrap();
        let layout = ChunkLayout::new(7, 5, 3);

        let mut store = ResultStore::create(root.path(), "run", layout, catalogue(), &Subset::All, serde_json::Value::Null).unwrap();
        fill(&mut store);
        store.finalize(1).unwrap();

        let reader = ResultReader::open(root.path(), "run").unwrap();
        assert_eq!(reader.chunk_count(), layout.len());

        let iterations = reader.image_integers("stop_iter").unwrap();
        assert_eq!(iterations[4 * 7 + 6], Some(46));

        let record = reader.record(4).unwrap();
        let codes = reader.read_code(4, "stop_reason").unwrap();
        assert_eq!(codes.len(), record.chunk.pixel_count());
        assert_eq!(codes[0], StopReason::Escaped.code());

        let zn = reader.image_complex("zn").unwrap();
        assert_eq!(zn[2 * 7 + 3], Some(ComplexExtended::new2(3.0, 2.0, -2000)));
    }

    #[test]
    fn subset_skips_unselected_pixels() {
        let root = tempfile::tempdir().unwrap();
        let layout = ChunkLayout::new(4, 4, 2);
        let subset = Subset::predicate(|i, j| (i + j) % 2 == 0);

        let mut store = ResultStore::create(root.path(), "half", layout, catalogue(), &subset, serde_json::Value::Null).unwrap();
        assert_eq!(store.stored_pixels(), 8);

        fill(&mut store);
        store.finalize(1).unwrap();

        let reader = ResultReader::open(root.path(), "half").unwrap();
        let codes = reader.image_codes("stop_reason").unwrap();

        assert_eq!(codes[0], Some(StopReason::Escaped.code()));
        assert_eq!(codes[1], None);
        assert_eq!(reader.mask(0).unwrap(), &[1, 0, 0, 1]);

        let escaped = reader.subset_from_codes("stop_reason", &[StopReason::Escaped.code()]).unwrap();
        assert!(escaped.contains(3, 3));
        assert!(!escaped.contains(2, 0));
        assert!(!escaped.contains(1, 0));
    }

    #[test]
    fn unknown_fields_and_wrong_kinds_are_errors() {
        let root = tempfile::tempdir().unwrap();
        let layout = ChunkLayout::new(2, 2, 2);

        let mut store = ResultStore::create(root.path(), "kinds", layout, catalogue(), &Subset::All, serde_json::Value::Null).unwrap();
        fill(&mut store);
        store.finalize(1).unwrap();

        let reader = ResultReader::open(root.path(), "kinds").unwrap();

        assert!(matches!(reader.read_code(0, "potential"), Err(StoreError::UnknownField(_))));
        assert!(matches!(reader.read_code(0, "dzndz"), Err(StoreError::UnknownField(_))));
        assert!(matches!(reader.read_integer(0, "zn"), Err(StoreError::KindMismatch { .. })));
        assert!(matches!(reader.read_code(1, "stop_reason"), Err(StoreError::ChunkOutOfRange { .. })));
    }

    #[test]
    fn unfinished_and_restarted_runs_have_no_index() {
        let root = tempfile::tempdir().unwrap();
        let layout = ChunkLayout::new(3, 3, 2);

        let store = ResultStore::create(root.path(), "again", layout, catalogue(), &Subset::All, serde_json::Value::Null).unwrap();
        store.finalize(1).unwrap();
        assert!(ResultReader::open(root.path(), "again").is_ok());

        let store = ResultStore::create(root.path(), "again", layout, catalogue(), &Subset::All, serde_json::Value::Null).unwrap();
        assert!(matches!(ResultReader::open(root.path(), "again"), Err(StoreError::NotFinalized(_))));
        drop(store);
    }

    #[test]
    fn empty_subset_maps_placeholder_bytes() {
        let root = tempfile::tempdir().unwrap();
        let layout = ChunkLayout::new(3, 2, 2);

        let store = ResultStore::create(root.path(), "empty", layout, catalogue(), &Subset::predicate(|_, _| false), serde_json::Value::Null).unwrap();
        assert_eq!(store.stored_pixels(), 0);
        store.finalize(1).unwrap();

        let reader = ResultReader::open(root.path(), "empty").unwrap();
        assert!(reader.read_complex(0, "zn").unwrap().is_empty());
        assert!(reader.image_codes("stop_reason").unwrap().iter().all(Option::is_none));
    }

    fn corrupt_index(run_name: &str, field_offset: usize, value: u64) -> Result<ResultReader, StoreError> {
        let root = tempfile::tempdir().unwrap();
        let layout = ChunkLayout::new(4, 4, 2);

        let mut store = ResultStore::create(root.path(), run_name, layout, catalogue(), &Subset::All, serde_json::Value::Null).unwrap();
        fill(&mut store);
        store.finalize(1).unwrap();

        // rewrite one u64 of the first record
        let path = root.path().join(run_name).join(INDEX_FILE);
        let mut index = fs::read(&path).unwrap();
        let offset = INDEX_HEADER + 8 * field_offset;
        index[offset..offset + 8].copy_from_slice(&value.to_le_bytes());
        fs::write(&path, index).unwrap();

        ResultReader::open(root.path(), run_name)
    }

    #[test]
    fn out_of_range_records_are_rejected() {
        assert!(matches!(corrupt_index("stored", 7, u64::MAX / 2), Err(StoreError::CorruptIndex { .. })));
        assert!(matches!(corrupt_index("order", 6, 5), Err(StoreError::CorruptIndex { .. })));
        assert!(matches!(corrupt_index("mask", 5, 1 << 40), Err(StoreError::CorruptIndex { .. })));
        assert!(matches!(corrupt_index("geometry", 3, 9), Err(StoreError::CorruptIndex { .. })));

        // the unmodified value still opens
        assert!(corrupt_index("intact", 7, 4).is_ok());
    }
}

//! The `.xarc` archive container.
//!
//! An archive is a 12-byte header, a directory of NUL-terminated names with
//! their sizes, and then the file contents concatenated in directory order:
//!
//! ```text
//! u32 sentinel (1)
//! u32 file_count
//! u32 directory_end_offset
//! { cstr name, u32 size, u32 unknown (0) } * file_count
//! contents...
//! ```

mod dir;
mod errors;

use std::path::Path;

use bytes::BufMut as _;
use indexmap::IndexMap;

pub use self::errors::{Error, InvalidName};

use crate::{
    errors::{FormatError, PackError, ensure_format, expect_constant},
    utils::{
        data_writer::DataWriterExt as _,
        fs::write_file_atomic,
        latin1,
        mem_reader::{BufferMemReader, MemReader},
    },
};

use self::errors::io_error;

pub const HEADER_SENTINEL: u32 = 1;
pub const HEADER_SIZE: usize = 12;

/// An archive held in memory as an ordered map from entry names to contents.
///
/// Names are kept in their on-disk byte form and exposed as Latin-1 strings.
/// Directory order is insertion order; replacing an entry keeps its place.
#[derive(Debug, Clone, Default)]
pub struct Xarc {
    files: IndexMap<Vec<u8>, Vec<u8>>,
}

// Two archives are equal only if they list the same entries in the same order.
impl PartialEq for Xarc {
    fn eq(&self, other: &Self) -> bool {
        self.files.len() == other.files.len() && self.files.iter().eq(other.files.iter())
    }
}

impl Eq for Xarc {}

fn encode_name(name: &str) -> Result<Vec<u8>, InvalidName> {
    if name.is_empty() {
        return Err(InvalidName::Empty);
    }
    if name.contains('\0') {
        return Err(InvalidName::ContainsNul(name.to_string()));
    }
    latin1::encode(name).map_err(|source| InvalidName::NotLatin1 {
        name: name.to_string(),
        source,
    })
}

impl Xarc {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_bytes(data: &[u8]) -> Result<Self, FormatError> {
        Ok(Self {
            files: parse_archive(data)?,
        })
    }

    /// Replaces the contents with the archive in `data`.
    ///
    /// On failure the archive is left empty.
    pub fn load_binary(&mut self, data: &[u8]) -> Result<(), FormatError> {
        self.files.clear();
        self.files = parse_archive(data)?;
        Ok(())
    }

    pub fn load_from_file(&mut self, path: &Path) -> Result<(), Error> {
        self.files.clear();
        let data = std::fs::read(path).map_err(io_error(path))?;
        self.load_binary(&data)?;
        Ok(())
    }

    /// Packs the archive and atomically replaces `path` with it.
    pub fn save_to_file(&self, path: &Path) -> Result<(), Error> {
        let data = self.pack()?;
        write_file_atomic(path, &data).map_err(io_error(path))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.files.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Entry names in directory order.
    pub fn file_names(&self) -> impl Iterator<Item = String> + '_ {
        self.files.keys().map(|name| latin1::decode(name))
    }

    /// Entries in directory order.
    pub fn entries(&self) -> impl Iterator<Item = (String, &[u8])> + '_ {
        self.files
            .iter()
            .map(|(name, data)| (latin1::decode(name), data.as_slice()))
    }

    #[must_use]
    pub fn get_data(&self, name: &str) -> Option<&[u8]> {
        let key = latin1::encode(name).ok()?;
        self.files.get(&key).map(Vec::as_slice)
    }

    /// Stores `data` under `name`, returning the contents it replaced.
    ///
    /// A new name is appended to the directory; an existing one keeps its
    /// position.
    pub fn insert_data(
        &mut self,
        name: &str,
        data: impl Into<Vec<u8>>,
    ) -> Result<Option<Vec<u8>>, InvalidName> {
        let key = encode_name(name)?;
        Ok(self.files.insert(key, data.into()))
    }

    /// Removes an entry, keeping the order of the others.
    pub fn remove_data(&mut self, name: &str) -> Option<Vec<u8>> {
        let key = latin1::encode(name).ok()?;
        self.files.shift_remove(&key)
    }

    /// Writes the archive, deriving the directory from the current entries.
    pub fn pack(&self) -> Result<Vec<u8>, PackError> {
        let mut directory = Vec::new();
        for (name, data) in &self.files {
            let size = u32::try_from(data.len()).map_err(|_| PackError::TooLarge {
                what: format!("Size of archive entry {:?}", latin1::decode(name)),
                len: data.len(),
            })?;
            directory.put_cstr(name);
            directory.put_u32_le(size);
            directory.put_u32_le(0);
        }

        let payload_size: usize = self.files.values().map(Vec::len).sum();
        let mut out = Vec::with_capacity(HEADER_SIZE + directory.len() + payload_size);
        out.put_u32_le(HEADER_SENTINEL);
        out.put_len_u32("File count", self.files.len())?;
        out.put_len_u32("Directory end offset", HEADER_SIZE + directory.len())?;
        out.put_slice(&directory);
        for data in self.files.values() {
            out.put_slice(data);
        }
        Ok(out)
    }
}

fn parse_archive(data: &[u8]) -> Result<IndexMap<Vec<u8>, Vec<u8>>, FormatError> {
    let mut reader = BufferMemReader::new(data);
    let sentinel = reader.read_u32_le("sentinel")?;
    expect_constant("sentinel", HEADER_SENTINEL, sentinel)?;
    let file_count = reader.read_u32_le("file_count")?;
    let directory_end = reader.read_u32_le("directory_end_offset")? as usize;

    // An archive whose directory ends right after the header has no entries,
    // whatever its file count says.
    if directory_end == HEADER_SIZE {
        if file_count != 0 {
            log::debug!("Empty archive declares {file_count} files");
        }
        return Ok(IndexMap::new());
    }
    ensure_format!(
        reader,
        HEADER_SIZE < directory_end && directory_end <= data.len(),
        "directory end offset {} is outside the file ({} bytes)",
        directory_end,
        data.len()
    );

    let mut directory = reader.read_to_subreader("directory", directory_end - HEADER_SIZE)?;
    let mut sizes = IndexMap::new();
    while !directory.is_empty() {
        let index = sizes.len();
        let (name, size) = directory.in_record("entries", index, |entry| {
            let name = entry.read_cstr("name")?;
            let size = entry.read_u32_le("size")?;
            let unknown = entry.read_u32_le("unknown")?;
            ensure_format!(
                entry,
                unknown == 0,
                "unknown field is {:#010x}, expected 0",
                unknown
            );
            Ok((name, size))
        })?;
        ensure_format!(
            directory,
            !sizes.contains_key(&name),
            "duplicate entry name {:?}",
            latin1::decode(&name)
        );
        sizes.insert(name, size);
    }
    ensure_format!(
        reader,
        sizes.len() == file_count as usize,
        "archive declares {} files, but its directory lists {}",
        file_count,
        sizes.len()
    );

    let mut files = IndexMap::with_capacity(sizes.len());
    for (index, (name, size)) in sizes.into_iter().enumerate() {
        let data = reader.in_record("contents", index, |r| r.read_bytes("data", size as usize))?;
        files.insert(name, data);
    }

    if !reader.is_empty() {
        log::warn!(
            "Ignoring {} bytes after the last archive entry",
            reader.remaining()
        );
    }
    log::debug!("Decoded archive with {} entries", files.len());
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use datalit::datalit;
    use proptest::prelude::*;

    fn two_files() -> Xarc {
        let mut archive = Xarc::new();
        archive.insert_data("a.txt", b"hi".as_slice()).unwrap();
        archive.insert_data("b.bin", vec![0, 1]).unwrap();
        archive
    }

    #[test]
    fn packs_entries_in_insertion_order() {
        let packed = two_files().pack().unwrap();
        let expected = datalit! {
            @endian = le,
            1u32,           // sentinel
            2u32,           // file_count
            40u32,          // directory_end_offset
            c"a.txt",
            2u32,
            0u32,
            c"b.bin",
            2u32,
            0u32,
            b"hi",
            0u8, 1u8,
        };
        assert_eq!(packed, expected.to_vec());

        let reloaded = Xarc::from_bytes(&packed).unwrap();
        let names = reloaded.file_names().collect::<Vec<_>>();
        assert_eq!(names, ["a.txt", "b.bin"]);
        assert_eq!(reloaded.get_data("b.bin"), Some(&[0u8, 1][..]));
        assert_eq!(reloaded.get_data("a.txt"), Some(&b"hi"[..]));
        assert_eq!(reloaded.get_data("c"), None);
        assert_eq!(reloaded, two_files());
    }

    #[test]
    fn empty_archive_round_trips() {
        let packed = Xarc::new().pack().unwrap();
        assert_eq!(packed, datalit!(1u32_le, 0u32_le, 12u32_le).to_vec());
        assert!(Xarc::from_bytes(&packed).unwrap().is_empty());
    }

    #[test]
    fn empty_directory_ignores_file_count() {
        let data = datalit!(1u32_le, 5u32_le, 12u32_le);
        let archive = Xarc::from_bytes(&data[..]).unwrap();
        assert_eq!(archive.len(), 0);
    }

    #[test]
    fn rejects_file_count_mismatch() {
        let mut packed = two_files().pack().unwrap();
        packed[4] = 3;
        let err = Xarc::from_bytes(&packed).unwrap_err();
        assert!(
            matches!(&err, FormatError::InvalidData { message, .. } if message.contains("declares 3 files")),
            "{err}"
        );
    }

    #[test]
    fn rejects_bad_header_and_entries() {
        let mut packed = two_files().pack().unwrap();
        packed[0] = 2;
        assert!(matches!(
            Xarc::from_bytes(&packed),
            Err(FormatError::BadConstant {
                field: "sentinel",
                ..
            })
        ));

        let mut packed = two_files().pack().unwrap();
        // The unknown field of the first entry.
        packed[22] = 1;
        let err = Xarc::from_bytes(&packed).unwrap_err();
        match err {
            FormatError::InvalidData { context, .. } => assert_eq!(context, "directory.entries[0]"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn rejects_directory_end_outside_file() {
        for end in [0u32, 11, 1000] {
            let data = datalit!(1u32_le, 0u32_le);
            let mut data = data.to_vec();
            data.extend_from_slice(&end.to_le_bytes());
            let result = Xarc::from_bytes(&data);
            assert!(
                matches!(result, Err(FormatError::InvalidData { .. })),
                "end offset {end} accepted"
            );
        }
    }

    #[test]
    fn rejects_entries_crossing_directory_end() {
        let mut packed = two_files().pack().unwrap();
        // Cut the directory short in the middle of the second entry.
        packed[8] = 30;
        assert!(Xarc::from_bytes(&packed).is_err());
    }

    #[test]
    fn rejects_duplicate_names() {
        let data = datalit! {
            @endian = le,
            1u32,
            2u32,
            32u32,
            c"a",
            0u32,
            0u32,
            c"a",
            0u32,
            0u32,
        };
        let err = Xarc::from_bytes(&data[..]).unwrap_err();
        assert!(err.to_string().contains("duplicate"), "{err}");
    }

    #[test]
    fn rejects_truncated_contents() {
        let packed = two_files().pack().unwrap();
        let err = Xarc::from_bytes(&packed[..packed.len() - 1]).unwrap_err();
        match err {
            FormatError::NotEnoughData { context, .. } => assert_eq!(context, "contents[1].data"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn tolerates_trailing_bytes() {
        let mut packed = two_files().pack().unwrap();
        packed.extend_from_slice(b"junk");
        assert_eq!(Xarc::from_bytes(&packed).unwrap(), two_files());
    }

    #[test]
    fn failed_load_leaves_archive_empty() {
        let mut archive = two_files();
        assert!(archive.load_binary(b"nope").is_err());
        assert!(archive.is_empty());
    }

    #[test]
    fn overwrite_keeps_position() {
        let mut archive = two_files();
        archive.insert_data("c.dat", b"c".as_slice()).unwrap();
        let previous = archive.insert_data("a.txt", b"new".as_slice()).unwrap();
        assert_eq!(previous.as_deref(), Some(&b"hi"[..]));
        assert_eq!(
            archive.file_names().collect::<Vec<_>>(),
            ["a.txt", "b.bin", "c.dat"]
        );
        assert_eq!(archive.get_data("a.txt"), Some(&b"new"[..]));

        assert_eq!(archive.remove_data("b.bin"), Some(vec![0, 1]));
        assert_eq!(archive.remove_data("b.bin"), None);
        let names = archive.file_names().collect::<Vec<_>>();
        assert_eq!(names, ["a.txt", "c.dat"]);
    }

    #[test]
    fn names_are_latin1() {
        let mut archive = Xarc::new();
        archive.insert_data("caf\u{e9}.txt", vec![b'x']).unwrap();
        let packed = archive.pack().unwrap();
        assert!(packed.windows(9).any(|window| window == b"caf\xe9.txt\0"));
        let reloaded = Xarc::from_bytes(&packed).unwrap();
        assert_eq!(reloaded.get_data("caf\u{e9}.txt"), Some(&b"x"[..]));
    }

    #[test]
    fn rejects_invalid_names() {
        let mut archive = Xarc::new();
        assert_eq!(
            archive.insert_data("", Vec::<u8>::new()),
            Err(InvalidName::Empty)
        );
        assert!(matches!(
            archive.insert_data("a\0b", Vec::<u8>::new()),
            Err(InvalidName::ContainsNul(_))
        ));
        assert!(matches!(
            archive.insert_data("\u{263A}", Vec::<u8>::new()),
            Err(InvalidName::NotLatin1 { .. })
        ));
        assert!(archive.is_empty());
    }

    #[test]
    fn file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out/test.xarc");
        two_files().save_to_file(&path).unwrap();
        let mut archive = Xarc::new();
        archive.load_from_file(&path).unwrap();
        assert_eq!(archive, two_files());

        let missing = dir.path().join("missing.xarc");
        assert!(matches!(
            archive.load_from_file(&missing),
            Err(Error::Io { path, .. }) if path == missing
        ));
        assert!(archive.is_empty());
    }

    fn arb_entries() -> impl Strategy<Value = Vec<(String, Vec<u8>)>> {
        prop::collection::btree_map(
            "[a-z0-9_./]{1,12}",
            prop::collection::vec(any::<u8>(), 0..64),
            0..8,
        )
        .prop_map(|map| map.into_iter().collect::<Vec<_>>())
        .prop_shuffle()
    }

    proptest! {
        #[test]
        fn preserves_order_and_contents(entries in arb_entries()) {
            let mut archive = Xarc::new();
            for (name, data) in &entries {
                archive.insert_data(name, data.clone())?;
            }
            let packed = archive.pack()?;
            let reloaded = Xarc::from_bytes(&packed)?;
            prop_assert_eq!(
                reloaded.file_names().collect::<Vec<_>>(),
                entries.iter().map(|(name, _)| name.clone()).collect::<Vec<_>>()
            );
            for (name, data) in &entries {
                prop_assert_eq!(reloaded.get_data(name), Some(data.as_slice()));
            }
            prop_assert_eq!(reloaded.pack()?, packed);
        }
    }
}

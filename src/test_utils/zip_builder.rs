//! In-memory zip archives for tests.

use std::io::{Cursor, Write};
use zip::ZipWriter;
use zip::write::SimpleFileOptions;

enum Member {
    Dir(String),
    File(String, Vec<u8>),
}

/// Builds a zip archive in memory, members in insertion order.
///
/// ```rust,no_run
/// use scriptkeeper::test_utils::ZipBuilder;
///
/// let bytes = ZipBuilder::new()
///     .dir("repo-sha/")
///     .file("repo-sha/main.lua", "print('hi')")
///     .build();
/// assert!(!bytes.is_empty());
/// ```
#[derive(Default)]
pub struct ZipBuilder {
    members: Vec<Member>,
}

impl ZipBuilder {
    /// Empty builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a directory member. A trailing `/` is added when missing.
    #[must_use]
    pub fn dir(mut self, name: &str) -> Self {
        let name = if name.ends_with('/') { name.to_string() } else { format!("{name}/") };
        self.members.push(Member::Dir(name));
        self
    }

    /// Add a file member.
    #[must_use]
    pub fn file(mut self, name: &str, content: impl AsRef<[u8]>) -> Self {
        self.members.push(Member::File(name.to_string(), content.as_ref().to_vec()));
        self
    }

    /// Write the archive.
    ///
    /// # Panics
    ///
    /// Panics if the zip writer rejects a member; only used from tests.
    #[must_use]
    pub fn build(self) -> Vec<u8> {
        let mut buffer = Vec::new();
        {
            let mut zip = ZipWriter::new(Cursor::new(&mut buffer));
            let options =
                SimpleFileOptions::default().compression_method(zip::CompressionMethod::Stored);
            for member in self.members {
                match member {
                    Member::Dir(name) => zip.add_directory(name, options).unwrap(),
                    Member::File(name, content) => {
                        zip.start_file(name, options).unwrap();
                        zip.write_all(&content).unwrap();
                    }
                }
            }
            zip.finish().unwrap();
        }
        buffer
    }
}

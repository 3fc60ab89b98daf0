//! A small registry of source files, addressed by dense index rather than by
//! path, so diagnostics and spans stay cheap to copy around.

use codespan_reporting::files::{Error, SimpleFile};

use crate::Text;

#[derive(
    Debug, Default, Copy, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize,
)]
pub struct FileId(u32);

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SourceMap(Vec<SimpleFile<Text, Text>>);

impl SourceMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, path: impl Into<Text>, contents: impl Into<Text>) -> FileId {
        let id = FileId(self.0.len() as u32);
        self.0.push(SimpleFile::new(path.into(), contents.into()));
        id
    }

    fn get(&self, id: FileId) -> Result<&SimpleFile<Text, Text>, Error> {
        self.0.get(id.0 as usize).ok_or(Error::FileMissing)
    }

    pub fn path(&self, id: FileId) -> &Text {
        self.get(id).expect("valid FileId").name()
    }

    pub fn contents(&self, id: FileId) -> &Text {
        self.get(id).expect("valid FileId").source()
    }
}

impl codespan_reporting::files::Files<'_> for SourceMap {
    type FileId = FileId;
    type Name = Text;
    type Source = Text;

    fn name(&'_ self, id: Self::FileId) -> Result<Self::Name, Error> {
        Ok(self.get(id)?.name().clone())
    }

    fn source(&'_ self, id: Self::FileId) -> Result<Self::Source, Error> {
        Ok(self.get(id)?.source().clone())
    }

    fn line_index(&'_ self, id: Self::FileId, byte_index: usize) -> Result<usize, Error> {
        self.get(id)?.line_index((), byte_index)
    }

    fn line_range(
        &'_ self,
        id: Self::FileId,
        line_index: usize,
    ) -> Result<std::ops::Range<usize>, Error> {
        self.get(id)?.line_range((), line_index)
    }
}

//! Storage destinations decoded from attachment filenames.

/// Where an attachment lands in object storage.
///
/// `segments` come from the filename prefix before the keyword delimiter;
/// `filename` is the name the decoder was given, unchanged.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct DerivedDestination {
    pub segments: Vec<String>,
    pub filename: String,
}

impl DerivedDestination {
    /// Segments joined with `/`, always with a trailing separator.
    pub fn storage_path(&self) -> String {
        let mut path = String::new();
        for segment in &self.segments {
            path.push_str(segment);
            path.push('/');
        }
        path
    }

    /// Full object key: storage path followed by the filename, with any
    /// backslashes normalized to `/`.
    pub fn object_key(&self) -> String {
        format!("{}{}", self.storage_path(), self.filename).replace('\\', "/")
    }
}

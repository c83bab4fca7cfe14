//! Uploaded files.
//!
//! Multipart file fields are stored in a tree keyed by field name, so that
//! array-like names keep their structure:
//!
//! | Field name    | Stored as                                  |
//! |---------------|--------------------------------------------|
//! | `avatar`      | `avatar` → file                            |
//! | `docs[]`      | `docs` → list, file appended               |
//! | `docs[a][b]`  | `docs` → map `a` → map, `b` → file         |
//!
//! Lookups use the same bracket syntax, with list entries addressed by
//! index: `docs[0]`.

use bytes::Bytes;
use indexmap::IndexMap;

/// A file received in a multipart form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedFile {
    file_name: Option<String>,
    content_type: Option<String>,
    data: Bytes,
}

impl UploadedFile {
    /// Creates an uploaded file.
    #[must_use]
    pub fn new(file_name: Option<String>, content_type: Option<String>, data: Bytes) -> Self {
        Self {
            file_name,
            content_type,
            data,
        }
    }

    /// Returns the client-supplied file name.
    #[must_use]
    pub fn file_name(&self) -> Option<&str> {
        self.file_name.as_deref()
    }

    /// Returns the declared MIME type.
    #[must_use]
    pub fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    /// Returns the file contents.
    #[must_use]
    pub fn data(&self) -> &Bytes {
        &self.data
    }

    /// Returns the file size in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns `true` for an empty upload.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Returns the extension of the client file name.
    #[must_use]
    pub fn extension(&self) -> Option<&str> {
        self.file_name
            .as_deref()
            .and_then(|name| name.rsplit_once('.'))
            .map(|(_, ext)| ext)
    }
}

/// A node of the uploaded-files tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileNode {
    /// A single file.
    File(UploadedFile),
    /// Files appended through `name[]`.
    List(Vec<FileNode>),
    /// Files keyed through `name[key]`.
    Map(IndexMap<String, FileNode>),
}

impl FileNode {
    fn container_for(segment: &str) -> Self {
        if segment.is_empty() {
            Self::List(Vec::new())
        } else {
            Self::Map(IndexMap::new())
        }
    }

    /// Node to descend into for the remaining segments; a leaf placeholder
    /// is overwritten by the file.
    fn placeholder(rest: &[&str]) -> Self {
        match rest.first() {
            Some(next) => Self::container_for(next),
            None => Self::List(Vec::new()),
        }
    }

    fn place(&mut self, segments: &[&str], file: UploadedFile) {
        let Some((segment, rest)) = segments.split_first() else {
            *self = Self::File(file);
            return;
        };
        match self {
            Self::List(items) if segment.is_empty() => {
                let mut child = Self::placeholder(rest);
                child.place(rest, file);
                items.push(child);
            }
            Self::Map(map) if !segment.is_empty() => {
                let child = map
                    .entry((*segment).to_string())
                    .or_insert_with(|| Self::placeholder(rest));
                child.place(rest, file);
            }
            other => {
                // Shape conflict with an earlier field: the later field wins.
                *other = Self::container_for(segment);
                other.place(segments, file);
            }
        }
    }

    /// Returns the file at this node, if it is a leaf.
    #[must_use]
    pub fn as_file(&self) -> Option<&UploadedFile> {
        match self {
            Self::File(file) => Some(file),
            _ => None,
        }
    }

    fn child(&self, segment: &str) -> Option<&Self> {
        match self {
            Self::List(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
            Self::Map(map) => map.get(segment),
            Self::File(_) => None,
        }
    }
}

/// All files of a request, keyed by top-level field name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UploadedFiles {
    fields: IndexMap<String, FileNode>,
}

impl UploadedFiles {
    /// Creates an empty tree.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a file under a form field name such as `docs[a][b]`.
    pub fn insert(&mut self, field_name: &str, file: UploadedFile) {
        let segments = split_field_name(field_name);
        let Some((head, rest)) = segments.split_first() else {
            return;
        };
        match rest.first() {
            None => {
                self.fields
                    .insert((*head).to_string(), FileNode::File(file));
            }
            Some(next) => {
                let node = self
                    .fields
                    .entry((*head).to_string())
                    .or_insert_with(|| FileNode::container_for(next));
                node.place(rest, file);
            }
        }
    }

    /// Looks up a node by field path such as `docs[0]` or `docs[a][b]`.
    #[must_use]
    pub fn node(&self, path: &str) -> Option<&FileNode> {
        let segments = split_field_name(path);
        let (head, rest) = segments.split_first()?;
        let mut node = self.fields.get(*head)?;
        for segment in rest {
            node = node.child(segment)?;
        }
        Some(node)
    }

    /// Looks up a single file by field path.
    #[must_use]
    pub fn get(&self, path: &str) -> Option<&UploadedFile> {
        self.node(path).and_then(FileNode::as_file)
    }

    /// Iterates over top-level fields.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &FileNode)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Returns the number of top-level fields.
    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Returns `true` if no files were uploaded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// Splits `docs[a][b]` into `["docs", "a", "b"]` and `docs[]` into
/// `["docs", ""]`. Unterminated brackets end the split.
pub(crate) fn split_field_name(name: &str) -> Vec<&str> {
    let Some(open) = name.find('[') else {
        return vec![name];
    };
    let mut segments = vec![&name[..open]];
    let mut rest = &name[open..];
    while let Some(inner) = rest.strip_prefix('[') {
        let Some(close) = inner.find(']') else {
            break;
        };
        segments.push(&inner[..close]);
        rest = &inner[close + 1..];
    }
    segments
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file(name: &str) -> UploadedFile {
        UploadedFile::new(
            Some(name.to_string()),
            Some("text/plain".to_string()),
            Bytes::from(name.to_string()),
        )
    }

    #[test]
    fn test_split_field_name() {
        assert_eq!(split_field_name("avatar"), ["avatar"]);
        assert_eq!(split_field_name("docs[]"), ["docs", ""]);
        assert_eq!(split_field_name("docs[a][b]"), ["docs", "a", "b"]);
        assert_eq!(split_field_name("docs[a"), ["docs"]);
    }

    #[test]
    fn test_plain_field() {
        let mut files = UploadedFiles::new();
        files.insert("avatar", file("me.png"));
        assert_eq!(files.get("avatar").unwrap().file_name(), Some("me.png"));
        assert_eq!(files.get("avatar").unwrap().extension(), Some("png"));
    }

    #[test]
    fn test_list_field() {
        let mut files = UploadedFiles::new();
        files.insert("docs[]", file("a.txt"));
        files.insert("docs[]", file("b.txt"));

        assert!(matches!(files.node("docs"), Some(FileNode::List(items)) if items.len() == 2));
        assert_eq!(files.get("docs[1]").unwrap().file_name(), Some("b.txt"));
        assert!(files.get("docs[2]").is_none());
    }

    #[test]
    fn test_nested_map_field() {
        let mut files = UploadedFiles::new();
        files.insert("docs[a][b]", file("deep.txt"));
        files.insert("docs[a][c]", file("other.txt"));

        assert_eq!(files.get("docs[a][b]").unwrap().file_name(), Some("deep.txt"));
        assert_eq!(files.get("docs[a][c]").unwrap().file_name(), Some("other.txt"));
        assert!(files.get("docs[a]").is_none());
        assert_eq!(files.len(), 1);
    }

    #[test]
    fn test_list_of_maps() {
        let mut files = UploadedFiles::new();
        files.insert("docs[][scan]", file("s1.pdf"));
        assert_eq!(files.get("docs[0][scan]").unwrap().file_name(), Some("s1.pdf"));
    }
}

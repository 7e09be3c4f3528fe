/// Extension-based file classification.
///
/// This module maps file extensions to category names (e.g. "images",
/// "documents"). The table is built once, from the built-in defaults or from
/// user configuration, and never changes while a pass is running.
///
/// # Examples
///
/// ```
/// use tidysort::category::CategoryTable;
///
/// let table = CategoryTable::default();
/// assert_eq!(table.classify(Some("PNG")), "images");
/// assert_eq!(table.classify(Some(".pdf")), "pdf");
/// assert_eq!(table.classify(Some("xyz")), "others");
/// assert_eq!(table.classify(None), "noext");
/// ```
use std::collections::{BTreeMap, HashMap};
use std::path::Path;

/// Category for extensions missing from the table.
pub const OTHERS: &str = "others";

/// Category for files without any extension.
pub const NO_EXTENSION: &str = "noext";

/// Built-in category definitions: category name and its extensions.
const DEFAULT_CATEGORIES: &[(&str, &[&str])] = &[
    ("pdf", &["pdf"]),
    (
        "images",
        &[
            "jpg", "jpeg", "png", "gif", "bmp", "webp", "tiff", "svg", "heic", "ico",
        ],
    ),
    (
        "archives",
        &["zip", "tar", "gz", "tar.gz", "tgz", "bz2", "xz", "rar", "7z"],
    ),
    (
        "documents",
        &[
            "doc", "docx", "xls", "xlsx", "ppt", "pptx", "odt", "ods", "odp", "rtf", "txt", "md",
            "csv",
        ],
    ),
    ("videos", &["mp4", "avi", "mkv", "mov", "wmv", "flv", "webm"]),
    ("audio", &["mp3", "wav", "flac", "aac", "ogg", "m4a"]),
    (
        "code",
        &[
            "py", "js", "ts", "java", "c", "cpp", "h", "go", "rs", "sh", "json", "xml", "yaml",
            "yml", "toml",
        ],
    ),
    ("installers", &["exe", "msi", "deb", "rpm", "dmg", "pkg", "appimage"]),
    ("fonts", &["ttf", "otf", "woff", "woff2"]),
    ("ebooks", &["epub", "mobi", "azw3"]),
];

/// Lower-cases an extension and strips any leading dots.
pub fn normalize_extension(ext: &str) -> String {
    ext.trim_start_matches('.').to_lowercase()
}

/// Maps file extensions to category names.
///
/// Lookups are case-insensitive. Extensions may be compound (`tar.gz`); see
/// [`CategoryTable::classify_path`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryTable {
    extension_map: HashMap<String, String>,
}

impl CategoryTable {
    /// Creates an empty table. Every lookup resolves to `others` or `noext`.
    pub fn empty() -> Self {
        Self {
            extension_map: HashMap::new(),
        }
    }

    /// Builds a table from a category → extensions mapping.
    ///
    /// When an extension is listed under several categories, the category
    /// that sorts first by name keeps it.
    ///
    /// ```
    /// use std::collections::BTreeMap;
    /// use tidysort::category::CategoryTable;
    ///
    /// let mut categories = BTreeMap::new();
    /// categories.insert("images".to_string(), vec!["jpg".to_string()]);
    /// let table = CategoryTable::from_categories(&categories);
    /// assert_eq!(table.classify(Some("JPG")), "images");
    /// assert_eq!(table.classify(Some("txt")), "others");
    /// ```
    pub fn from_categories(categories: &BTreeMap<String, Vec<String>>) -> Self {
        let mut table = Self::empty();
        for (category, extensions) in categories {
            for ext in extensions {
                table.add_extension_mapping(ext, category);
            }
        }
        table
    }

    /// Returns the built-in categories as a name → extensions mapping.
    pub fn default_categories() -> BTreeMap<String, Vec<String>> {
        DEFAULT_CATEGORIES
            .iter()
            .map(|(name, exts)| {
                (
                    name.to_string(),
                    exts.iter().map(|e| e.to_string()).collect(),
                )
            })
            .collect()
    }

    /// Adds an extension mapping unless the extension is already mapped.
    ///
    /// Returns false when the extension was already claimed.
    pub fn add_extension_mapping(&mut self, ext: &str, category: &str) -> bool {
        let key = normalize_extension(ext);
        if key.is_empty() || self.extension_map.contains_key(&key) {
            return false;
        }
        self.extension_map.insert(key, category.to_string());
        true
    }

    /// Looks up an extension without applying the fallback categories.
    pub fn lookup(&self, ext: &str) -> Option<&str> {
        self.extension_map
            .get(&normalize_extension(ext))
            .map(String::as_str)
    }

    /// Resolves an extension to a category.
    ///
    /// `None` or an empty extension yields `noext`; an unknown one yields
    /// `others`. Never fails.
    pub fn classify(&self, extension: Option<&str>) -> &str {
        match extension.map(normalize_extension) {
            None => NO_EXTENSION,
            Some(ext) if ext.is_empty() => NO_EXTENSION,
            Some(ext) => self
                .extension_map
                .get(&ext)
                .map(String::as_str)
                .unwrap_or(OTHERS),
        }
    }

    /// Classifies a path by its file name.
    ///
    /// Compound suffixes are tried longest first, so `backup.tar.gz` matches a
    /// `tar.gz` entry before falling back to `gz`. A leading dot on a hidden
    /// file (`.bashrc`) does not count as an extension.
    pub fn classify_path(&self, path: &Path) -> &str {
        let Some(name) = path.file_name().map(|n| n.to_string_lossy()) else {
            return NO_EXTENSION;
        };
        let name = name.trim_start_matches('.');

        let mut suffixes = name.match_indices('.').map(|(i, _)| &name[i + 1..]);
        let first = suffixes.next();
        for suffix in first.into_iter().chain(suffixes) {
            if let Some(category) = self.lookup(suffix) {
                return category;
            }
        }

        self.classify(path.extension().and_then(|e| e.to_str()).filter(|_| first.is_some()))
    }

    /// Returns the number of mapped extensions.
    pub fn len(&self) -> usize {
        self.extension_map.len()
    }

    /// Returns true when no extension is mapped.
    pub fn is_empty(&self) -> bool {
        self.extension_map.is_empty()
    }

    /// Lists the distinct category names in sorted order.
    pub fn categories(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.extension_map.values().map(String::as_str).collect();
        names.sort_unstable();
        names.dedup();
        names
    }
}

impl Default for CategoryTable {
    fn default() -> Self {
        Self::from_categories(&Self::default_categories())
    }
}

/// Guesses an extension from a file's leading bytes.
///
/// Used for files that carry no extension at all. Only the first few KiB are
/// read.
pub fn sniff_extension(path: &Path) -> Option<&'static str> {
    infer::get_from_path(path)
        .ok()
        .flatten()
        .map(|kind| kind.extension())
}

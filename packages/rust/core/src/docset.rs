//! A docset on disk: file inventory, xref map, and the filesystem
//! [`ContentResolver`].

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use tracing::{debug, info, instrument, warn};
use walkdir::{DirEntry, WalkDir};

use docgraph_markdown::front_matter;
use docgraph_shared::{
    AppConfig, ContentResolver, DependencyKind, Diagnostic, DocGraphError, FileId, GraphConfig,
    MonikerMap, MonikerProvider, ResolvedContent, ResolvedLink, ResolvedXref, Result, codes,
    split_link,
};

/// Front matter facts the docset keeps about each markdown page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageInfo {
    pub uid: Option<String>,
    pub title: Option<String>,
    pub moniker_range: Option<String>,
}

#[derive(Debug)]
pub struct Docset {
    root: PathBuf,
    config: GraphConfig,
    /// Every non-hidden file; markdown files carry their page info.
    files: BTreeMap<FileId, Option<PageInfo>>,
    xrefs: HashMap<String, FileId>,
}

impl Docset {
    /// Scan `root`, skipping hidden files and directories.
    #[instrument(skip_all, fields(root = %root.display()))]
    pub fn open(root: &Path, config: &AppConfig) -> Result<Self> {
        if !root.is_dir() {
            return Err(DocGraphError::config(format!(
                "docset root {} is not a directory",
                root.display()
            )));
        }

        let mut files = BTreeMap::new();
        let walker = WalkDir::new(root)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| entry.depth() == 0 || !is_hidden(entry));
        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!(error = %e, "skipping unreadable entry");
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }
            let Ok(relative) = entry.path().strip_prefix(root) else {
                continue;
            };
            let file = FileId::new(relative.to_string_lossy());
            let info = match file.extension().as_deref() {
                Some("md") => Some(read_page_info(entry.path())),
                _ => None,
            };
            files.insert(file, info);
        }

        let mut xrefs: HashMap<String, FileId> = HashMap::new();
        for (file, info) in &files {
            let Some(uid) = info.as_ref().and_then(|info| info.uid.as_ref()) else {
                continue;
            };
            match xrefs.get(uid) {
                Some(first) => warn!(uid, first = %first, duplicate = %file, "duplicate uid, keeping first"),
                None => {
                    xrefs.insert(uid.clone(), file.clone());
                }
            }
        }

        info!(files = files.len(), xrefs = xrefs.len(), "docset scanned");
        Ok(Self {
            root: root.to_path_buf(),
            config: GraphConfig::from(config),
            files,
            xrefs,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn contains(&self, file: &FileId) -> bool {
        self.files.contains_key(file)
    }

    /// Every file, in path order.
    pub fn files(&self) -> impl Iterator<Item = &FileId> {
        self.files.keys()
    }

    pub fn page_info(&self, file: &FileId) -> Option<&PageInfo> {
        self.files.get(file).and_then(Option::as_ref)
    }

    /// Files whose name marks them as TOCs, in path order.
    pub fn toc_files(&self) -> Vec<FileId> {
        self.files
            .keys()
            .filter(|file| self.config.is_toc_name(file.file_name()))
            .cloned()
            .collect()
    }

    /// Absolute path of a docset file.
    pub fn path_of(&self, file: &FileId) -> PathBuf {
        self.root.join(file.as_str())
    }

    /// Monikers of every page that declares a `monikerRange`.
    ///
    /// Pages with an invalid range are left out and reported.
    pub fn moniker_map(&self, provider: &dyn MonikerProvider) -> (MonikerMap, Vec<Diagnostic>) {
        let mut map = MonikerMap::new();
        let mut errors = Vec::new();
        for (file, info) in &self.files {
            let Some(range) = info.as_ref().and_then(|info| info.moniker_range.as_deref()) else {
                continue;
            };
            match provider.file_level_monikers(file, Some(range)) {
                Ok(monikers) => map.insert(file.clone(), monikers),
                Err(diagnostic) => errors.push(diagnostic.locate(file, None)),
            }
        }
        debug!(versioned = map.len(), errors = errors.len(), "built moniker map");
        (map, errors)
    }

    fn locate(&self, path: &str, relative_to: &FileId) -> std::result::Result<FileId, Diagnostic> {
        relative_to.resolve(path).ok_or_else(|| {
            Diagnostic::warning(
                codes::LINK_OUT_OF_DOCSET,
                format!("'{path}' points outside the docset"),
            )
        })
    }
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry
        .file_name()
        .to_str()
        .is_some_and(|name| name.starts_with('.'))
}

/// Front matter facts of one page. A page that cannot be read keeps an empty
/// record; reading it again through the resolver reports the failure.
fn read_page_info(path: &Path) -> PageInfo {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "page unreadable, indexing without front matter");
            return PageInfo::default();
        }
    };
    let Some(yaml) = front_matter::split(&content).yaml else {
        return PageInfo::default();
    };
    let map = match front_matter::parse(yaml) {
        Ok(map) => map,
        Err(reason) => {
            // Rendering the page reports this with a location.
            debug!(path = %path.display(), %reason, "unreadable front matter");
            return PageInfo::default();
        }
    };
    let text = |key: &str| map.get(key).and_then(|v| v.as_str()).map(str::to_string);
    PageInfo {
        uid: text("uid"),
        title: text("title"),
        moniker_range: text("monikerRange"),
    }
}

impl ContentResolver for Docset {
    fn read_file(&self, file: &FileId) -> std::result::Result<String, Diagnostic> {
        if !self.contains(file) {
            return Err(Diagnostic::error(
                codes::FILE_NOT_FOUND,
                format!("file '{file}' not found"),
            ));
        }
        std::fs::read_to_string(self.path_of(file)).map_err(|e| {
            Diagnostic::error(codes::UNEXPECTED_FAILURE, format!("failed to read '{file}': {e}"))
        })
    }

    fn resolve_content(
        &self,
        path: &str,
        relative_to: &FileId,
        kind: DependencyKind,
    ) -> std::result::Result<ResolvedContent, Diagnostic> {
        let (target, _) = split_link(path);
        let file = self
            .locate(target, relative_to)
            .map_err(|d| Diagnostic::error(&d.code, d.message))?;
        if !self.contains(&file) {
            let what = match kind {
                DependencyKind::Include => "included file",
                DependencyKind::TocInclude => "included TOC",
            };
            return Err(Diagnostic::error(
                codes::FILE_NOT_FOUND,
                format!("{what} '{target}' not found"),
            ));
        }
        let content = self.read_file(&file)?;
        Ok(ResolvedContent { content, file })
    }

    fn resolve_link(
        &self,
        path: &str,
        relative_to: &FileId,
        display_relative_to: &FileId,
    ) -> std::result::Result<ResolvedLink, Diagnostic> {
        let (target, suffix) = split_link(path);
        if target.is_empty() {
            return Ok(ResolvedLink {
                href: path.to_string(),
                file: None,
            });
        }
        let file = self.locate(target, relative_to)?;
        if !self.contains(&file) {
            return Err(Diagnostic::warning(
                codes::FILE_NOT_FOUND,
                format!("link target '{target}' not found"),
            ));
        }
        Ok(ResolvedLink {
            href: format!("{}{suffix}", file.href_from(display_relative_to)),
            file: Some(file),
        })
    }

    fn resolve_xref(
        &self,
        uid: &str,
        _current: &FileId,
        root: &FileId,
    ) -> std::result::Result<ResolvedXref, Diagnostic> {
        let file = self.xrefs.get(uid).ok_or_else(|| {
            Diagnostic::warning(codes::XREF_NOT_FOUND, format!("cross reference '{uid}' not found"))
        })?;
        let display = self
            .page_info(file)
            .and_then(|info| info.title.clone())
            .unwrap_or_else(|| uid.to_string());
        Ok(ResolvedXref {
            href: file.href_from(root),
            display,
            file: file.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::moniker::OrderedMonikers;

    fn fixture_root() -> PathBuf {
        Path::new(env!("CARGO_MANIFEST_DIR")).join("../../../fixtures/docset")
    }

    fn write(root: &Path, path: &str, content: &str) {
        let full = root.join(path);
        if let Some(parent) = full.parent() {
            std::fs::create_dir_all(parent).expect("create dirs");
        }
        std::fs::write(full, content).expect("write file");
    }

    #[test]
    fn scan_skips_hidden_entries() {
        let dir = tempfile::tempdir().expect("tempdir");
        write(dir.path(), "index.md", "# Home\n");
        write(dir.path(), "guide/toc.md", "# [Home](../index.md)\n");
        write(dir.path(), ".git/config", "");
        write(dir.path(), "guide/.draft.md", "");

        let docset = Docset::open(dir.path(), &AppConfig::default()).expect("open");
        let files: Vec<&str> = docset.files().map(FileId::as_str).collect();
        assert_eq!(files, vec!["guide/toc.md", "index.md"]);
        assert_eq!(docset.toc_files(), vec![FileId::new("guide/toc.md")]);
    }

    #[test]
    fn undecodable_page_does_not_stop_the_scan() {
        let dir = tempfile::tempdir().expect("tempdir");
        write(dir.path(), "toc.md", "# [A](a.md)\n# [Latin](latin1.md)\n");
        write(dir.path(), "a.md", "---\nuid: a\n---\n# A\n");
        std::fs::write(dir.path().join("latin1.md"), b"# Caf\xe9\n").expect("write file");

        let docset = Docset::open(dir.path(), &AppConfig::default()).expect("open");
        let latin = FileId::new("latin1.md");
        assert!(docset.contains(&latin));
        assert_eq!(docset.page_info(&latin), Some(&PageInfo::default()));
        assert!(docset.page_info(&FileId::new("a.md")).is_some_and(|p| p.uid.as_deref() == Some("a")));

        let err = docset.read_file(&latin).unwrap_err();
        assert_eq!(err.code, codes::UNEXPECTED_FAILURE);
        assert!(err.is_error());
    }

    #[test]
    fn open_rejects_missing_root() {
        let dir = tempfile::tempdir().expect("tempdir");
        let err = Docset::open(&dir.path().join("nope"), &AppConfig::default()).unwrap_err();
        assert!(matches!(err, DocGraphError::Config { .. }));
    }

    #[test]
    fn fixture_xrefs_and_links() {
        let docset = Docset::open(&fixture_root(), &AppConfig::default()).expect("open fixture");

        let xref = docset
            .resolve_xref("guide.install", &FileId::new("toc.md"), &FileId::new("toc.md"))
            .expect("xref");
        assert_eq!(xref.href, "guide/install.html");
        assert_eq!(xref.display, "Install widgets");

        let link = docset
            .resolve_link("../api/client.md#usage", &FileId::new("guide/toc.yml"), &FileId::new("toc.md"))
            .expect("link");
        assert_eq!(link.href, "api/client.html#usage");

        let outside = docset
            .resolve_link("../../etc/passwd", &FileId::new("guide/toc.yml"), &FileId::new("toc.md"))
            .unwrap_err();
        assert_eq!(outside.code, codes::LINK_OUT_OF_DOCSET);

        let missing = docset
            .resolve_content("nope.md", &FileId::new("index.md"), DependencyKind::Include)
            .unwrap_err();
        assert!(missing.is_error());
        assert_eq!(missing.code, codes::FILE_NOT_FOUND);
    }

    #[test]
    fn fixture_toc_files() {
        let docset = Docset::open(&fixture_root(), &AppConfig::default()).expect("open fixture");
        assert_eq!(
            docset.toc_files(),
            vec![
                FileId::new("api/toc.md"),
                FileId::new("guide/toc.yml"),
                FileId::new("toc.md"),
            ]
        );
        assert!(docset.read_file(&FileId::new("index.md")).expect("read").contains("Welcome"));
    }

    #[test]
    fn moniker_map_covers_versioned_pages() {
        let dir = tempfile::tempdir().expect("tempdir");
        write(dir.path(), "a.md", "---\nmonikerRange: '>= v2'\n---\n# A\n");
        write(dir.path(), "b.md", "# B\n");
        write(dir.path(), "c.md", "---\nmonikerRange: v9\n---\n# C\n");

        let docset = Docset::open(dir.path(), &AppConfig::default()).expect("open");
        let provider = OrderedMonikers::new(vec!["v1".into(), "v2".into(), "v3".into()]);
        let (map, errors) = docset.moniker_map(&provider);

        assert_eq!(map.get(&FileId::new("a.md")), Some(&["v2".to_string(), "v3".to_string()][..]));
        assert_eq!(map.get(&FileId::new("b.md")), None);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].file, Some(FileId::new("c.md")));
    }
}

//! File categorization and scope resolution
//!
//! Pure, deterministic, input-order-preserving functions mapping upstream
//! file records to semantic categories via case-insensitive substring and
//! extension matching against the filename and declared path. A file may
//! match more than one category; categories are not deduplicated across
//! each other, but resolved job lists are deduplicated by file id.

use std::collections::HashSet;

use crate::types::{Category, FileRef, Scope};

/// Extensions that mark a file as a figure on their own
const FIGURE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "tiff", "gif", "svg", "eps"];

/// Extensions that mark a file as supplementary data
const SUPPLEMENTARY_EXTENSIONS: &[&str] = &["xlsx", "csv", "zip"];

/// Extensions that mark a file as manuscript text
const MANUSCRIPT_EXTENSIONS: &[&str] = &["doc", "docx", "tex"];

/// Extensions that mark a file as structured metadata
const METADATA_EXTENSIONS: &[&str] = &["xml", "json"];

/// Lowercase extension of a filename, if any
fn extension(name: &str) -> Option<String> {
    name.rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .filter(|ext| !ext.is_empty())
}

/// Whether the declared path looks like it belongs to graphics content.
/// Used to decide which pdfs count as figures rather than manuscript text.
fn graphic_ish_path(path: &str) -> bool {
    path.contains("figure") || path.contains("/fig") || path.contains("image")
}

/// Whether a file is thumbnail/preview-like.
///
/// Thumbnail-like files are render artifacts, not content: they never count
/// as figures and are excluded from the essential set no matter which other
/// categories they match.
pub fn is_thumbnail_like(file: &FileRef) -> bool {
    let name = file.name.to_ascii_lowercase();
    let path = file.uri.to_ascii_lowercase();
    name.contains("thumb") || name.contains("preview") || path.contains("/thumb")
}

/// Whether a file belongs to the given category
pub fn matches_category(file: &FileRef, category: Category) -> bool {
    let name = file.name.to_ascii_lowercase();
    let path = file.uri.to_ascii_lowercase();
    let ext = extension(&name);
    let ext = ext.as_deref();

    // A thumbnail-like file is never a figure, whatever else says it is
    if category == Category::Figure && is_thumbnail_like(file) {
        return false;
    }

    // Declared type hints from the upstream count toward the hinted category
    if let Some(hint) = &file.file_type
        && hint.eq_ignore_ascii_case(category.as_str())
    {
        return true;
    }

    match category {
        Category::Figure => {
            path.contains("/figure")
                || name.contains("figure")
                || ext.is_some_and(|e| FIGURE_EXTENSIONS.contains(&e))
                || (ext == Some("pdf") && graphic_ish_path(&path))
        }
        Category::Supplementary => {
            path.contains("/suppl_data/")
                || name.contains("supplement")
                || name.contains("data")
                || ext.is_some_and(|e| SUPPLEMENTARY_EXTENSIONS.contains(&e))
        }
        Category::Manuscript => {
            name.contains("manuscript")
                || path.contains("/manuscript")
                || ext.is_some_and(|e| MANUSCRIPT_EXTENSIONS.contains(&e))
                // pdfs default to manuscript text unless their path says graphics
                || (ext == Some("pdf") && !graphic_ish_path(&path))
        }
        Category::Metadata => {
            name.contains("metadata") || ext.is_some_and(|e| METADATA_EXTENSIONS.contains(&e))
        }
        Category::Thumbnail => is_thumbnail_like(file),
    }
}

/// All categories a file belongs to, in declaration order
pub fn categories_for(file: &FileRef) -> Vec<Category> {
    [
        Category::Manuscript,
        Category::Figure,
        Category::Supplementary,
        Category::Metadata,
        Category::Thumbnail,
    ]
    .into_iter()
    .filter(|category| matches_category(file, *category))
    .collect()
}

/// The essential subset: (manuscript ∪ figure ∪ supplementary) − thumbnail-like,
/// deduplicated by file id, input order preserved
pub fn essential_files(files: &[FileRef]) -> Vec<FileRef> {
    dedup_by_id(files.iter().filter(|file| {
        !is_thumbnail_like(file)
            && (matches_category(file, Category::Manuscript)
                || matches_category(file, Category::Figure)
                || matches_category(file, Category::Supplementary))
    }))
}

/// Resolve the file set an export job targets.
///
/// `all` selects every file; a named scope selects that category's set;
/// `essential` (the default) selects the essential union; `custom` selects
/// files whose decimal id or name appears in the caller-supplied set
/// (names compared case-insensitively).
pub fn resolve_scope(files: &[FileRef], scope: &Scope) -> Vec<FileRef> {
    match scope {
        Scope::All => dedup_by_id(files.iter()),
        Scope::Essential => essential_files(files),
        Scope::Manuscript => filter_category(files, Category::Manuscript),
        Scope::Figures => filter_category(files, Category::Figure),
        Scope::Supplementary => filter_category(files, Category::Supplementary),
        Scope::Metadata => filter_category(files, Category::Metadata),
        Scope::Custom(selected) => {
            let selectors: HashSet<String> =
                selected.iter().map(|s| s.to_ascii_lowercase()).collect();
            dedup_by_id(files.iter().filter(|file| {
                selectors.contains(&file.id.to_string())
                    || selectors.contains(&file.name.to_ascii_lowercase())
            }))
        }
    }
}

fn filter_category(files: &[FileRef], category: Category) -> Vec<FileRef> {
    dedup_by_id(files.iter().filter(|file| matches_category(file, category)))
}

fn dedup_by_id<'a>(files: impl Iterator<Item = &'a FileRef>) -> Vec<FileRef> {
    let mut seen = HashSet::new();
    files
        .filter(|file| seen.insert(file.id))
        .cloned()
        .collect()
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    fn file(id: i64, name: &str, uri: &str) -> FileRef {
        FileRef {
            id,
            name: name.to_string(),
            uri: uri.to_string(),
            file_type: None,
        }
    }

    fn sample_files() -> Vec<FileRef> {
        vec![
            file(1, "manuscript_v3.docx", "/content/ms-1/manuscript_v3.docx"),
            file(2, "Figure1.png", "/content/ms-1/figures/Figure1.png"),
            file(3, "fig2.pdf", "/content/ms-1/figures/fig2.pdf"),
            file(4, "supplement_tables.xlsx", "/content/ms-1/suppl_data/supplement_tables.xlsx"),
            file(5, "metadata.xml", "/content/ms-1/metadata.xml"),
            file(6, "figure1_thumb.jpg", "/content/ms-1/thumbs/figure1_thumb.jpg"),
            file(7, "main_text.pdf", "/content/ms-1/main_text.pdf"),
        ]
    }

    #[test]
    fn figures_match_by_extension_and_path() {
        let files = sample_files();
        assert!(matches_category(&files[1], Category::Figure));
        // pdf counts as figure only with a graphic-ish path
        assert!(matches_category(&files[2], Category::Figure));
        assert!(!matches_category(&files[6], Category::Figure));
    }

    #[test]
    fn pdf_outside_figure_path_is_manuscript() {
        let files = sample_files();
        assert!(matches_category(&files[6], Category::Manuscript));
        assert!(!matches_category(&files[2], Category::Manuscript));
    }

    #[test]
    fn supplementary_matches_path_name_and_extension() {
        assert!(matches_category(
            &file(10, "supplement_notes.txt", "/x/supplement_notes.txt"),
            Category::Supplementary
        ));
        assert!(matches_category(
            &file(11, "results.csv", "/x/results.csv"),
            Category::Supplementary
        ));
        assert!(matches_category(
            &file(12, "tables.bin", "/content/suppl_data/tables.bin"),
            Category::Supplementary
        ));
    }

    #[test]
    fn declared_type_hint_counts() {
        let mut f = file(20, "oddly_named.bin", "/x/oddly_named.bin");
        f.file_type = Some("Figure".to_string());
        assert!(matches_category(&f, Category::Figure));
    }

    #[test]
    fn a_file_may_match_multiple_categories() {
        // xlsx named "data" with a figure-ish path: supplementary and figure
        let f = file(30, "figure_data.xlsx", "/content/figures/figure_data.xlsx");
        let cats = categories_for(&f);
        assert!(cats.contains(&Category::Figure));
        assert!(cats.contains(&Category::Supplementary));
    }

    #[test]
    fn categorizer_is_idempotent() {
        let files = sample_files();
        let first: Vec<_> = files.iter().map(categories_for).collect();
        let second: Vec<_> = files.iter().map(categories_for).collect();
        assert_eq!(first, second);
    }

    #[test]
    fn essential_excludes_thumbnail_like_files() {
        let files = sample_files();
        let essential = essential_files(&files);
        let ids: Vec<i64> = essential.iter().map(|f| f.id).collect();
        assert!(ids.contains(&1), "manuscript is essential");
        assert!(ids.contains(&2), "figure is essential");
        assert!(ids.contains(&4), "supplementary data is essential");
        assert!(!ids.contains(&6), "thumbnail is not essential");
        assert!(!ids.contains(&5), "metadata is not essential");
    }

    #[test]
    fn thumbnail_like_files_stay_out_of_figure_and_essential_scopes() {
        // Name and extension both scream "figure"; thumbnail-likeness wins
        let thumb = file(40, "figure1_thumb.jpg", "/content/ms-1/thumbs/figure1_thumb.jpg");
        assert!(!matches_category(&thumb, Category::Figure));
        assert!(matches_category(&thumb, Category::Thumbnail));

        // An upstream type hint does not resurrect it either
        let mut hinted = file(41, "fig_preview.png", "/content/ms-1/fig_preview.png");
        hinted.file_type = Some("Figure".to_string());
        assert!(!matches_category(&hinted, Category::Figure));

        let files = vec![thumb, hinted];
        assert!(resolve_scope(&files, &Scope::Figures).is_empty());
        assert!(resolve_scope(&files, &Scope::Essential).is_empty());
    }

    #[test]
    fn resolve_scope_preserves_input_order() {
        let files = sample_files();
        let all = resolve_scope(&files, &Scope::All);
        let ids: Vec<i64> = all.iter().map(|f| f.id).collect();
        assert_eq!(ids, vec![1, 2, 3, 4, 5, 6, 7]);
    }

    #[test]
    fn resolve_named_scopes() {
        let files = sample_files();
        let figures = resolve_scope(&files, &Scope::Figures);
        assert_eq!(
            figures.iter().map(|f| f.id).collect::<Vec<_>>(),
            vec![2, 3]
        );

        let metadata = resolve_scope(&files, &Scope::Metadata);
        assert_eq!(metadata.iter().map(|f| f.id).collect::<Vec<_>>(), vec![5]);
    }

    #[test]
    fn resolve_custom_scope_by_id_and_name() {
        let files = sample_files();
        let scope = Scope::Custom(vec!["2".to_string(), "metadata.xml".to_string()]);
        let selected = resolve_scope(&files, &scope);
        assert_eq!(
            selected.iter().map(|f| f.id).collect::<Vec<_>>(),
            vec![2, 5]
        );
    }

    #[test]
    fn custom_scope_with_no_match_is_empty() {
        let files = sample_files();
        let scope = Scope::Custom(vec!["999".to_string()]);
        assert!(resolve_scope(&files, &scope).is_empty());
    }
}

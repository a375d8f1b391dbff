//! Page accumulation into fixed-size dump documents

use crate::config::BlockSize;
use crate::schema::{ColumnInfo, DumpDocument, QueryPage, Row};
use tracing::warn;

/// Groups consecutive query pages into documents of at most `BLOCKSIZE`
/// pages.
///
/// The column layout of a document is the one of its first page. A later
/// page with a different layout is counted in [`column_mismatches`]
/// but still appended, so its rows are attributed to the first page's
/// columns.
///
/// [`column_mismatches`]: ChunkAccumulator::column_mismatches
#[derive(Debug)]
pub struct ChunkAccumulator {
    block_size: usize,
    pages_in_chunk: usize,
    column_info: Option<Vec<ColumnInfo>>,
    rows: Vec<Row>,
    column_mismatches: usize,
}

impl ChunkAccumulator {
    pub fn new(block_size: BlockSize) -> Self {
        Self {
            block_size: block_size.get(),
            pages_in_chunk: 0,
            column_info: None,
            rows: Vec::new(),
            column_mismatches: 0,
        }
    }

    /// Add one page; returns the completed document when the page count
    /// reaches the block size.
    pub fn push(&mut self, page: QueryPage) -> Option<DumpDocument> {
        self.pages_in_chunk += 1;
        if let Some(captured) = &self.column_info {
            if *captured != page.column_info {
                self.column_mismatches += 1;
                warn!(
                    page_in_chunk = self.pages_in_chunk,
                    expected_columns = captured.len(),
                    page_columns = page.column_info.len(),
                    "Page column layout differs from the first page of its chunk"
                );
            }
        } else {
            self.column_info = Some(page.column_info);
        }
        self.rows.extend(page.rows);

        if self.pages_in_chunk >= self.block_size {
            Some(self.take())
        } else {
            None
        }
    }

    /// Flush the trailing partial chunk, if it holds any row.
    pub fn finish(&mut self) -> Option<DumpDocument> {
        if self.rows.is_empty() {
            self.pages_in_chunk = 0;
            self.column_info = None;
            return None;
        }
        Some(self.take())
    }

    pub fn buffered_rows(&self) -> usize {
        self.rows.len()
    }

    /// Pages seen whose layout differed from their chunk's first page.
    pub fn column_mismatches(&self) -> usize {
        self.column_mismatches
    }

    fn take(&mut self) -> DumpDocument {
        self.pages_in_chunk = 0;
        DumpDocument {
            rows: std::mem::take(&mut self.rows),
            column_info: self.column_info.take().unwrap_or_default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Datum;

    fn columns(names: &[&str]) -> Vec<ColumnInfo> {
        names.iter().map(|n| ColumnInfo::scalar(*n, "VARCHAR")).collect()
    }

    fn page(tag: &str, rows: usize, cols: &[&str]) -> QueryPage {
        QueryPage::new(
            columns(cols),
            (0..rows)
                .map(|i| Row::new(vec![Datum::scalar(format!("{tag}-{i}"))]))
                .collect(),
        )
    }

    #[test]
    fn test_flushes_every_block_size_pages() {
        let mut acc = ChunkAccumulator::new(BlockSize::new(2).unwrap());
        assert!(acc.push(page("a", 3, &["x"])).is_none());
        assert_eq!(acc.buffered_rows(), 3);

        let doc = acc.push(page("b", 1, &["x"])).unwrap();
        assert_eq!(doc.rows.len(), 4);
        assert_eq!(doc.rows[0].data[0], Datum::scalar("a-0"));
        assert_eq!(doc.rows[3].data[0], Datum::scalar("b-0"));
        assert_eq!(acc.buffered_rows(), 0);

        assert!(acc.push(page("c", 2, &["x"])).is_none());
        let last = acc.finish().unwrap();
        assert_eq!(last.rows.len(), 2);
        assert!(acc.finish().is_none());
    }

    #[test]
    fn test_block_size_one_emits_each_page() {
        let mut acc = ChunkAccumulator::new(BlockSize::new(1).unwrap());
        assert!(acc.push(page("a", 1, &["x"])).is_some());
        assert!(acc.push(page("b", 1, &["x"])).is_some());
        assert!(acc.finish().is_none());
    }

    #[test]
    fn test_column_info_taken_from_first_page_of_each_chunk() {
        let mut acc = ChunkAccumulator::new(BlockSize::new(2).unwrap());
        acc.push(page("a", 1, &["first"]));
        let doc = acc.push(page("b", 1, &["other"])).unwrap();
        assert_eq!(doc.column_info, columns(&["first"]));
        assert_eq!(acc.column_mismatches(), 1);

        acc.push(page("c", 1, &["second"]));
        let doc = acc.finish().unwrap();
        assert_eq!(doc.column_info, columns(&["second"]));
        assert_eq!(acc.column_mismatches(), 1);
    }

    #[test]
    fn test_full_chunk_of_empty_pages_is_still_emitted() {
        let mut acc = ChunkAccumulator::new(BlockSize::new(2).unwrap());
        assert!(acc.push(page("a", 0, &["x"])).is_none());
        let doc = acc.push(page("b", 0, &["x"])).unwrap();
        assert!(doc.rows.is_empty());
    }

    #[test]
    fn test_trailing_empty_pages_are_dropped() {
        let mut acc = ChunkAccumulator::new(BlockSize::new(3).unwrap());
        acc.push(page("a", 0, &["x"]));
        assert!(acc.finish().is_none());
    }
}

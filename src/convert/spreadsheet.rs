//! In-process XLSX output for extracted page text

use std::path::Path;

use rust_xlsxwriter::{Workbook, XlsxError};

pub const SHEET_NAME: &str = "PDF Content";

/// Write `pages` as a single-column sheet
///
/// Each page starts with a `--- Page N ---` row followed by one row per
/// non-blank, trimmed line, and is separated from the next by an empty row.
pub fn write_pages_xlsx(pages: &[String], path: &Path) -> Result<(), XlsxError> {
    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();
    worksheet.set_name(SHEET_NAME)?;
    worksheet.set_column_width(0, 60.0)?;

    let mut row: u32 = 0;
    for (index, text) in pages.iter().enumerate() {
        worksheet.write_string(row, 0, format!("--- Page {} ---", index + 1))?;
        row += 1;
        for line in text.lines().map(str::trim).filter(|l| !l.is_empty()) {
            worksheet.write_string(row, 0, line)?;
            row += 1;
        }
        row += 1;
    }

    workbook.save(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use calamine::{open_workbook, Data, Reader, Xlsx};

    fn first_column(path: &Path) -> Vec<String> {
        let mut workbook: Xlsx<_> = open_workbook(path).unwrap();
        let range = workbook.worksheet_range(SHEET_NAME).unwrap();
        range
            .rows()
            .map(|row| match row.first() {
                Some(Data::String(s)) => s.clone(),
                _ => String::new(),
            })
            .collect()
    }

    #[test]
    fn test_pages_become_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.xlsx");
        let pages = vec![
            "Invoice\n\n  Total, net  \n".to_string(),
            "He said \"hi\"".to_string(),
        ];

        write_pages_xlsx(&pages, &path).unwrap();
        assert_eq!(
            first_column(&path),
            vec![
                "--- Page 1 ---",
                "Invoice",
                "Total, net",
                "",
                "--- Page 2 ---",
                "He said \"hi\"",
            ]
        );
    }

    #[test]
    fn test_empty_page_keeps_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.xlsx");

        write_pages_xlsx(&[String::new(), "last".to_string()], &path).unwrap();
        assert_eq!(
            first_column(&path),
            vec!["--- Page 1 ---", "", "--- Page 2 ---", "last"]
        );
    }
}

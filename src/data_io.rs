use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use chrono::Utc;
use rust_xlsxwriter::{Formula, Workbook, XlsxError};
use serde::Serialize;
use thiserror::Error;
use url::Url;

use crate::types::Candidate;

/// Column order is the output contract; consumers key on the names,
/// case-insensitively.
pub const TABLE_HEADERS: [&str; 9] = [
    "item_id",
    "title",
    "price_jpy",
    "buyout_jpy",
    "detail_url",
    "image_url",
    "image_preview",
    "source_page",
    "title_en",
];

const SHEET_NAME: &str = "Listings";

#[derive(Debug, Error)]
pub enum SinkError {
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Csv(#[from] csv::Error),
    #[error(transparent)]
    Xlsx(#[from] XlsxError),
}

/// Row as it lands in the sinks. The two formula columns hold literal formula
/// text for a spreadsheet application to evaluate, never computed here.
#[derive(Debug, Clone, Serialize)]
struct OutputRow {
    item_id: Option<String>,
    title: Option<String>,
    price_jpy: Option<u64>,
    buyout_jpy: Option<u64>,
    detail_url: Option<String>,
    image_url: Option<String>,
    image_preview: String,
    source_page: String,
    title_en: String,
}

fn output_row(candidate: &Candidate, sheet_row: u32, img_px: u32) -> OutputRow {
    OutputRow {
        item_id: candidate.item_id.clone(),
        title: candidate.title.clone(),
        price_jpy: candidate.price_jpy,
        buyout_jpy: candidate.buyout_jpy,
        detail_url: candidate.detail_url.clone(),
        image_url: candidate.image_url.clone(),
        image_preview: image_preview_formula(sheet_row, img_px),
        source_page: candidate.source_page.clone(),
        title_en: title_translation_formula(sheet_row),
    }
}

/// `F<row>` is the image-url cell on the same row; a zero-length image URL
/// renders as an empty cell instead of a broken image.
pub fn image_preview_formula(sheet_row: u32, img_px: u32) -> String {
    format!("=IF(LEN(F{sheet_row}),IMAGE(F{sheet_row},\"\",3,{img_px},{img_px}),\"\")")
}

/// `B<row>` is the original-language title cell on the same row.
pub fn title_translation_formula(sheet_row: u32) -> String {
    format!("=TRANSLATE(B{sheet_row},\"ja\",\"en\")")
}

/// Excel row heights are in points; 1 px is 0.75 pt at 96 dpi.
pub fn pixels_to_points(px: u32) -> f64 {
    f64::from(px) * 0.75
}

/// Column widths are in characters, roughly 7 px each, plus a little padding.
pub fn pixels_to_col_width(px: u32) -> f64 {
    (f64::from(px) / 7.0 + 2.0).max(18.0)
}

/// Delimited table, UTF-8 with a byte-order mark so spreadsheet applications
/// import it without mangling the original-language titles.
pub struct CsvSink {
    writer: csv::Writer<File>,
    next_sheet_row: u32,
    img_px: u32,
}

impl CsvSink {
    pub fn create(path: &Path, img_px: u32) -> Result<Self, SinkError> {
        let mut file = File::create(path)?;
        file.write_all("\u{feff}".as_bytes())?;
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(file);
        writer.write_record(TABLE_HEADERS)?;
        Ok(Self {
            writer,
            // Header occupies spreadsheet row 1.
            next_sheet_row: 2,
            img_px,
        })
    }

    pub fn write_row(&mut self, candidate: &Candidate) -> Result<(), SinkError> {
        let row = output_row(candidate, self.next_sheet_row, self.img_px);
        self.writer.serialize(row)?;
        self.next_sheet_row += 1;
        Ok(())
    }

    pub fn finalize(&mut self) -> Result<(), SinkError> {
        self.writer.flush()?;
        Ok(())
    }
}

/// Rich spreadsheet mirror of the delimited table: evaluable formula cells,
/// and rows/columns pre-sized so thumbnails render without manual resizing.
pub struct XlsxSink {
    workbook: Workbook,
    path: PathBuf,
    next_index: u32,
    img_px: u32,
}

impl XlsxSink {
    pub fn create(path: &Path, img_px: u32) -> Result<Self, SinkError> {
        // The workbook is only written at finalize; probe the path now so an
        // unwritable target fails before anything is fetched.
        File::create(path)?;
        let mut workbook = Workbook::new();
        let worksheet = workbook.add_worksheet();
        worksheet.set_name(SHEET_NAME)?;
        for (col, header) in TABLE_HEADERS.iter().enumerate() {
            worksheet.write_string(0, col as u16, *header)?;
        }
        worksheet.set_column_width(0, 12)?; // item_id
        worksheet.set_column_width(1, 60)?; // title
        worksheet.set_column_width(2, 12)?; // price_jpy
        worksheet.set_column_width(3, 12)?; // buyout_jpy
        worksheet.set_column_width(4, 36)?; // detail_url
        worksheet.set_column_width(5, 36)?; // image_url
        worksheet.set_column_width(6, pixels_to_col_width(img_px))?; // image_preview
        worksheet.set_column_width(7, 30)?; // source_page
        worksheet.set_column_width(8, 36)?; // title_en
        Ok(Self {
            workbook,
            path: path.to_path_buf(),
            // 0-based; data starts under the header row.
            next_index: 1,
            img_px,
        })
    }

    pub fn write_row(&mut self, candidate: &Candidate) -> Result<(), SinkError> {
        let row = self.next_index;
        let sheet_row = row + 1;
        let img_px = self.img_px;
        let worksheet = self.workbook.worksheet_from_index(0)?;

        if let Some(ref item_id) = candidate.item_id {
            worksheet.write_string(row, 0, item_id)?;
        }
        if let Some(ref title) = candidate.title {
            worksheet.write_string(row, 1, title)?;
        }
        if let Some(price) = candidate.price_jpy {
            worksheet.write_number(row, 2, price as f64)?;
        }
        if let Some(buyout) = candidate.buyout_jpy {
            worksheet.write_number(row, 3, buyout as f64)?;
        }
        if let Some(ref detail_url) = candidate.detail_url {
            worksheet.write_string(row, 4, detail_url)?;
        }
        if let Some(ref image_url) = candidate.image_url {
            worksheet.write_string(row, 5, image_url)?;
        }
        worksheet.write_formula(row, 6, Formula::new(image_preview_formula(sheet_row, img_px)))?;
        worksheet.write_string(row, 7, &candidate.source_page)?;
        worksheet.write_formula(row, 8, Formula::new(title_translation_formula(sheet_row)))?;
        worksheet.set_row_height(row, pixels_to_points(img_px))?;

        self.next_index += 1;
        Ok(())
    }

    pub fn finalize(&mut self) -> Result<(), SinkError> {
        self.workbook.save(&self.path)?;
        Ok(())
    }
}

/// Every active sink receives each accepted record exactly once, in row
/// order. Sinks open before the first fetch and finalize exactly once.
pub struct OutputSinks {
    csv: CsvSink,
    xlsx: Option<XlsxSink>,
}

impl OutputSinks {
    pub fn open(
        csv_path: &Path,
        xlsx_path: Option<&Path>,
        img_px: u32,
    ) -> Result<Self, SinkError> {
        ensure_parent_dir(csv_path)?;
        if let Some(path) = xlsx_path {
            ensure_parent_dir(path)?;
        }
        let csv = CsvSink::create(csv_path, img_px)?;
        let xlsx = xlsx_path
            .map(|path| XlsxSink::create(path, img_px))
            .transpose()?;
        Ok(Self { csv, xlsx })
    }

    pub fn write_row(&mut self, candidate: &Candidate) -> Result<(), SinkError> {
        self.csv.write_row(candidate)?;
        if let Some(ref mut xlsx) = self.xlsx {
            xlsx.write_row(candidate)?;
        }
        Ok(())
    }

    pub fn finalize(&mut self) -> Result<(), SinkError> {
        self.csv.finalize()?;
        if let Some(ref mut xlsx) = self.xlsx {
            xlsx.finalize()?;
        }
        Ok(())
    }
}

fn ensure_parent_dir(path: &Path) -> io::Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)?;
    }
    Ok(())
}

pub fn default_output_path(start_url: &Url) -> String {
    let host = start_url
        .host_str()
        .unwrap_or("listings")
        .chars()
        .map(|ch| {
            if ch.is_ascii_alphanumeric() || ch == '-' {
                ch
            } else {
                '_'
            }
        })
        .collect::<String>();
    let ts = Utc::now().format("%Y%m%d_%H%M%S");
    format!("{host}_{ts}.csv")
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReviewRow {
    pub title: String,
    pub image_url: Option<String>,
    pub detail_url: Option<String>,
}

/// Load a previously written table the way the browsing tool reads it:
/// columns located by case-insensitive name with the known alternates, and
/// `title_en` preferred over `title` only when it holds plain text rather
/// than an unevaluated formula.
pub fn load_review_rows(path: &Path) -> Result<Vec<ReviewRow>, SinkError> {
    let mut reader = csv::Reader::from_path(path)?;
    let headers = reader.headers()?.clone();
    let mut index = HashMap::<String, usize>::new();
    for (idx, header) in headers.iter().enumerate() {
        let name = header.trim_start_matches('\u{feff}').trim();
        index.insert(name.to_ascii_lowercase(), idx);
    }

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        let get = |names: &[&str]| -> Option<String> {
            for name in names {
                if let Some(idx) = index.get(&name.to_ascii_lowercase())
                    && let Some(value) = record.get(*idx)
                {
                    let value = value.trim();
                    if !value.is_empty() {
                        return Some(value.to_string());
                    }
                }
            }
            None
        };

        let title_en = get(&["title_en"]).filter(|value| !value.starts_with('='));
        let title = title_en.or_else(|| get(&["title"])).unwrap_or_default();
        let image_url = get(&["image_url", "image", "image link"]);
        let detail_url = get(&["detail_url"]);
        if title.is_empty() && image_url.is_none() && detail_url.is_none() {
            continue;
        }
        rows.push(ReviewRow {
            title,
            image_url,
            detail_url,
        });
    }
    Ok(rows)
}

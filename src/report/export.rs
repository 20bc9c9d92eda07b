//! CSV, XLSX and PDF renderings of a monthly report.
//!
//! Every format takes the same rows plus the present-day count and ends with
//! a summary line. An empty report is refused rather than rendered.

use std::io::BufWriter;

use printpdf::{BuiltinFont, Color, IndirectFontRef, Mm, PdfDocument, PdfLayerReference, Rgb, TextMatrix};
use rust_xlsxwriter::{Format, Workbook};
use serde::Deserialize;
use strum::{AsRefStr, Display, EnumString};
use thiserror::Error;
use utoipa::ToSchema;

use super::month::MonthlyReport;
use crate::model::attendance::AttendanceRecord;

pub const HEADERS: [&str; 8] = [
    "Day",
    "Date",
    "Check-in Time",
    "Latitude",
    "Longitude",
    "Distance (m)",
    "Status",
    "Reason",
];

const SUMMARY_LABEL: &str = "Total present days:";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, ToSchema, Display, EnumString, AsRefStr)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ExportFormat {
    Csv,
    Xlsx,
    Pdf,
}

impl ExportFormat {
    pub fn content_type(&self) -> &'static str {
        match self {
            Self::Csv => "text/csv; charset=utf-8",
            Self::Xlsx => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
            Self::Pdf => "application/pdf",
        }
    }
}

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("nothing to export")]
    NothingToExport,
    #[error("failed to render {format} export: {message}")]
    Render { format: ExportFormat, message: String },
}

impl ExportError {
    fn render(format: ExportFormat, message: impl ToString) -> Self {
        Self::Render {
            format,
            message: message.to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ExportedFile {
    pub filename: String,
    pub content_type: &'static str,
    pub bytes: Vec<u8>,
}

/// Flattened record, in [`HEADERS`] order.
#[derive(Debug, Clone, PartialEq)]
pub struct ExportRow {
    pub day: String,
    pub date: String,
    pub time: String,
    pub latitude: f64,
    pub longitude: f64,
    pub distance: f64,
    pub status: String,
    pub reason: String,
}

impl From<&AttendanceRecord> for ExportRow {
    fn from(record: &AttendanceRecord) -> Self {
        Self {
            day: record.date.format("%A").to_string(),
            date: record.date.format("%Y-%m-%d").to_string(),
            time: record.time.clone(),
            latitude: record.latitude,
            longitude: record.longitude,
            distance: record.distance_to_store,
            status: record.status.to_string(),
            reason: record.reason.clone().unwrap_or_default(),
        }
    }
}

impl ExportRow {
    fn cells(&self, coordinate_precision: usize) -> [String; 8] {
        [
            self.day.clone(),
            self.date.clone(),
            self.time.clone(),
            format!("{:.*}", coordinate_precision, self.latitude),
            format!("{:.*}", coordinate_precision, self.longitude),
            format!("{:.1}", self.distance),
            self.status.clone(),
            self.reason.clone(),
        ]
    }
}

/// Renders `report` as `format`.
pub fn export(
    report: &MonthlyReport,
    format: ExportFormat,
    watermark: &str,
) -> Result<ExportedFile, ExportError> {
    if report.records.is_empty() {
        return Err(ExportError::NothingToExport);
    }
    let rows: Vec<ExportRow> = report.records.iter().map(ExportRow::from).collect();
    let present = report.present_days();

    let bytes = match format {
        ExportFormat::Csv => to_csv(&rows, present)?,
        ExportFormat::Xlsx => to_xlsx(&rows, present)?,
        ExportFormat::Pdf => to_pdf(&rows, present, &report.title, watermark)?,
    };

    Ok(ExportedFile {
        filename: format!("attendance-{}-{}.{}", report.month, report.year, format),
        content_type: format.content_type(),
        bytes,
    })
}

pub fn to_csv(rows: &[ExportRow], present_days: usize) -> Result<Vec<u8>, ExportError> {
    let fail = |e: csv::Error| ExportError::render(ExportFormat::Csv, e);

    let mut writer = csv::WriterBuilder::new()
        .quote_style(csv::QuoteStyle::Always)
        .from_writer(Vec::new());
    writer.write_record(HEADERS).map_err(fail)?;
    for row in rows {
        let mut cells = row.cells(6);
        // raw coordinates, as the device reported them
        cells[3] = row.latitude.to_string();
        cells[4] = row.longitude.to_string();
        writer.write_record(&cells).map_err(fail)?;
    }
    let mut out = writer
        .into_inner()
        .map_err(|e| ExportError::render(ExportFormat::Csv, e.error()))?;

    out.extend_from_slice(format!("\nTotal present days: {present_days}\n").as_bytes());
    Ok(out)
}

pub fn to_xlsx(rows: &[ExportRow], present_days: usize) -> Result<Vec<u8>, ExportError> {
    let fail = |e: rust_xlsxwriter::XlsxError| ExportError::render(ExportFormat::Xlsx, e);

    let mut workbook = Workbook::new();
    let bold = Format::new().set_bold();
    let sheet = workbook.add_worksheet();
    sheet.set_name("Attendance Summary").map_err(fail)?;

    for (col, header) in HEADERS.iter().enumerate() {
        sheet
            .write_string_with_format(0, col as u16, *header, &bold)
            .map_err(fail)?;
    }

    for (i, row) in rows.iter().enumerate() {
        let r = i as u32 + 1;
        sheet.write_string(r, 0, &row.day).map_err(fail)?;
        sheet.write_string(r, 1, &row.date).map_err(fail)?;
        sheet.write_string(r, 2, &row.time).map_err(fail)?;
        sheet.write_number(r, 3, row.latitude).map_err(fail)?;
        sheet.write_number(r, 4, row.longitude).map_err(fail)?;
        sheet.write_number(r, 5, row.distance).map_err(fail)?;
        sheet.write_string(r, 6, &row.status).map_err(fail)?;
        sheet.write_string(r, 7, &row.reason).map_err(fail)?;
    }

    // one blank row, then the summary
    let summary_row = rows.len() as u32 + 2;
    sheet
        .write_string_with_format(summary_row, 0, SUMMARY_LABEL, &bold)
        .map_err(fail)?;
    sheet
        .write_number(summary_row, 1, present_days as f64)
        .map_err(fail)?;

    for (col, width) in [14.0, 12.0, 14.0, 12.0, 12.0, 13.0, 11.0, 22.0].into_iter().enumerate() {
        sheet.set_column_width(col as u16, width).map_err(fail)?;
    }

    workbook.save_to_buffer().map_err(fail)
}

const PAGE_WIDTH: f32 = 210.0;
const PAGE_HEIGHT: f32 = 297.0;
const MARGIN: f32 = 14.0;
const ROW_HEIGHT: f32 = 6.0;
const COLUMN_WIDTHS: [f32; 8] = [20.0, 22.0, 22.0, 24.0, 24.0, 20.0, 20.0, 30.0];

pub fn to_pdf(
    rows: &[ExportRow],
    present_days: usize,
    title: &str,
    watermark: &str,
) -> Result<Vec<u8>, ExportError> {
    let fail = |e: printpdf::Error| ExportError::render(ExportFormat::Pdf, format!("{e:?}"));

    let (doc, first_page, first_layer) = PdfDocument::new(
        format!("Attendance {title}"),
        Mm(PAGE_WIDTH),
        Mm(PAGE_HEIGHT),
        "Layer 1",
    );
    let regular = doc.add_builtin_font(BuiltinFont::Helvetica).map_err(fail)?;
    let bold = doc.add_builtin_font(BuiltinFont::HelveticaBold).map_err(fail)?;

    let mut layer = doc.get_page(first_page).get_layer(first_layer);
    draw_watermark(&layer, &regular, watermark);
    layer.use_text(format!("Attendance Report - {title}"), 14.0, Mm(MARGIN), Mm(PAGE_HEIGHT - 12.0), &bold);
    let mut y = PAGE_HEIGHT - 22.0;
    draw_row(&layer, &bold, &HEADERS.map(String::from), y);
    y -= ROW_HEIGHT;

    for row in rows {
        if y < MARGIN + ROW_HEIGHT * 2.0 {
            let (page, page_layer) = doc.add_page(Mm(PAGE_WIDTH), Mm(PAGE_HEIGHT), "Layer 1");
            layer = doc.get_page(page).get_layer(page_layer);
            draw_watermark(&layer, &regular, watermark);
            y = PAGE_HEIGHT - 16.0;
            draw_row(&layer, &bold, &HEADERS.map(String::from), y);
            y -= ROW_HEIGHT;
        }
        draw_row(&layer, &regular, &row.cells(6), y);
        y -= ROW_HEIGHT;
    }

    y -= ROW_HEIGHT;
    layer.use_text(SUMMARY_LABEL, 10.0, Mm(MARGIN), Mm(y), &bold);
    layer.use_text(present_days.to_string(), 10.0, Mm(MARGIN + 66.0), Mm(y), &regular);

    let mut buffer = BufWriter::new(Vec::new());
    doc.save(&mut buffer).map_err(fail)?;
    buffer
        .into_inner()
        .map_err(|e| ExportError::render(ExportFormat::Pdf, e.error()))
}

fn draw_row(layer: &PdfLayerReference, font: &IndirectFontRef, cells: &[String; 8], y: f32) {
    let mut x = MARGIN;
    for (cell, width) in cells.iter().zip(COLUMN_WIDTHS) {
        layer.use_text(cell.as_str(), 8.0, Mm(x), Mm(y), font);
        x += width;
    }
}

/// Repeats `text` diagonally across the whole page in light grey.
fn draw_watermark(layer: &PdfLayerReference, font: &IndirectFontRef, text: &str) {
    if text.is_empty() {
        return;
    }
    layer.set_fill_color(Color::Rgb(Rgb::new(0.9, 0.9, 0.9, None)));
    let mut x = -PAGE_HEIGHT;
    while x < PAGE_WIDTH + PAGE_HEIGHT {
        let mut y = -PAGE_WIDTH;
        while y < PAGE_HEIGHT + PAGE_WIDTH {
            layer.begin_text_section();
            layer.set_font(font, 30.0);
            layer.set_text_matrix(TextMatrix::TranslateRotate(Mm(x).into_pt(), Mm(y).into_pt(), 45.0));
            layer.write_text(text, font);
            layer.end_text_section();
            y += 30.0;
        }
        x += 50.0;
    }
    layer.set_fill_color(Color::Rgb(Rgb::new(0.0, 0.0, 0.0, None)));
}

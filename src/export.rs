//! Excel workbooks for the patient roster and the monitoring tables.
//!
//! Each workbook has a single sheet with one localized header row, every
//! column 20 wide and every cell wrapped.

use chrono::NaiveDate;
use rust_xlsxwriter::{Format, Workbook, Worksheet, XlsxError};

use crate::monitoring::{MonitoringTable, PatientCounts};
use crate::patients::PatientCard;

const COLUMN_WIDTH: f64 = 20.0;
const DATE_FORMAT: &str = "%d.%m.%Y";

const PATIENT_SHEET: &str = "Ruhiy kasallar";
const PATIENT_HEADERS: [&str; 23] = [
    "№",
    "Ф.И.Ш.",
    "ПИНФЛ",
    "Туг.йили",
    "Ҳудуд",
    "Маҳалла",
    "Манзили",
    "Махсус хисобга олиш сабаби",
    "Махсус хисобга олишга изоҳи",
    "Охирги психиатр кабулига келган куни",
    "Охирги шифокор ёки хамшира томонидан уйдаги курик",
    "Агар бир ой ичида кўрилмаган бўлса сабабини қўрсатилсин",
    "Кувватловчи терапия олиниши",
    "Ижтимоий-Маиший муҳит",
    "Алкоголь, наркотик моддалар истемол килиши",
    "Охирги госпитализация",
    "Бемор ҳозирги кунда каерда",
    "Бемор ҳозирги кунда каерда изоҳ",
    "Худуд еки Туман психиатр Ф.И.Ш.",
    "Бириктирилган Ички ишлар ходими",
    "Аҳоли учун хавф туғдираяптими",
    "Муқаддам судланганми",
    "Узоқ муддатга кетганми",
];

const DISTRICT_SHEET: &str = "tuman";
const NEIGHBORHOOD_SHEET: &str = "mahalla";
const TOTALS_LABEL: &str = "Жами";

/// Count headers shared by both monitoring sheets, in row order.
const COUNT_HEADERS: [&str; 8] = [
    "Жами руҳий касаллар сони",
    "Жами тажовузкор руҳий касаллар сони",
    "Жами муқаддам судланган руҳий касаллар сони",
    "Жами узоқ муддатга кетган руҳий касаллар сони",
    "Кейинги текширувни ўтказиб юборган руҳий касаллар сони",
    "Кейинги текширувни ўтказиб юбормаган руҳий касаллар сони",
    "Кейинги текширувни ўтказиб юборган тажовузкор руҳий касаллар сони",
    "Кейинги текширувни ўтказиб юбормаган тажовузкор руҳий касаллар сони",
];

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("Failed to build workbook: {0}")]
    Xlsx(#[from] XlsxError),
}

/// `<prefix>-YYYY-MM-DD.xlsx`
pub fn export_filename(prefix: &str, today: NaiveDate) -> String {
    format!("{prefix}-{}.xlsx", today.format("%Y-%m-%d"))
}

fn yes_no(value: bool) -> &'static str {
    if value {
        "Ҳа"
    } else {
        "Йўқ"
    }
}

fn date_text(date: Option<NaiveDate>) -> String {
    date.map(|d| d.format(DATE_FORMAT).to_string()).unwrap_or_default()
}

/// Hospitalization span as shown in the roster export.
pub fn hospitalization_span(from: Option<NaiveDate>, to: Option<NaiveDate>) -> String {
    match (from, to) {
        (Some(from), None) => format!("{}-хозиргача", from.format(DATE_FORMAT)),
        (Some(from), Some(to)) if from > to => format!("{}-хозиргача", from.format(DATE_FORMAT)),
        (Some(from), Some(to)) => format!("{}-{}", from.format(DATE_FORMAT), to.format(DATE_FORMAT)),
        (None, Some(to)) => format!("номаълум санадан - {}", to.format(DATE_FORMAT)),
        (None, None) => String::new(),
    }
}

/// A sheet writer that applies the shared cell format.
struct Sheet<'a> {
    ws: &'a mut Worksheet,
    wrap: Format,
    row: u32,
}

impl<'a> Sheet<'a> {
    fn new(ws: &'a mut Worksheet, name: &str, headers: &[&str]) -> Result<Self, XlsxError> {
        ws.set_name(name)?;
        for col in 0..headers.len() {
            ws.set_column_width(col as u16, COLUMN_WIDTH)?;
        }
        let mut sheet = Self { ws, wrap: Format::new().set_text_wrap(), row: 0 };
        let cells: Vec<Cell> = headers.iter().map(|h| Cell::Text((*h).to_string())).collect();
        sheet.push_row(&cells)?;
        Ok(sheet)
    }

    fn push_row(&mut self, cells: &[Cell]) -> Result<(), XlsxError> {
        for (col, cell) in cells.iter().enumerate() {
            let col = col as u16;
            match cell {
                Cell::Text(text) => {
                    self.ws.write_string_with_format(self.row, col, text, &self.wrap)?;
                }
                Cell::Number(n) => {
                    self.ws.write_number_with_format(self.row, col, *n as f64, &self.wrap)?;
                }
            }
        }
        self.row += 1;
        Ok(())
    }
}

enum Cell {
    Text(String),
    Number(i64),
}

fn text(value: impl Into<String>) -> Cell {
    Cell::Text(value.into())
}

fn opt_text(value: Option<&str>) -> Cell {
    Cell::Text(value.unwrap_or_default().to_string())
}

fn patient_cells(index: usize, card: &PatientCard) -> Vec<Cell> {
    let p = &card.patient;
    let r = &p.relations;
    vec![
        Cell::Number(index as i64),
        text(p.full_name.as_str()),
        text(p.pinfl.as_str()),
        text(date_text(p.birth_date)),
        text(r.district_name.as_str()),
        text(r.neighborhood_name.as_str()),
        opt_text(p.address.as_deref()),
        opt_text(r.reason_for_special_consideration_name.as_deref()),
        opt_text(p.description_for_special_consideration.as_deref()),
        text(date_text(p.dates.last_psychiatric_appointment_date)),
        text(date_text(p.dates.last_home_visit_by_doctor_date)),
        opt_text(p.reason.as_deref()),
        opt_text(p.receiving_supportive_therapy.map(|v| v.label())),
        opt_text(r.social_domestic_environment_name.as_deref()),
        opt_text(p.alcohol_and_drug_use.map(|v| v.label())),
        text(hospitalization_span(p.dates.last_hospitalization_from, p.dates.last_hospitalization_to)),
        opt_text(p.where_is_now.map(|v| v.label())),
        opt_text(p.description_where_is_now.as_deref()),
        opt_text(r.psychiatrist_name.as_deref()),
        text(r.inspector_name.as_str()),
        text(yes_no(p.is_aggressive)),
        text(yes_no(p.is_convicted)),
        text(yes_no(p.is_abroad_long_term)),
    ]
}

fn count_cells(counts: &PatientCounts) -> [Cell; 8] {
    [
        Cell::Number(counts.total_patients),
        Cell::Number(counts.aggressive),
        Cell::Number(counts.convicted),
        Cell::Number(counts.abroad),
        Cell::Number(counts.late),
        Cell::Number(counts.on_time),
        Cell::Number(counts.aggressive_late),
        Cell::Number(counts.aggressive_on_time),
    ]
}

/// Roster workbook, one row per patient in the given order.
pub fn patients_workbook(cards: &[PatientCard]) -> Result<Vec<u8>, ExportError> {
    let mut workbook = Workbook::new();
    let mut sheet = Sheet::new(workbook.add_worksheet(), PATIENT_SHEET, &PATIENT_HEADERS)?;
    for (i, card) in cards.iter().enumerate() {
        sheet.push_row(&patient_cells(i + 1, card))?;
    }
    drop(sheet);
    Ok(workbook.save_to_buffer()?)
}

/// District monitoring: neighborhood count column plus the shared counts.
pub fn district_monitoring_workbook(table: &MonitoringTable) -> Result<Vec<u8>, ExportError> {
    let mut headers = vec!["№", "Ҳудуд", "Жами маҳаллалар сони"];
    headers.extend(COUNT_HEADERS);

    let mut workbook = Workbook::new();
    let mut sheet = Sheet::new(workbook.add_worksheet(), DISTRICT_SHEET, &headers)?;
    for (i, row) in table.rows.iter().enumerate() {
        let mut cells = vec![
            Cell::Number(i as i64 + 1),
            text(row.name.as_str()),
            Cell::Number(row.total_neighborhoods.unwrap_or(0)),
        ];
        cells.extend(count_cells(&row.counts));
        sheet.push_row(&cells)?;
    }
    let mut totals = vec![text(""), text(TOTALS_LABEL), Cell::Number(table.total_neighborhoods.unwrap_or(0))];
    totals.extend(count_cells(&table.totals));
    sheet.push_row(&totals)?;
    drop(sheet);
    Ok(workbook.save_to_buffer()?)
}

/// Neighborhood monitoring for one district.
pub fn neighborhood_monitoring_workbook(table: &MonitoringTable) -> Result<Vec<u8>, ExportError> {
    let mut headers = vec!["№", "Маҳалла"];
    headers.extend(COUNT_HEADERS);

    let mut workbook = Workbook::new();
    let mut sheet = Sheet::new(workbook.add_worksheet(), NEIGHBORHOOD_SHEET, &headers)?;
    for (i, row) in table.rows.iter().enumerate() {
        let mut cells = vec![Cell::Number(i as i64 + 1), text(row.name.as_str())];
        cells.extend(count_cells(&row.counts));
        sheet.push_row(&cells)?;
    }
    let mut totals = vec![text(""), text(TOTALS_LABEL)];
    totals.extend(count_cells(&table.totals));
    sheet.push_row(&totals)?;
    drop(sheet);
    Ok(workbook.save_to_buffer()?)
}

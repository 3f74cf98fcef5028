//! 报表组装：把负荷清单整理成分节的行数据，再套用页眉/主体模板生成图元集合。

use loadcalc_core::drawing::{DrawingObjectSet, HorizontalMode, PlainText, Polyline, RichText};
use loadcalc_core::geometry::Vector3;
use loadcalc_core::template::TemplateError;
use loadcalc_core::transform::shift;

use crate::demand::{LoadSheet, Totals};

/// 页眉模板中被替换的标题文字。
pub const HEADING_MARKER: &str = "SERVICE LOAD CALCULATION";
pub const LIGHTING_CODE: &str = "220.14(J)";
pub const GENERAL_DEMAND_CODE: &str = "220.82(B)";

const HEADER_FONT_PLAIN: &str = "\\Farial|c0";
const HEADER_FONT_BOLD: &str = "\\fArial Rounded MT Bold|b1|i0|c0|p34";

/// 表格排版参数，单位为图纸单位（英寸）。
#[derive(Debug, Clone, PartialEq)]
pub struct ReportLayout {
    pub row_height: f64,
    pub margin_top: f64,
    pub margin_bottom: f64,
    pub width: f64,
    pub header_height: f64,
    pub frame_layer: String,
    pub title_marker: String,
    pub value_marker: String,
    pub text_style: String,
}

impl Default for ReportLayout {
    fn default() -> Self {
        Self {
            row_height: 0.25,
            margin_top: 0.16,
            margin_bottom: 0.08,
            width: 7.0,
            header_height: 0.75,
            frame_layer: "E-TEXT".to_string(),
            title_marker: "Title".to_string(),
            value_marker: "Subtitle VA".to_string(),
            text_style: "Load Calcs".to_string(),
        }
    }
}

impl ReportLayout {
    /// 分节高度；0 行时为 0。
    pub fn section_height(&self, row_count: u32) -> f64 {
        if row_count == 0 {
            return 0.0;
        }
        self.margin_top + self.margin_bottom + self.row_height * f64::from(row_count)
    }
}

/// 分节在容器中的纵向位置。`top` 为分节上沿的 Y 值（向下为负）。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SectionPlacement {
    pub top: f64,
    pub height: f64,
}

/// 自 `start` 处向下依次堆叠各节。
pub fn stack_sections(row_counts: &[u32], layout: &ReportLayout, start: f64) -> Vec<SectionPlacement> {
    let mut current = start;
    row_counts
        .iter()
        .map(|rows| {
            let height = layout.section_height(*rows);
            let placement = SectionPlacement {
                top: -current,
                height,
            };
            current += height;
            placement
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SectionKind {
    DwellingInfo,
    General,
    GeneralCalculation,
    AirConditioning,
    Custom,
    Service,
    BuildingUnits,
    BuildingCalculation,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportRow {
    pub label: String,
    pub value: String,
}

impl ReportRow {
    pub fn new(label: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            value: value.into(),
        }
    }

    pub fn va(label: impl Into<String>, va: i64) -> Self {
        Self::new(label, format_va(va))
    }

    pub fn blank() -> Self {
        Self::new("", "")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportSection {
    pub kind: SectionKind,
    pub title: Option<String>,
    pub rows: Vec<ReportRow>,
}

impl ReportSection {
    /// 行数包含标题行；没有任何内容时为 0。
    pub fn row_count(&self) -> u32 {
        if self.title.is_none() && self.rows.is_empty() {
            return 0;
        }
        u32::from(self.title.is_some()) + self.rows.len() as u32
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.row_count() == 0
    }
}

/// 一份完整报表：容器名、页眉标题与有序分节。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Report {
    pub container_name: String,
    pub heading: String,
    pub sections: Vec<ReportSection>,
}

impl Report {
    pub fn row_counts(&self) -> Vec<u32> {
        self.sections.iter().map(ReportSection::row_count).collect()
    }

    pub fn section(&self, kind: SectionKind) -> Option<&ReportSection> {
        self.sections.iter().find(|section| section.kind == kind)
    }
}

#[inline]
pub fn format_va(va: i64) -> String {
    format!("{va}VA")
}

/// 安培数保留至多两位小数。
pub fn format_amps(amps: f64) -> String {
    let text = format!("{amps:.2}");
    let trimmed = text.trim_end_matches('0').trim_end_matches('.');
    trimmed.to_string()
}

pub fn underline(text: &str) -> String {
    format!("\\L{text}\\l")
}

pub fn bold_italic(text: &str) -> String {
    format!("{{\\fArial Rounded MT Bold|b1|i1|c0|p34;{text}}}")
}

/// 分节标题的富文本写法。
pub fn title_markup(title: &str) -> String {
    bold_italic(&underline(title))
}

/// 单元容器名：`Unit A ID1`，合并时为 `Unit A ID1 & B ID2`。
pub fn unit_container_name(names: &[String], ids: &[u32]) -> String {
    let parts: Vec<String> = names
        .iter()
        .zip(ids)
        .map(|(name, id)| format!("{name} ID{id}"))
        .collect();
    format!("Unit {}", parts.join(" & "))
}

pub fn service_section(totals: &Totals) -> ReportSection {
    let formula = format!(
        "({}VA+{}VA+{}VA)/{}={}A (Service Rating)",
        totals.subtotal_general_load,
        totals.total_ac_load,
        totals.custom_load,
        totals.voltage,
        format_amps(totals.service_load)
    );
    ReportSection {
        kind: SectionKind::Service,
        title: Some("Calculated Load for Service:".to_string()),
        rows: vec![
            ReportRow::new(formula, ""),
            ReportRow::blank(),
            ReportRow::new("Provided Service Rating:", format!("{}A", totals.service_rating)),
        ],
    }
}

fn dwelling_section(sheet: &LoadSheet) -> ReportSection {
    ReportSection {
        kind: SectionKind::DwellingInfo,
        title: Some("Dwelling Information:".to_string()),
        rows: vec![
            ReportRow::new("Floor Area:", format!("{}ft\u{00B2}", sheet.floor_area)),
            ReportRow::new("Heater:", sheet.heater.clone()),
            ReportRow::new("Dryer:", sheet.dryer.clone()),
            ReportRow::new("Oven:", sheet.oven.clone()),
            ReportRow::new("Cooktop:", sheet.cooktop.clone()),
        ],
    }
}

/// 照明分档行插在小电器行之后。
const LIGHTING_BREAKDOWN_INDEX: usize = 2;

fn general_section(sheet: &LoadSheet) -> ReportSection {
    let mut rows: Vec<ReportRow> = sheet
        .general
        .iter()
        .enumerate()
        .map(|(index, (_, load))| {
            if index == 0 {
                ReportRow::va(format!("{} (CEC {LIGHTING_CODE}):", load.name), load.va)
            } else {
                ReportRow::va(load.label(), load.va)
            }
        })
        .collect();
    if let Some(breakdown) = sheet.lighting_breakdown() {
        let at = LIGHTING_BREAKDOWN_INDEX.min(rows.len());
        rows.splice(
            at..at,
            breakdown
                .rows()
                .into_iter()
                .map(|(label, va)| ReportRow::va(label, va)),
        );
    }
    if let Some(water_heater) = &sheet.water_heater {
        rows.push(ReportRow::va(water_heater.label(), water_heater.va));
    }
    rows.extend(
        sheet
            .general_customs
            .iter()
            .map(|load| ReportRow::va(load.label(), load.va)),
    );
    ReportSection {
        kind: SectionKind::General,
        title: Some("General Load:".to_string()),
        rows,
    }
}

fn general_calculation_section(totals: &Totals) -> ReportSection {
    ReportSection {
        kind: SectionKind::GeneralCalculation,
        title: None,
        rows: vec![
            ReportRow::va("Total General Load:", totals.total_general_load),
            ReportRow::va(
                format!("First 10 KVA @ 100% (CEC {GENERAL_DEMAND_CODE}):"),
                totals.first_10kva,
            ),
            ReportRow::va(
                format!(
                    "Remainder @ 40% ({}VA x 0.4) (CEC {GENERAL_DEMAND_CODE}):",
                    totals.amount_over_10kva
                ),
                totals.remainder_at_40_percent,
            ),
            ReportRow::va(
                format!("General Calculated Load (CEC {GENERAL_DEMAND_CODE}):"),
                totals.subtotal_general_load,
            ),
        ],
    }
}

fn air_conditioning_section(sheet: &LoadSheet) -> ReportSection {
    let ac = &sheet.ac;
    let mut rows = Vec::new();
    if ac.condenser > 0 {
        rows.push(ReportRow::va("Outdoor Condensing Unit:", ac.condenser));
    }
    if ac.fan_coil > 0 {
        rows.push(ReportRow::va("Indoor Fan Coil Unit:", ac.fan_coil));
    }
    if ac.heating > 0 {
        rows.push(ReportRow::va(
            format!("Heating Unit{}", crate::demand::multiplier_suffix(ac.heating_units)),
            ac.heating,
        ));
    }
    rows.push(ReportRow::va(
        format!("Total AC Load (CEC {}):", ac.electrical_code),
        ac.total(),
    ));
    ReportSection {
        kind: SectionKind::AirConditioning,
        title: Some("AC Load:".to_string()),
        rows,
    }
}

fn custom_section(sheet: &LoadSheet) -> ReportSection {
    if sheet.custom_loads.is_empty() {
        return ReportSection {
            kind: SectionKind::Custom,
            title: None,
            rows: Vec::new(),
        };
    }
    ReportSection {
        kind: SectionKind::Custom,
        title: Some("Additional Load:".to_string()),
        rows: sheet
            .custom_loads
            .iter()
            .map(|load| ReportRow::va(load.label(), load.va))
            .collect(),
    }
}

/// 单元（或双单元合并）报表。
pub fn unit_report(sheet: &LoadSheet, totals: &Totals) -> Report {
    Report {
        container_name: unit_container_name(&sheet.unit_names, &sheet.unit_ids),
        heading: format!("{HEADING_MARKER} - UNIT {}", sheet.unit_names.join(" & ")),
        sections: vec![
            dwelling_section(sheet),
            general_section(sheet),
            general_calculation_section(totals),
            air_conditioning_section(sheet),
            custom_section(sheet),
            service_section(totals),
        ],
    }
}

fn invalid(name: &str, message: impl Into<String>) -> TemplateError {
    TemplateError::Invalid {
        name: name.to_string(),
        message: message.into(),
    }
}

fn row_text(anchor: &RichText, contents: &str, y: f64, layout: &ReportLayout) -> PlainText {
    let location = Vector3::new(anchor.location.x(), y, anchor.location.z());
    PlainText {
        layer: anchor.layer.clone(),
        style: layout.text_style.clone(),
        contents: contents.to_string(),
        location,
        height: anchor.height,
        rotation: anchor.rotation,
        width_factor: 1.0,
        alignment_point: location,
        horizontal_mode: if anchor.is_left_justified() {
            HorizontalMode::Left
        } else {
            HorizontalMode::Right
        },
        mirror_x: false,
        mirror_y: false,
    }
}

fn frame(placement: SectionPlacement, layout: &ReportLayout) -> Polyline {
    let top = placement.top;
    let bottom = top - placement.height;
    Polyline {
        layer: layout.frame_layer.clone(),
        line_type: "ByLayer".to_string(),
        closed: true,
        vertices: vec![
            Vector3::xy(0.0, top),
            Vector3::xy(-layout.width, top),
            Vector3::xy(-layout.width, bottom),
            Vector3::xy(0.0, bottom),
        ],
    }
}

/// 套用模板生成整份报表的图元，坐标相对于容器原点。
///
/// 空节不生成任何图元；其余每节依次为主体模板副本、逐行文字与外框。
pub fn render(
    report: &Report,
    header: &DrawingObjectSet,
    body: &DrawingObjectSet,
    layout: &ReportLayout,
) -> Result<DrawingObjectSet, TemplateError> {
    let mut output = header.clone();
    let heading = output
        .rich_text_containing_mut(HEADING_MARKER)
        .ok_or_else(|| invalid("header", format!("missing {HEADING_MARKER:?} text")))?;
    heading.contents = heading
        .contents
        .replace(HEADING_MARKER, &report.heading)
        .replace(HEADER_FONT_PLAIN, HEADER_FONT_BOLD);

    let title_index = body
        .rich_texts
        .iter()
        .position(|text| text.contents.contains(layout.title_marker.as_str()))
        .ok_or_else(|| invalid("body", format!("missing {:?} placeholder", layout.title_marker)))?;
    let value_index = body
        .rich_texts
        .iter()
        .position(|text| text.contents.contains(layout.value_marker.as_str()))
        .ok_or_else(|| invalid("body", format!("missing {:?} placeholder", layout.value_marker)))?;

    let placements = stack_sections(&report.row_counts(), layout, layout.header_height);
    let mut total_rows = 0;
    for (section, placement) in report.sections.iter().zip(placements) {
        let row_count = section.row_count();
        if row_count == 0 {
            continue;
        }
        let mut block = shift(body, placement.top);
        let title_anchor = block.rich_texts[title_index].clone();
        let value_anchor = block.rich_texts[value_index].clone();
        block.rich_texts[title_index].contents = section
            .title
            .as_deref()
            .map(title_markup)
            .unwrap_or_default();
        block.rich_texts[value_index].contents.clear();

        let first = u32::from(section.title.is_some());
        for (offset, row) in section.rows.iter().enumerate() {
            let k = f64::from(first + offset as u32);
            let y = title_anchor.location.y() - layout.margin_top - layout.row_height * k;
            if !row.label.is_empty() {
                block.push(row_text(&title_anchor, &row.label, y, layout));
            }
            if !row.value.is_empty() {
                block.push(row_text(&value_anchor, &row.value, y, layout));
            }
        }
        block.push(frame(placement, layout));
        output.extend(block);
        total_rows += row_count;
    }
    output.row_count = total_rows;
    Ok(output)
}

//! SVG charts over stored generation records.
//!
//! Aggregation is kept separate from drawing so the numbers can be checked
//! without parsing SVG.

pub mod report;

pub use report::{generate_summary_report, SummaryReport};

use std::collections::{BTreeMap, BTreeSet};

use plotters::{coord::Shift, prelude::*};
use serde::Deserialize;
use time::{Date, Duration};
use windsolar_client::domain::StoredRecord;

const CHART_SIZE: (u32, u32) = (1200, 640);
const HEATMAP_SIZE: (u32, u32) = (1400, 800);
const CAPTION_FONT: (&str, u32) = ("sans-serif", 26);
const GENERATION_AXIS: &str = "Generation (MWh)";

#[derive(thiserror::Error, Debug)]
pub enum ChartError {
    #[error("No data available")]
    NoData,
    #[error("failed to render chart: {0}")]
    Render(String),
}

fn render_err<E: std::fmt::Display>(e: E) -> ChartError {
    ChartError::Render(e.to_string())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlotType {
    Daily,
    Monthly,
    Heatmap,
    FuelComparison,
}

impl PlotType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlotType::Daily => "daily",
            PlotType::Monthly => "monthly",
            PlotType::Heatmap => "heatmap",
            PlotType::FuelComparison => "fuel_comparison",
        }
    }

    pub fn default_title(&self) -> &'static str {
        match self {
            PlotType::Daily => "Daily Wind & Solar Generation by Type",
            PlotType::Monthly => "Monthly Wind & Solar Generation Comparison",
            PlotType::Heatmap => "Generation Heatmap by Settlement Period",
            PlotType::FuelComparison => "Total Generation by Fuel Type",
        }
    }
}

/// Draw `plot` over `records` and return the SVG document.
///
/// `fuel_type` only applies to the heatmap, where it restricts the records
/// (case-insensitively) and is appended to the title.
pub fn render(
    plot: PlotType,
    records: &[StoredRecord],
    title: Option<&str>,
    fuel_type: Option<&str>,
) -> Result<String, ChartError> {
    if records.is_empty() {
        return Err(ChartError::NoData);
    }
    let title = title.unwrap_or(plot.default_title());

    let svg = match plot {
        PlotType::Daily => daily_chart(&daily_totals(records), title)?,
        PlotType::Monthly => monthly_chart(&monthly_totals(records), title)?,
        PlotType::Heatmap => {
            let grid = heatmap_grid(records, fuel_type).ok_or(ChartError::NoData)?;
            let title = match fuel_type {
                Some(ft) => format!("{title} - {ft}"),
                None => title.to_string(),
            };
            heatmap_chart(&grid, &title)?
        }
        PlotType::FuelComparison => fuel_comparison_chart(&fuel_totals(records), title)?,
    };

    tracing::info!(plot = plot.as_str(), records = records.len(), bytes = svg.len(), "chart rendered");
    Ok(svg)
}

fn quantity(r: &StoredRecord) -> f64 {
    r.quantity.unwrap_or(0.0)
}

/// Per fuel type, the summed quantity of each settlement date.
pub fn daily_totals(records: &[StoredRecord]) -> BTreeMap<String, BTreeMap<Date, f64>> {
    let mut out: BTreeMap<String, BTreeMap<Date, f64>> = BTreeMap::new();
    for r in records {
        *out.entry(r.psr_type.clone())
            .or_default()
            .entry(r.settlement_date)
            .or_insert(0.0) += quantity(r);
    }
    out
}

/// Calendar month, ordered chronologically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct YearMonth {
    pub year: i32,
    pub month: u8,
}

impl YearMonth {
    fn of(date: Date) -> Self {
        Self {
            year: date.year(),
            month: u8::from(date.month()),
        }
    }
}

impl std::fmt::Display for YearMonth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

/// Per month, the summed quantity of each fuel type.
pub fn monthly_totals(records: &[StoredRecord]) -> BTreeMap<YearMonth, BTreeMap<String, f64>> {
    let mut out: BTreeMap<YearMonth, BTreeMap<String, f64>> = BTreeMap::new();
    for r in records {
        *out.entry(YearMonth::of(r.settlement_date))
            .or_default()
            .entry(r.psr_type.clone())
            .or_insert(0.0) += quantity(r);
    }
    out
}

/// Dense date × settlement period matrix of summed quantity; gaps are zero.
#[derive(Debug, Clone, PartialEq)]
pub struct HeatmapGrid {
    pub dates: Vec<Date>,
    pub periods: Vec<i64>,
    /// `values[date_idx][period_idx]`
    pub values: Vec<Vec<f64>>,
}

impl HeatmapGrid {
    pub fn max(&self) -> f64 {
        self.values.iter().flatten().copied().fold(0.0, f64::max)
    }
}

/// `None` when no record survives the fuel-type filter.
pub fn heatmap_grid(records: &[StoredRecord], fuel_type: Option<&str>) -> Option<HeatmapGrid> {
    let wanted = fuel_type.map(str::to_lowercase);
    let selected: Vec<&StoredRecord> = records
        .iter()
        .filter(|r| wanted.as_deref().map_or(true, |ft| r.psr_type.to_lowercase() == ft))
        .collect();
    if selected.is_empty() {
        return None;
    }

    let dates: Vec<Date> = selected.iter().map(|r| r.settlement_date).collect::<BTreeSet<_>>().into_iter().collect();
    let periods: Vec<i64> = selected.iter().map(|r| r.settlement_period).collect::<BTreeSet<_>>().into_iter().collect();

    let mut values = vec![vec![0.0; periods.len()]; dates.len()];
    for r in selected {
        // Both lookups hit: the axes were built from these same records.
        if let (Ok(di), Ok(pi)) = (dates.binary_search(&r.settlement_date), periods.binary_search(&r.settlement_period)) {
            values[di][pi] += quantity(r);
        }
    }

    Some(HeatmapGrid { dates, periods, values })
}

/// Total quantity per fuel type, smallest first.
pub fn fuel_totals(records: &[StoredRecord]) -> Vec<(String, f64)> {
    let mut totals: BTreeMap<&str, f64> = BTreeMap::new();
    for r in records {
        *totals.entry(r.psr_type.as_str()).or_insert(0.0) += quantity(r);
    }
    let mut out: Vec<(String, f64)> = totals.into_iter().map(|(k, v)| (k.to_string(), v)).collect();
    out.sort_by(|a, b| a.1.total_cmp(&b.1));
    out
}

fn draw_svg<F>(size: (u32, u32), draw: F) -> Result<String, ChartError>
where
    F: FnOnce(&DrawingArea<SVGBackend<'_>, Shift>) -> Result<(), ChartError>,
{
    let mut svg = String::new();
    {
        let root = SVGBackend::with_string(&mut svg, size).into_drawing_area();
        root.fill(&WHITE).map_err(render_err)?;
        draw(&root)?;
        root.present().map_err(render_err)?;
    }
    Ok(svg)
}

fn value_axis(max: f64) -> std::ops::Range<f64> {
    if max > 0.0 {
        0.0..max * 1.1
    } else {
        0.0..1.0
    }
}

fn integral_label(v: f64, labels: &[String]) -> String {
    let idx = v.round();
    if (v - idx).abs() > 1e-6 || idx < 0.0 {
        return String::new();
    }
    labels.get(idx as usize).cloned().unwrap_or_default()
}

fn series_color(idx: usize) -> RGBAColor {
    Palette99::pick(idx).to_rgba()
}

fn daily_chart(totals: &BTreeMap<String, BTreeMap<Date, f64>>, title: &str) -> Result<String, ChartError> {
    let days: BTreeSet<Date> = totals.values().flat_map(|m| m.keys().copied()).collect();
    let (Some(&first), Some(&last)) = (days.first(), days.last()) else {
        return Err(ChartError::NoData);
    };
    let span = (last - first).whole_days();
    let labels: Vec<String> = (0..=span).map(|d| (first + Duration::days(d)).to_string()).collect();
    let max = totals.values().flat_map(|m| m.values().copied()).fold(0.0, f64::max);

    draw_svg(CHART_SIZE, |root| {
        let mut chart = ChartBuilder::on(root)
            .caption(title, CAPTION_FONT)
            .margin(16)
            .x_label_area_size(48)
            .y_label_area_size(72)
            .build_cartesian_2d(-0.5..(span as f64 + 0.5), value_axis(max))
            .map_err(render_err)?;

        chart
            .configure_mesh()
            .x_desc("Date")
            .y_desc(GENERATION_AXIS)
            .x_labels(labels.len().min(12))
            .x_label_formatter(&|v| integral_label(*v, &labels))
            .draw()
            .map_err(render_err)?;

        for (idx, (fuel, by_day)) in totals.iter().enumerate() {
            let color = series_color(idx);
            // Days this fuel did not report are drawn as zero.
            let points = (0..=span).map(|d| {
                let day = first + Duration::days(d);
                (d as f64, by_day.get(&day).copied().unwrap_or(0.0))
            });
            chart
                .draw_series(LineSeries::new(points, color.stroke_width(2)))
                .map_err(render_err)?
                .label(fuel.as_str())
                .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], color.stroke_width(2)));
        }

        chart
            .configure_series_labels()
            .background_style(WHITE.mix(0.8))
            .border_style(&BLACK)
            .draw()
            .map_err(render_err)?;
        Ok(())
    })
}

fn monthly_chart(totals: &BTreeMap<YearMonth, BTreeMap<String, f64>>, title: &str) -> Result<String, ChartError> {
    let months: Vec<String> = totals.keys().map(YearMonth::to_string).collect();
    let fuels: Vec<String> = totals
        .values()
        .flat_map(|m| m.keys().cloned())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    let max = totals.values().flat_map(|m| m.values().copied()).fold(0.0, f64::max);
    let bar_width = 0.8 / fuels.len().max(1) as f64;

    draw_svg(CHART_SIZE, |root| {
        let mut chart = ChartBuilder::on(root)
            .caption(title, CAPTION_FONT)
            .margin(16)
            .x_label_area_size(48)
            .y_label_area_size(72)
            .build_cartesian_2d(-0.5..(months.len() as f64 - 0.5), value_axis(max))
            .map_err(render_err)?;

        chart
            .configure_mesh()
            .disable_x_mesh()
            .x_desc("Month")
            .y_desc(GENERATION_AXIS)
            .x_labels(months.len())
            .x_label_formatter(&|v| integral_label(*v, &months))
            .draw()
            .map_err(render_err)?;

        for (fi, fuel) in fuels.iter().enumerate() {
            let color = series_color(fi);
            let bars = totals.values().enumerate().filter_map(|(mi, by_fuel)| {
                let value = by_fuel.get(fuel).copied()?;
                let left = mi as f64 - 0.4 + fi as f64 * bar_width;
                Some(Rectangle::new([(left, 0.0), (left + bar_width, value)], color.filled()))
            });
            chart
                .draw_series(bars)
                .map_err(render_err)?
                .label(fuel.as_str())
                .legend(move |(x, y)| Rectangle::new([(x, y - 5), (x + 12, y + 5)], color.filled()));
        }

        chart
            .configure_series_labels()
            .background_style(WHITE.mix(0.8))
            .border_style(&BLACK)
            .draw()
            .map_err(render_err)?;
        Ok(())
    })
}

/// Yellow through orange to dark red as `v` approaches `max`.
fn heat_color(v: f64, max: f64) -> RGBColor {
    const STOPS: [(f64, (u8, u8, u8)); 3] = [(0.0, (255, 255, 204)), (0.5, (253, 141, 60)), (1.0, (189, 0, 38))];

    let t = if max > 0.0 { (v / max).clamp(0.0, 1.0) } else { 0.0 };
    let (lo, hi) = if t <= STOPS[1].0 { (STOPS[0], STOPS[1]) } else { (STOPS[1], STOPS[2]) };
    let f = (t - lo.0) / (hi.0 - lo.0);
    let mix = |a: u8, b: u8| (f64::from(a) + (f64::from(b) - f64::from(a)) * f).round() as u8;
    RGBColor(mix(lo.1 .0, hi.1 .0), mix(lo.1 .1, hi.1 .1), mix(lo.1 .2, hi.1 .2))
}

fn heatmap_chart(grid: &HeatmapGrid, title: &str) -> Result<String, ChartError> {
    let date_labels: Vec<String> = grid.dates.iter().map(Date::to_string).collect();
    let period_labels: Vec<String> = grid.periods.iter().map(i64::to_string).collect();
    let max = grid.max();

    draw_svg(HEATMAP_SIZE, |root| {
        let mut chart = ChartBuilder::on(root)
            .caption(title, CAPTION_FONT)
            .margin(16)
            .x_label_area_size(48)
            .y_label_area_size(96)
            .build_cartesian_2d(
                -0.5..(grid.periods.len() as f64 - 0.5),
                -0.5..(grid.dates.len() as f64 - 0.5),
            )
            .map_err(render_err)?;

        chart
            .configure_mesh()
            .disable_mesh()
            .x_desc("Settlement Period")
            .y_desc("Date")
            .x_labels(period_labels.len().min(25))
            .y_labels(date_labels.len().min(31))
            .x_label_formatter(&|v| integral_label(*v, &period_labels))
            .y_label_formatter(&|v| integral_label(*v, &date_labels))
            .draw()
            .map_err(render_err)?;

        let cells = grid.values.iter().enumerate().flat_map(|(di, row)| {
            row.iter().enumerate().map(move |(pi, &v)| {
                let (x, y) = (pi as f64, di as f64);
                Rectangle::new([(x - 0.5, y - 0.5), (x + 0.5, y + 0.5)], heat_color(v, max).filled())
            })
        });
        chart.draw_series(cells).map_err(render_err)?;
        Ok(())
    })
}

fn fuel_comparison_chart(totals: &[(String, f64)], title: &str) -> Result<String, ChartError> {
    let names: Vec<String> = totals.iter().map(|(name, _)| name.clone()).collect();
    let max = totals.iter().map(|(_, v)| *v).fold(0.0, f64::max);

    draw_svg(CHART_SIZE, |root| {
        let mut chart = ChartBuilder::on(root)
            .caption(title, CAPTION_FONT)
            .margin(16)
            .x_label_area_size(48)
            .y_label_area_size(120)
            .build_cartesian_2d(value_axis(max), -0.5..(names.len() as f64 - 0.5))
            .map_err(render_err)?;

        chart
            .configure_mesh()
            .disable_y_mesh()
            .x_desc("Total Generation (MWh)")
            .y_labels(names.len())
            .y_label_formatter(&|v| integral_label(*v, &names))
            .draw()
            .map_err(render_err)?;

        let bars = totals.iter().enumerate().map(|(i, (_, v))| {
            let y = i as f64;
            Rectangle::new([(0.0, y - 0.35), (*v, y + 0.35)], series_color(i).filled())
        });
        chart.draw_series(bars).map_err(render_err)?;
        Ok(())
    })
}

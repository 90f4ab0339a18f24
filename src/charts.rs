use crate::aggregate::{GroupMean, GroupedMean, Heatmap, Summary, TaskBreakdown};
use anyhow::{Context, Result};
use plotters::coord::Shift;
use plotters::prelude::*;
use plotters::style::text_anchor::{HPos, Pos, VPos};
use std::path::{Path, PathBuf};

type Area<'a> = DrawingArea<SVGBackend<'a>, Shift>;

const FONT: &str = "sans-serif";

/// Write every chart for the summary into `dir`, returning the files written
pub fn render_all(summary: &Summary, dir: &Path) -> Result<Vec<PathBuf>> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create directory: {}", dir.display()))?;

    let mut written = Vec::new();

    for task in &summary.tasks {
        let path = dir.join(format!("{}_barchart.svg", file_stem(&task.task_name)));
        render_task(task, &path)?;
        written.push(path);
    }

    let path = dir.join("task_vs_prompt_technique_heatmap.svg");
    render_heatmap(&summary.heatmap, &path)?;
    written.push(path);

    let path = dir.join("method_performance_barchart.svg");
    render_single(
        &path,
        (800, 600),
        "Barchart of Method Performance",
        "Method (Prompt Type)",
        &summary.by_prompt_type,
    )?;
    written.push(path);

    let path = dir.join("model_size_vs_score_barchart.svg");
    render_single(
        &path,
        (800, 600),
        "Model Size vs Average Score Across All Tasks",
        "Model Size (B)",
        &summary.by_model_size,
    )?;
    written.push(path);

    let path = dir.join("prompt_technique_vs_model_thinking_barchart.svg");
    {
        let root = SVGBackend::new(&path, (1000, 600)).into_drawing_area();
        root.fill(&WHITE)?;
        draw_grouped_bars(
            &root,
            "Average Score per Prompting Technique Grouped by Model-Thinking",
            "Prompting Technique",
            &summary.by_prompt_and_config,
        )?;
        root.present()?;
    }
    written.push(path);

    for path in &written {
        tracing::info!("Chart written to {}", path.display());
    }
    Ok(written)
}

/// Three panels: (model, thinking) × prompt type, mean per model, mean per prompt type
fn render_task(task: &TaskBreakdown, path: &Path) -> Result<()> {
    let root = SVGBackend::new(path, (2400, 600)).into_drawing_area();
    root.fill(&WHITE)?;

    let (left, right) = root.split_horizontally(1200);
    let (middle, rightmost) = right.split_horizontally(600);

    draw_grouped_bars(
        &left,
        &format!("{} - Methods Grouped by (Model, Thinking) Pair", task.task_name),
        "(Model, Thinking)",
        &task.by_config_and_prompt,
    )?;
    draw_bars(&middle, "Average Performance by Model", "Model", &task.by_model)?;
    draw_bars(
        &rightmost,
        "Average Performance by Prompting Method",
        "Prompt Type",
        &task.by_prompt_type,
    )?;

    root.present()?;
    Ok(())
}

fn render_single(
    path: &Path,
    size: (u32, u32),
    title: &str,
    x_desc: &str,
    groups: &[GroupMean],
) -> Result<()> {
    let root = SVGBackend::new(path, size).into_drawing_area();
    root.fill(&WHITE)?;
    draw_bars(&root, title, x_desc, groups)?;
    root.present()?;
    Ok(())
}

/// Task name as a single path component: whitespace, separators and reserved characters become `_`
fn file_stem(name: &str) -> String {
    let stem: String = name
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_whitespace() || c.is_control() => '_',
            c => c,
        })
        .collect();
    match stem.as_str() {
        "" | "." | ".." => format!("task{}", stem),
        _ => stem,
    }
}

/// Label for the category whose bar is centred on `x`
fn category_label(labels: &[String], x: f64) -> String {
    let rounded = x.round();
    if rounded < 0.0 || (x - rounded).abs() > 1e-6 {
        return String::new();
    }
    labels.get(rounded as usize).cloned().unwrap_or_default()
}

fn draw_bars(area: &Area<'_>, title: &str, x_desc: &str, groups: &[GroupMean]) -> Result<()> {
    let labels: Vec<String> = groups.iter().map(|g| g.label.clone()).collect();
    let n = labels.len().max(1) as f64;

    let mut chart = ChartBuilder::on(area)
        .caption(title, (FONT, 20))
        .margin(15)
        .x_label_area_size(50)
        .y_label_area_size(60)
        .build_cartesian_2d(-0.5f64..n - 0.5, 0f64..100f64)?;

    let formatter = |x: &f64| category_label(&labels, *x);
    chart
        .configure_mesh()
        .disable_x_mesh()
        .x_labels(labels.len() + 1)
        .x_label_formatter(&formatter)
        .x_desc(x_desc)
        .y_desc("Average Score (%)")
        .draw()?;

    chart.draw_series(groups.iter().enumerate().map(|(i, g)| {
        let x = i as f64;
        Rectangle::new([(x - 0.35, 0.0), (x + 0.35, g.mean)], BLUE.mix(0.7).filled())
    }))?;

    Ok(())
}

fn draw_grouped_bars(
    area: &Area<'_>,
    title: &str,
    x_desc: &str,
    cells: &[GroupedMean],
) -> Result<()> {
    let mut groups: Vec<String> = Vec::new();
    let mut series: Vec<String> = Vec::new();
    for cell in cells {
        if !groups.contains(&cell.group) {
            groups.push(cell.group.clone());
        }
        if !series.contains(&cell.series) {
            series.push(cell.series.clone());
        }
    }
    let n = groups.len().max(1) as f64;
    let width = 0.8 / series.len().max(1) as f64;

    let mut chart = ChartBuilder::on(area)
        .caption(title, (FONT, 20))
        .margin(15)
        .x_label_area_size(50)
        .y_label_area_size(60)
        .build_cartesian_2d(-0.5f64..n - 0.5, 0f64..100f64)?;

    let formatter = |x: &f64| category_label(&groups, *x);
    chart
        .configure_mesh()
        .disable_x_mesh()
        .x_labels(groups.len() + 1)
        .x_label_formatter(&formatter)
        .x_desc(x_desc)
        .y_desc("Score (%)")
        .draw()?;

    for (s, name) in series.iter().enumerate() {
        let color = Palette99::pick(s);
        let offset = -0.4 + width * s as f64;
        let bars = cells.iter().filter(|c| &c.series == name).filter_map(|c| {
            let g = groups.iter().position(|group| group == &c.group)? as f64;
            Some(Rectangle::new(
                [(g + offset, 0.0), (g + offset + width, c.mean)],
                color.filled(),
            ))
        });
        chart
            .draw_series(bars)?
            .label(name.as_str())
            .legend(move |(x, y)| Rectangle::new([(x, y - 5), (x + 10, y + 5)], color.filled()));
    }

    chart
        .configure_series_labels()
        .background_style(WHITE.mix(0.8))
        .border_style(BLACK)
        .draw()?;

    Ok(())
}

/// Blue (low) to yellow (high)
fn heat_color(value: f64, lo: f64, hi: f64) -> HSLColor {
    let t = if hi > lo { (value - lo) / (hi - lo) } else { 0.5 };
    HSLColor(0.7 - 0.55 * t, 0.7, 0.35 + 0.25 * t)
}

fn render_heatmap(heatmap: &Heatmap, path: &Path) -> Result<()> {
    let root = SVGBackend::new(path, (2000, 1000)).into_drawing_area();
    root.fill(&WHITE)?;

    let mut columns = heatmap.tasks.clone();
    columns.push("Overall".to_string());
    let rows = heatmap.prompt_types.clone();
    let (lo, hi) = heatmap.value_range().unwrap_or((0.0, 100.0));

    let mut chart = ChartBuilder::on(&root)
        .caption("Heatmap of Prompt Technique vs Task", (FONT, 24))
        .margin(20)
        .x_label_area_size(80)
        .y_label_area_size(80)
        .build_cartesian_2d(
            -0.5f64..columns.len().max(1) as f64 - 0.5,
            -0.5f64..rows.len().max(1) as f64 - 0.5,
        )?;

    let x_formatter = |x: &f64| category_label(&columns, *x);
    let y_formatter = |y: &f64| category_label(&rows, *y);
    chart
        .configure_mesh()
        .disable_mesh()
        .x_labels(columns.len() + 1)
        .y_labels(rows.len() + 1)
        .x_label_formatter(&x_formatter)
        .y_label_formatter(&y_formatter)
        .x_desc("Task")
        .y_desc("Prompt Technique")
        .draw()?;

    let overall_column = heatmap.tasks.len();
    let mut cells: Vec<(usize, usize, f64)> = Vec::new();
    for (r, row) in heatmap.cells.iter().enumerate() {
        for (c, value) in row.iter().enumerate() {
            if let Some(value) = value {
                cells.push((r, c, *value));
            }
        }
        if let Some(Some(value)) = heatmap.overall.get(r) {
            cells.push((r, overall_column, *value));
        }
    }

    chart.draw_series(cells.iter().map(|&(r, c, value)| {
        let (x, y) = (c as f64, r as f64);
        Rectangle::new(
            [(x - 0.5, y - 0.5), (x + 0.5, y + 0.5)],
            heat_color(value, lo, hi).filled(),
        )
    }))?;

    let annotation = TextStyle::from((FONT, 18).into_font())
        .color(&WHITE)
        .pos(Pos::new(HPos::Center, VPos::Center));
    chart.draw_series(cells.iter().map(|&(r, c, value)| {
        Text::new(format!("{:.1}", value), (c as f64, r as f64), annotation.clone())
    }))?;

    root.present()?;
    Ok(())
}

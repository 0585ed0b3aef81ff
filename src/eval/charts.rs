//! SVG Chart Generator
//!
//! Renders training curves and a confusion-matrix heatmap as standalone SVG
//! files, usable directly in reports.

use std::path::Path;

use crate::eval::metrics::ConfusionMatrix;
use crate::training::history::TrainingHistory;
use crate::utils::error::Result;

/// Chart styling constants
const CHART_WIDTH: f64 = 800.0;
const CHART_HEIGHT: f64 = 500.0;
const MARGIN_TOP: f64 = 60.0;
const MARGIN_RIGHT: f64 = 40.0;
const MARGIN_BOTTOM: f64 = 70.0;
const MARGIN_LEFT: f64 = 80.0;

const COLOR_PRIMARY: &str = "#3498db";
const COLOR_SECONDARY: &str = "#2ecc71";
const COLOR_GRID: &str = "#ecf0f1";
const COLOR_AXIS: &str = "#2c3e50";
const COLOR_TEXT: &str = "#2c3e50";

/// A data series for line charts
#[derive(Debug, Clone)]
pub struct DataSeries {
    pub name: String,
    pub points: Vec<(f64, f64)>,
    pub color: String,
}

/// Generate a line chart SVG
pub fn generate_line_chart(
    title: &str,
    x_label: &str,
    y_label: &str,
    series: &[DataSeries],
    output_path: &Path,
) -> Result<()> {
    let plot_width = CHART_WIDTH - MARGIN_LEFT - MARGIN_RIGHT;
    let plot_height = CHART_HEIGHT - MARGIN_TOP - MARGIN_BOTTOM;

    let x_max = series
        .iter()
        .flat_map(|s| s.points.iter().map(|p| p.0))
        .fold(1.0f64, f64::max);
    let y_max = series
        .iter()
        .flat_map(|s| s.points.iter().map(|p| p.1))
        .fold(1.0f64, f64::max);

    let mut svg = String::new();

    svg.push_str(&format!(
        r#"<svg xmlns="http://www.w3.org/2000/svg" viewBox="0 0 {} {}" width="{}" height="{}">"#,
        CHART_WIDTH, CHART_HEIGHT, CHART_WIDTH, CHART_HEIGHT
    ));
    svg.push_str(&format!(
        r#"<rect width="{}" height="{}" fill="white"/>"#,
        CHART_WIDTH, CHART_HEIGHT
    ));

    svg.push_str(&format!(
        r#"<text x="{}" y="35" text-anchor="middle" font-family="Arial, sans-serif" font-size="18" font-weight="bold" fill="{}">{}</text>"#,
        CHART_WIDTH / 2.0,
        COLOR_TEXT,
        escape_xml(title)
    ));

    // Grid and y-axis labels
    for i in 0..=5 {
        let y = MARGIN_TOP + plot_height - (i as f64 / 5.0) * plot_height;
        let value = (i as f64 / 5.0) * y_max;

        svg.push_str(&format!(
            r#"<line x1="{}" y1="{}" x2="{}" y2="{}" stroke="{}" stroke-width="1"/>"#,
            MARGIN_LEFT,
            y,
            MARGIN_LEFT + plot_width,
            y,
            COLOR_GRID
        ));
        svg.push_str(&format!(
            r#"<text x="{}" y="{}" text-anchor="end" font-family="Arial, sans-serif" font-size="12" fill="{}">{:.2}</text>"#,
            MARGIN_LEFT - 10.0,
            y + 4.0,
            COLOR_TEXT,
            value
        ));
    }

    // Axes
    svg.push_str(&format!(
        r#"<line x1="{}" y1="{}" x2="{}" y2="{}" stroke="{}" stroke-width="2"/>"#,
        MARGIN_LEFT,
        MARGIN_TOP + plot_height,
        MARGIN_LEFT + plot_width,
        MARGIN_TOP + plot_height,
        COLOR_AXIS
    ));
    svg.push_str(&format!(
        r#"<line x1="{}" y1="{}" x2="{}" y2="{}" stroke="{}" stroke-width="2"/>"#,
        MARGIN_LEFT,
        MARGIN_TOP,
        MARGIN_LEFT,
        MARGIN_TOP + plot_height,
        COLOR_AXIS
    ));

    // Axis labels
    svg.push_str(&format!(
        r#"<text x="{}" y="{}" text-anchor="middle" font-family="Arial, sans-serif" font-size="14" fill="{}">{}</text>"#,
        MARGIN_LEFT + plot_width / 2.0,
        CHART_HEIGHT - 20.0,
        COLOR_TEXT,
        escape_xml(x_label)
    ));
    svg.push_str(&format!(
        r#"<text x="20" y="{}" text-anchor="middle" font-family="Arial, sans-serif" font-size="14" fill="{}" transform="rotate(-90 20 {})">{}</text>"#,
        CHART_HEIGHT / 2.0,
        COLOR_TEXT,
        CHART_HEIGHT / 2.0,
        escape_xml(y_label)
    ));

    // Series polylines and legend
    for (series_idx, s) in series.iter().enumerate() {
        if s.points.is_empty() {
            continue;
        }

        let points: Vec<String> = s
            .points
            .iter()
            .map(|(x, y)| {
                let px = MARGIN_LEFT + (x / x_max) * plot_width;
                let py = MARGIN_TOP + plot_height - (y / y_max) * plot_height;
                format!("{:.1},{:.1}", px, py)
            })
            .collect();

        svg.push_str(&format!(
            r#"<polyline points="{}" fill="none" stroke="{}" stroke-width="2"/>"#,
            points.join(" "),
            s.color
        ));

        let legend_x = MARGIN_LEFT + plot_width - 150.0;
        let legend_y = MARGIN_TOP + 10.0 + series_idx as f64 * 20.0;
        svg.push_str(&format!(
            r#"<rect x="{}" y="{}" width="12" height="12" fill="{}"/>"#,
            legend_x,
            legend_y - 10.0,
            s.color
        ));
        svg.push_str(&format!(
            r#"<text x="{}" y="{}" font-family="Arial, sans-serif" font-size="12" fill="{}">{}</text>"#,
            legend_x + 18.0,
            legend_y,
            COLOR_TEXT,
            escape_xml(&s.name)
        ));
    }

    svg.push_str("</svg>");

    std::fs::write(output_path, svg)?;
    Ok(())
}

/// Generate a confusion-matrix heatmap SVG
pub fn generate_confusion_heatmap(
    title: &str,
    cm: &ConfusionMatrix,
    class_names: &[String],
    output_path: &Path,
) -> Result<()> {
    let n = cm.num_classes;
    let cell: f64 = 70.0;
    let label_space: f64 = 140.0;
    let width = label_space + n as f64 * cell + 40.0;
    let height = label_space + n as f64 * cell + 40.0;

    let row_sums = cm.row_sums();

    let mut svg = String::new();
    svg.push_str(&format!(
        r#"<svg xmlns="http://www.w3.org/2000/svg" viewBox="0 0 {} {}" width="{}" height="{}">"#,
        width, height, width, height
    ));
    svg.push_str(&format!(
        r#"<rect width="{}" height="{}" fill="white"/>"#,
        width, height
    ));
    svg.push_str(&format!(
        r#"<text x="{}" y="30" text-anchor="middle" font-family="Arial, sans-serif" font-size="16" font-weight="bold" fill="{}">{}</text>"#,
        width / 2.0,
        COLOR_TEXT,
        escape_xml(title)
    ));

    for row in 0..n {
        for col in 0..n {
            let count = cm.get(row, col);
            let fraction = if row_sums[row] > 0 {
                count as f64 / row_sums[row] as f64
            } else {
                0.0
            };

            // White through saturated blue, row-normalized.
            let channel = (255.0 - fraction * 180.0) as u8;
            let fill = format!("rgb({},{},255)", channel, channel);

            let x = label_space + col as f64 * cell;
            let y = label_space + row as f64 * cell;

            svg.push_str(&format!(
                r#"<rect x="{}" y="{}" width="{}" height="{}" fill="{}" stroke="{}"/>"#,
                x, y, cell, cell, fill, COLOR_GRID
            ));
            svg.push_str(&format!(
                r#"<text x="{}" y="{}" text-anchor="middle" font-family="Arial, sans-serif" font-size="14" fill="{}">{}</text>"#,
                x + cell / 2.0,
                y + cell / 2.0 + 5.0,
                COLOR_TEXT,
                count
            ));
        }
    }

    // Row (actual) and column (predicted) labels
    for (idx, name) in class_names.iter().enumerate().take(n) {
        let short: String = name.chars().take(14).collect();

        svg.push_str(&format!(
            r#"<text x="{}" y="{}" text-anchor="end" font-family="Arial, sans-serif" font-size="12" fill="{}">{}</text>"#,
            label_space - 8.0,
            label_space + idx as f64 * cell + cell / 2.0 + 4.0,
            COLOR_TEXT,
            escape_xml(&short)
        ));

        let cx = label_space + idx as f64 * cell + cell / 2.0;
        let cy = label_space - 8.0;
        svg.push_str(&format!(
            r#"<text x="{}" y="{}" text-anchor="start" font-family="Arial, sans-serif" font-size="12" fill="{}" transform="rotate(-45 {} {})">{}</text>"#,
            cx,
            cy,
            COLOR_TEXT,
            cx,
            cy,
            escape_xml(&short)
        ));
    }

    svg.push_str("</svg>");

    std::fs::write(output_path, svg)?;
    Ok(())
}

/// Render accuracy and loss curves from the training history
pub fn generate_history_charts(history: &TrainingHistory, output_dir: &Path) -> Result<()> {
    std::fs::create_dir_all(output_dir)?;

    let epochs = |value: fn(&crate::training::history::EpochRecord) -> f64| -> Vec<(f64, f64)> {
        history
            .records()
            .iter()
            .map(|r| ((r.epoch + 1) as f64, value(r)))
            .collect()
    };

    let accuracy_series = [
        DataSeries {
            name: "Train accuracy".to_string(),
            points: epochs(|r| r.train_accuracy * 100.0),
            color: COLOR_PRIMARY.to_string(),
        },
        DataSeries {
            name: "Val accuracy".to_string(),
            points: epochs(|r| r.val_accuracy * 100.0),
            color: COLOR_SECONDARY.to_string(),
        },
    ];
    generate_line_chart(
        "Accuracy per Epoch",
        "Epoch",
        "Accuracy (%)",
        &accuracy_series,
        &output_dir.join("accuracy.svg"),
    )?;

    let loss_series = [
        DataSeries {
            name: "Train loss".to_string(),
            points: epochs(|r| r.train_loss),
            color: COLOR_PRIMARY.to_string(),
        },
        DataSeries {
            name: "Val loss".to_string(),
            points: epochs(|r| r.val_loss),
            color: COLOR_SECONDARY.to_string(),
        },
    ];
    generate_line_chart(
        "Loss per Epoch",
        "Epoch",
        "Loss",
        &loss_series,
        &output_dir.join("loss.svg"),
    )?;

    Ok(())
}

fn escape_xml(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::training::history::EpochRecord;

    #[test]
    fn test_line_chart_is_written() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("chart.svg");

        let series = [DataSeries {
            name: "Val accuracy".to_string(),
            points: vec![(1.0, 50.0), (2.0, 75.0), (3.0, 90.0)],
            color: COLOR_PRIMARY.to_string(),
        }];

        generate_line_chart("Test", "Epoch", "Accuracy", &series, &path).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.starts_with("<svg"));
        assert!(content.contains("polyline"));
        assert!(content.contains("Val accuracy"));
    }

    #[test]
    fn test_confusion_heatmap_is_written() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("confusion.svg");

        let cm = ConfusionMatrix::from_predictions(&[0, 1, 1], &[0, 1, 0], 2);
        let names = vec!["bacterial".to_string(), "viral".to_string()];

        generate_confusion_heatmap("Confusion", &cm, &names, &path).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.starts_with("<svg"));
        assert!(content.contains("bacterial"));
    }

    #[test]
    fn test_history_charts_are_written() {
        let tmp = tempfile::TempDir::new().unwrap();

        let mut history = TrainingHistory::new();
        for epoch in 0..3 {
            history.push(EpochRecord {
                epoch,
                train_loss: 1.0 / (epoch + 1) as f64,
                train_accuracy: 0.5 + epoch as f64 * 0.1,
                val_loss: 1.2 / (epoch + 1) as f64,
                val_accuracy: 0.4 + epoch as f64 * 0.1,
                learning_rate: 0.01,
                skipped_samples: 0,
            });
        }

        generate_history_charts(&history, tmp.path()).unwrap();

        assert!(tmp.path().join("accuracy.svg").exists());
        assert!(tmp.path().join("loss.svg").exists());
    }

    #[test]
    fn test_escape_xml() {
        assert_eq!(escape_xml("a<b>&\"c\""), "a&lt;b&gt;&amp;&quot;c&quot;");
    }
}

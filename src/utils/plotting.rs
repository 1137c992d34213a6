use std::collections::BTreeSet;
use std::f64::consts::PI;
use std::path::{Path, PathBuf};
use anyhow::{anyhow, Result};
use plotters::prelude::*;
use plotters::style::text_anchor::{HPos, Pos, VPos};
use crate::config::defs::{
    COVERAGE_PLOT_SUFFIX, FEATURE_COLORS, MAX_LABEL_CHARS, MIN_LABELLED_FEATURE_BP, MIN_LABELLED_MATCH_LENGTH,
    MISMATCH_RATE_THRESHOLD,
};
use crate::utils::coverage::{read_coverage, CoveragePoint};
use crate::utils::file::{remove_stale_output, sample_output_path};
use crate::utils::genbank::{read_genbank, Feature, GenomeMap};

const COVERAGE_FILL: RGBColor = RGBColor(173, 216, 230);
const MAX_COVERAGE_BINS: usize = 3600;
const LABEL_STEP: f64 = PI / 36.0; // 5 degrees
const LABEL_STEPS: usize = 24;

/// A feature label with its preferred and chosen angle (radians, clockwise from top).
#[derive(Debug, Clone, PartialEq)]
pub struct PlacedLabel {
    pub text: String,
    pub feature_angle: f64,
    pub angle: f64,
    pub small: bool,
    pub crowded: bool,
}

fn angle_of(pos: f64, length: usize) -> f64 {
    2.0 * PI * pos / length as f64
}

fn polar(angle: f64, radius: f64) -> (f64, f64) {
    (radius * angle.sin(), radius * angle.cos())
}

/// Label for a feature: first non-empty of `label`, `gene`, `product`, `note`,
/// else `<type>_<start>`. Underscores become spaces and long labels are cut.
pub fn feature_label(feature: &Feature) -> String {
    let label = ["label", "gene", "product", "note"]
        .iter()
        .filter_map(|key| feature.qualifier(key))
        .map(str::trim)
        .find(|v| !v.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| format!("{}_{}", feature.kind, feature.start()));

    let clean = label.replace('_', " ");
    if clean.chars().count() > MAX_LABEL_CHARS {
        let cut: String = clean.chars().take(MAX_LABEL_CHARS - 3).collect();
        format!("{}...", cut)
    } else {
        clean
    }
}

fn is_labelled(feature: &Feature) -> bool {
    if feature.size() < MIN_LABELLED_FEATURE_BP {
        return false;
    }
    match feature.qualifier("match_length").map(|v| v.parse::<f64>()) {
        Some(Ok(match_length)) => match_length >= MIN_LABELLED_MATCH_LENGTH,
        _ => true,
    }
}

fn angular_distance(a: f64, b: f64) -> f64 {
    let d = (a - b).abs() % (2.0 * PI);
    d.min(2.0 * PI - d)
}

/// Places labels for drawable features, largest first, nudging each one in
/// 5 degree steps until it no longer overlaps an already placed label.
/// When no free slot exists the position with the least total overlap wins.
pub fn layout_labels(map: &GenomeMap) -> Vec<PlacedLabel> {
    let mut candidates: Vec<(&Feature, usize)> = map
        .features
        .iter()
        .filter(|f| FEATURE_COLORS.contains_key(f.kind.as_str()) && is_labelled(f))
        .map(|f| (f, f.size()))
        .collect();
    candidates.sort_by(|a, b| b.1.cmp(&a.1));

    let mut offsets = vec![0.0];
    for i in 1..=LABEL_STEPS {
        offsets.push(i as f64 * LABEL_STEP);
        offsets.push(-(i as f64) * LABEL_STEP);
    }

    let mut placed: Vec<(f64, f64)> = Vec::new();
    let mut labels = Vec::with_capacity(candidates.len());
    for (feature, size) in candidates {
        let text = feature_label(feature);
        let small = size as f64 <= map.length as f64 * 0.02;
        let char_width = if small { 0.012 } else { 0.015 };
        let width = text.chars().count() as f64 * char_width;
        let mid = angle_of(feature.midpoint(map.length), map.length);

        let mut best = mid;
        let mut min_overlap = f64::INFINITY;
        for offset in &offsets {
            let test = (mid + offset).rem_euclid(2.0 * PI);
            let overlap: f64 = placed
                .iter()
                .map(|(angle, w)| {
                    let required = (width + w) / 2.0 + 0.05;
                    (required - angular_distance(test, *angle)).max(0.0)
                })
                .sum();
            if overlap == 0.0 {
                best = test;
                min_overlap = 0.0;
                break;
            }
            if overlap < min_overlap {
                best = test;
                min_overlap = overlap;
            }
        }
        placed.push((best, width));
        labels.push(PlacedLabel {
            text,
            feature_angle: mid,
            angle: best,
            small,
            crowded: min_overlap > 0.0 && placed.len() > 8,
        });
    }
    labels
}

/// Averages coverage into at most `max_bins` angular bins as (angle, depth).
pub fn bin_coverage(points: &[CoveragePoint], length: usize, max_bins: usize) -> Vec<(f64, f64)> {
    let bins = max_bins.max(1).min(length.max(1));
    let mut sums = vec![(0.0f64, 0usize); bins];
    for p in points {
        let idx = (p.pos.saturating_sub(1).saturating_mul(bins) / length.max(1)).min(bins - 1);
        sums[idx].0 += p.total_reads;
        sums[idx].1 += 1;
    }
    sums.iter()
        .enumerate()
        .filter(|(_, (_, n))| *n > 0)
        .map(|(i, (sum, n))| (2.0 * PI * i as f64 / bins as f64, sum / *n as f64))
        .collect()
}

fn arc(start_angle: f64, end_angle: f64, radius: f64, steps: usize) -> Vec<(f64, f64)> {
    let steps = steps.max(10);
    (0..=steps)
        .map(|i| polar(start_angle + (end_angle - start_angle) * i as f64 / steps as f64, radius))
        .collect()
}

/// Draws a circular coverage map: coverage radially around the sequence,
/// the backbone with coloured feature arcs, labels and a legend.
///
/// # Arguments
///
/// * `sample_id` - Used in the title.
/// * `map` - Parsed genome map.
/// * `coverage` - Per-base coverage.
/// * `output_path` - PNG destination.
/// * `show_variants` - Draw red spokes where the mismatch rate exceeds 0.1.
pub fn plot_circular_coverage(
    sample_id: &str,
    map: &GenomeMap,
    coverage: &[CoveragePoint],
    output_path: &Path,
    show_variants: bool,
) -> Result<()> {
    if coverage.is_empty() {
        return Err(anyhow!("No coverage data available for plotting"));
    }
    if map.length == 0 {
        return Err(anyhow!("Genome map {} has zero length", map.name));
    }

    let max_cov = coverage.iter().map(|p| p.total_reads).fold(0.0, f64::max).max(1.0);
    let feature_radius = max_cov * 1.05;
    let label_radius = feature_radius * 1.25;
    let extent = label_radius * 1.3;

    let root = BitMapBackend::new(output_path, (1400, 1200)).into_drawing_area();
    root.fill(&WHITE)?;
    let (plot_area, legend_area) = root.split_horizontally(1120);

    let mut chart = ChartBuilder::on(&plot_area)
        .caption(format!("{} coverage", sample_id), ("sans-serif", 28))
        .margin(20)
        .build_cartesian_2d(-extent..extent, -extent..extent)?;

    // Coverage
    let binned = bin_coverage(coverage, map.length, MAX_COVERAGE_BINS);
    let outline: Vec<(f64, f64)> = binned.iter().map(|(a, d)| polar(*a, *d)).collect();
    let mut fill = vec![(0.0, 0.0)];
    fill.extend(outline.iter().copied());
    chart.draw_series(std::iter::once(Polygon::new(fill, COVERAGE_FILL.mix(0.4).filled())))?;
    chart.draw_series(std::iter::once(PathElement::new(outline, COVERAGE_FILL.mix(0.6).stroke_width(1))))?;

    if show_variants {
        let spokes = coverage
            .iter()
            .filter(|p| p.mismatch_rate().map(|r| r > MISMATCH_RATE_THRESHOLD).unwrap_or(false))
            .map(|p| {
                let angle = angle_of(p.pos as f64 - 1.0, map.length);
                PathElement::new(vec![(0.0, 0.0), polar(angle, p.total_reads)], RED.mix(0.7).stroke_width(2))
            });
        chart.draw_series(spokes)?;
    }

    // Backbone
    chart.draw_series(std::iter::once(PathElement::new(
        arc(0.0, 2.0 * PI, feature_radius, 1000),
        BLACK.stroke_width(3),
    )))?;

    let mut present: BTreeSet<&str> = BTreeSet::new();
    for feature in &map.features {
        let Some(color) = FEATURE_COLORS.get(feature.kind.as_str()) else {
            continue;
        };
        present.insert(feature.kind.as_str());
        for part in &feature.parts {
            let start = angle_of(part.start as f64, map.length);
            let end = angle_of(part.end as f64, map.length);
            chart.draw_series(std::iter::once(PathElement::new(
                arc(start, end, feature_radius, part.len() / 10),
                color.mix(0.9).stroke_width(12),
            )))?;
        }
    }

    // Labels
    for (i, label) in layout_labels(map).iter().enumerate() {
        let style = |size: u32| {
            ("sans-serif", size)
                .into_font()
                .color(&BLACK)
                .pos(Pos::new(HPos::Center, VPos::Center))
        };
        if label.small {
            let radius = feature_radius * 1.12;
            chart.draw_series(std::iter::once(Text::new(label.text.clone(), polar(label.angle, radius), style(12))))?;
        } else {
            let multiplier = match (label.crowded, i % 2) {
                (true, 0) => 1.1,
                (true, _) => 0.9,
                (false, _) => 1.0,
            };
            let radius = label_radius * multiplier;
            chart.draw_series(std::iter::once(PathElement::new(
                vec![polar(label.feature_angle, feature_radius * 1.02), polar(label.angle, radius * 0.88)],
                BLACK.mix(0.7).stroke_width(1),
            )))?;
            chart.draw_series(std::iter::once(Text::new(label.text.clone(), polar(label.angle, radius), style(16))))?;
        }
    }

    // Legend
    let mut y = 120;
    legend_area.draw(&Text::new("Features", (20, y), ("sans-serif", 20).into_font()))?;
    y += 35;
    for kind in &present {
        if let Some(color) = FEATURE_COLORS.get(*kind) {
            legend_area.draw(&Rectangle::new([(20, y), (44, y + 16)], color.filled()))?;
            legend_area.draw(&Text::new(kind.replace('_', " "), (54, y), ("sans-serif", 16).into_font()))?;
            y += 28;
        }
    }
    legend_area.draw(&Rectangle::new([(20, y), (44, y + 16)], COVERAGE_FILL.mix(0.4).filled()))?;
    legend_area.draw(&Text::new("Coverage", (54, y), ("sans-serif", 16).into_font()))?;
    if show_variants {
        y += 28;
        legend_area.draw(&Rectangle::new([(20, y), (44, y + 16)], RED.mix(0.7).filled()))?;
        legend_area.draw(&Text::new("Mismatch > 10%", (54, y), ("sans-serif", 16).into_font()))?;
    }

    root.present()?;
    Ok(())
}

/// Reads the genome map and coverage table for one sample and writes
/// `<out_dir>/<sample_id>_circular_coverage_plot.png`.
pub fn write_coverage_plot(
    sample_id: &str,
    genome_map: &Path,
    coverage_file: &Path,
    out_dir: &Path,
    show_variants: bool,
) -> Result<PathBuf> {
    let out_path = sample_output_path(out_dir, sample_id, COVERAGE_PLOT_SUFFIX);
    remove_stale_output(&out_path).map_err(|e| anyhow!("Cannot remove stale {}: {}", out_path.display(), e))?;

    let map = read_genbank(genome_map)?;
    let coverage = read_coverage(coverage_file)?;
    plot_circular_coverage(sample_id, &map, &coverage, &out_path, show_variants)?;
    Ok(out_path)
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::genbank::Span;

    fn feature(kind: &str, start: usize, end: usize, label: Option<&str>) -> Feature {
        Feature {
            kind: kind.to_string(),
            parts: vec![Span { start, end }],
            complement: false,
            qualifiers: label.map(|l| vec![("label".to_string(), l.to_string())]).unwrap_or_default(),
        }
    }

    #[test]
    fn test_feature_label() {
        assert_eq!(feature_label(&feature("gene", 10, 100, Some("amp_R"))), "amp R");
        assert_eq!(feature_label(&feature("CDS", 10, 100, None)), "CDS 10");
        let long = feature_label(&feature("gene", 0, 100, Some("abcdefghijklmnopqrstuvwxyz0123456789")));
        assert_eq!(long.chars().count(), MAX_LABEL_CHARS);
        assert!(long.ends_with("..."));
    }

    #[test]
    fn test_layout_skips_small_and_low_match() {
        let mut low_match = feature("CDS", 0, 500, Some("weak"));
        low_match.qualifiers.push(("match_length".to_string(), "12.5".to_string()));
        let map = GenomeMap {
            name: "p".into(),
            length: 5000,
            features: vec![
                feature("gene", 100, 1100, Some("big")),
                feature("promoter", 2000, 2030, Some("tiny")),
                feature("source", 0, 5000, Some("whole")),
                low_match,
            ],
        };
        let labels = layout_labels(&map);
        assert_eq!(labels.len(), 1);
        assert_eq!(labels[0].text, "big");
    }

    #[test]
    fn test_layout_separates_overlapping_labels() {
        let map = GenomeMap {
            name: "p".into(),
            length: 10_000,
            features: vec![
                feature("gene", 1000, 2000, Some("first gene label")),
                feature("CDS", 1100, 1900, Some("second label")),
            ],
        };
        let labels = layout_labels(&map);
        assert_eq!(labels.len(), 2);
        assert_eq!(labels[0].text, "first gene label");
        let distance = angular_distance(labels[0].angle, labels[1].angle);
        let widths = (16.0 * 0.015 + 12.0 * 0.015) / 2.0 + 0.05;
        assert!(distance >= widths - 1e-9, "labels too close: {}", distance);
    }

    #[test]
    fn test_bin_coverage() {
        let points: Vec<CoveragePoint> = (1..=100)
            .map(|pos| CoveragePoint { pos, total_reads: if pos <= 50 { 10.0 } else { 20.0 }, mismatches: None })
            .collect();
        let binned = bin_coverage(&points, 100, 2);
        assert_eq!(binned.len(), 2);
        assert_eq!(binned[0], (0.0, 10.0));
        assert!((binned[1].0 - PI).abs() < 1e-12);
        assert_eq!(binned[1].1, 20.0);
    }

    #[test]
    fn test_bin_coverage_far_position_goes_to_last_bin() {
        let points = vec![
            CoveragePoint { pos: 1, total_reads: 4.0, mismatches: None },
            CoveragePoint { pos: usize::MAX, total_reads: 8.0, mismatches: None },
        ];
        let binned = bin_coverage(&points, 100, 10);
        assert_eq!(binned.len(), 2);
        assert_eq!(binned[1].1, 8.0);
    }

    #[test]
    fn test_failed_plot_leaves_no_previous_image() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let stale = dir.path().join("S1_circular_coverage_plot.png");
        std::fs::write(&stale, b"old")?;
        let coverage = dir.path().join("per_base_data_S1.csv");
        std::fs::write(&coverage, "Position,TotalReads\n1,5\n")?;

        let result = write_coverage_plot("S1", &dir.path().join("missing.gbk"), &coverage, dir.path(), false);
        assert!(result.is_err());
        assert!(!stale.exists());
        Ok(())
    }
}

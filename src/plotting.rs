use plotters::prelude::*;
use std::fs::File;
use std::io::{BufRead, BufReader};

pub fn plot_regret_curve(
    dat_path: &str,
    output_path: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let data = read_dat_file(dat_path)?;
    if data.is_empty() {
        return Ok(());
    }

    let root = BitMapBackend::new(output_path, (1024, 768)).into_drawing_area();
    root.fill(&WHITE)?;

    let max_step = data.iter().map(|d| d.0).fold(0.0, f64::max);
    let max_regret = data.iter().map(|d| d.1 + d.2).fold(0.0, f64::max);
    let max_regret = if max_regret > 0.0 { max_regret * 1.1 } else { 1.0 };

    let mut chart = ChartBuilder::on(&root)
        .caption("UCRL2 on RiverSwim", ("sans-serif", 30).into_font())
        .margin(10)
        .x_label_area_size(40)
        .y_label_area_size(60)
        .build_cartesian_2d(0.0..max_step, 0.0..max_regret)?;

    chart
        .configure_mesh()
        .x_desc("Step")
        .y_desc("Cumulative Regret")
        .draw()?;

    chart
        .draw_series(LineSeries::new(
            data.iter().map(|d| (d.0, d.1)),
            ShapeStyle::from(&BLUE).stroke_width(2),
        ))?
        .label("mean over seeds")
        .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], &BLUE));

    // One standard deviation around the mean, drawn as thin envelopes.
    chart.draw_series(LineSeries::new(
        data.iter().map(|d| (d.0, d.1 + d.2)),
        ShapeStyle::from(&RED).stroke_width(1),
    ))?;
    chart
        .draw_series(LineSeries::new(
            data.iter().map(|d| (d.0, (d.1 - d.2).max(0.0))),
            ShapeStyle::from(&RED).stroke_width(1),
        ))?
        .label("one std dev")
        .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], &RED));

    chart
        .configure_series_labels()
        .background_style(&WHITE.mix(0.8))
        .border_style(&BLACK)
        .draw()?;

    root.present()?;
    Ok(())
}

pub fn plot_gain_comparison(
    dat_path: &str,
    output_path: &str,
    first_label: &str,
    second_label: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let data = read_dat_file(dat_path)?;
    if data.is_empty() {
        return Ok(());
    }

    let root = BitMapBackend::new(output_path, (1024, 768)).into_drawing_area();
    root.fill(&WHITE)?;

    let max_step = data.iter().map(|d| d.0).fold(0.0, f64::max);
    let max_gain = data
        .iter()
        .map(|d| d.1.max(d.2))
        .fold(0.0, f64::max)
        .max(1e-6)
        * 1.1;

    let mut chart = ChartBuilder::on(&root)
        .caption("Optimistic gain vs frozen policy", ("sans-serif", 30).into_font())
        .margin(10)
        .x_label_area_size(40)
        .y_label_area_size(60)
        .build_cartesian_2d(0.0..max_step, 0.0..max_gain)?;

    chart
        .configure_mesh()
        .x_desc("Step")
        .y_desc("Gain")
        .draw()?;

    chart
        .draw_series(LineSeries::new(
            data.iter().map(|d| (d.0, d.1)),
            ShapeStyle::from(&BLUE).stroke_width(2),
        ))?
        .label(first_label)
        .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], &BLUE));

    chart
        .draw_series(LineSeries::new(
            data.iter().map(|d| (d.0, d.2)),
            ShapeStyle::from(&GREEN).stroke_width(2),
        ))?
        .label(second_label)
        .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], &GREEN));

    chart
        .configure_series_labels()
        .background_style(&WHITE.mix(0.8))
        .border_style(&BLACK)
        .draw()?;

    root.present()?;
    Ok(())
}

fn read_dat_file(path: &str) -> Result<Vec<(f64, f64, f64)>, Box<dyn std::error::Error>> {
    let file = File::open(path)?;
    let reader = BufReader::new(file);
    let mut data = Vec::new();
    for line in reader.lines().skip(1) {
        let line = line?;
        if line.starts_with('#') || line.trim().is_empty() {
            continue;
        }
        let vals: Vec<f64> = line.split_whitespace().map(|s| s.parse().unwrap()).collect();
        if vals.len() >= 2 {
            let v3 = if vals.len() >= 3 { vals[2] } else { 0.0 };
            data.push((vals[0], vals[1], v3));
        }
    }
    Ok(data)
}

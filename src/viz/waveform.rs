//! Amplitude plot widget for ratatui

use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::Style,
    widgets::{Block, Widget},
};

/// A widget that plots recent amplitude values on a fixed y-range
pub struct Waveform<'a> {
    samples: &'a [f64],
    y_min: f64,
    y_max: f64,
    style: Style,
    block: Option<Block<'a>>,
}

impl<'a> Waveform<'a> {
    pub fn new(samples: &'a [f64]) -> Self {
        Self {
            samples,
            y_min: -1.0,
            y_max: 1.0,
            style: Style::default(),
            block: None,
        }
    }

    /// Fixed vertical range; values outside it are pinned to the edge
    pub fn range(mut self, y_min: f64, y_max: f64) -> Self {
        self.y_min = y_min;
        self.y_max = y_max;
        self
    }

    pub fn style(mut self, style: Style) -> Self {
        self.style = style;
        self
    }

    pub fn block(mut self, block: Block<'a>) -> Self {
        self.block = Some(block);
        self
    }

    /// Row offset from the top of `height` rows for `value`
    fn row_for(&self, value: f64, height: usize) -> usize {
        let span = self.y_max - self.y_min;
        let frac = if span > 0.0 {
            ((value - self.y_min) / span).clamp(0.0, 1.0)
        } else {
            0.5
        };
        let frac = if frac.is_nan() { 0.5 } else { frac };
        let from_bottom = (frac * (height - 1) as f64).round() as usize;
        height - 1 - from_bottom
    }

    /// Render the plot in the given area
    fn render_plot(&self, area: Rect, buf: &mut Buffer) {
        if area.width == 0 || area.height == 0 || self.samples.is_empty() {
            return;
        }

        let width = area.width as usize;
        let height = area.height as usize;

        // Zero line, when it is on screen
        if self.y_min < 0.0 && self.y_max > 0.0 {
            let zero_y = area.y + self.row_for(0.0, height) as u16;
            for x in area.x..area.x + area.width {
                buf.set_string(x, zero_y, "─", Style::default());
            }
        }

        // Average samples into one column each; newest on the right
        let samples_per_col = self.samples.len() as f64 / width as f64;
        let columns = width.min(self.samples.len());
        let first_col = width - columns;

        for col in 0..columns {
            let (start_idx, end_idx) = if samples_per_col >= 1.0 {
                let start = (col as f64 * samples_per_col) as usize;
                let end = (((col + 1) as f64 * samples_per_col) as usize).min(self.samples.len());
                (start, end.max(start + 1))
            } else {
                (col, col + 1)
            };

            let slice = &self.samples[start_idx..end_idx];
            let avg = slice.iter().sum::<f64>() / slice.len() as f64;

            let screen_x = area.x + (first_col + col) as u16;
            let screen_y = area.y + self.row_for(avg, height) as u16;
            buf.set_string(screen_x, screen_y, "•", self.style);
        }
    }
}

impl Widget for Waveform<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let inner_area = match &self.block {
            Some(block) => {
                let inner = block.inner(area);
                block.clone().render(area, buf);
                inner
            }
            None => area,
        };

        self.render_plot(inner_area, buf);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_waveform_empty() {
        let waveform = Waveform::new(&[]);
        let area = Rect::new(0, 0, 10, 5);
        let mut buf = Buffer::empty(area);
        waveform.render(area, &mut buf);
        // Should not panic
    }

    #[test]
    fn test_row_mapping() {
        let waveform = Waveform::new(&[]).range(-2.0, 2.0);
        assert_eq!(waveform.row_for(2.0, 5), 0);
        assert_eq!(waveform.row_for(0.0, 5), 2);
        assert_eq!(waveform.row_for(-2.0, 5), 4);
        // Out of range values pin to the edges
        assert_eq!(waveform.row_for(9.0, 5), 0);
        assert_eq!(waveform.row_for(-9.0, 5), 4);
    }

    #[test]
    fn test_plots_extremes() {
        let samples = vec![1.0, -1.0];
        let waveform = Waveform::new(&samples).range(-1.0, 1.0);
        let area = Rect::new(0, 0, 2, 3);
        let mut buf = Buffer::empty(area);
        waveform.render(area, &mut buf);

        assert_eq!(buf[(0, 0)].symbol(), "•");
        assert_eq!(buf[(1, 2)].symbol(), "•");
        assert_eq!(buf[(0, 1)].symbol(), "─");
    }

    #[test]
    fn test_many_samples_fit_width() {
        let samples: Vec<f64> = (0..1000).map(|i| (i as f64 * 0.01).sin()).collect();
        let waveform = Waveform::new(&samples)
            .block(ratatui::widgets::Block::default().title("Test"));
        let area = Rect::new(0, 0, 20, 10);
        let mut buf = Buffer::empty(area);
        waveform.render(area, &mut buf);
        // Should render without panic
    }

    #[test]
    fn test_waveform_style() {
        use ratatui::style::Color;
        let samples = vec![0.5; 5];
        let waveform = Waveform::new(&samples)
            .style(Style::default().fg(Color::Red));
        assert_eq!(waveform.style.fg, Some(Color::Red));
    }
}

//! Copyright footer rendered at the bottom of the chat layout.

use chrono::Datelike;
use ratatui::buffer::Buffer;
use ratatui::layout::Rect;
use ratatui::widgets::{Paragraph, Widget};

/// One centered line: `© {year}. All rights reserved.`
///
/// Stateless and infallible; the year is captured at construction so
/// rendering stays deterministic within a frame (and under test).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Footer {
    year: i32,
}

impl Footer {
    /// Footer for the current calendar year.
    #[must_use]
    pub fn new() -> Self {
        Self::with_year(chrono::Local::now().year())
    }

    /// Footer for a fixed year.
    #[must_use]
    pub const fn with_year(year: i32) -> Self {
        Self { year }
    }

    #[must_use]
    pub fn text(&self) -> String {
        format!("© {}. All rights reserved.", self.year)
    }
}

impl Default for Footer {
    fn default() -> Self {
        Self::new()
    }
}

impl Widget for &Footer {
    fn render(self, area: Rect, buf: &mut Buffer) {
        Paragraph::new(self.text()).centered().render(area, buf);
    }
}

#[cfg(test)]
mod tests {
    use super::Footer;
    use ratatui::Terminal;
    use ratatui::backend::TestBackend;

    fn render_rows(footer: &Footer, width: u16, height: u16) -> Vec<String> {
        let mut terminal = Terminal::new(TestBackend::new(width, height)).unwrap();
        terminal
            .draw(|frame| frame.render_widget(footer, frame.area()))
            .unwrap();

        let buffer = terminal.backend().buffer();
        let area = buffer.area;
        (0..area.height)
            .map(|y| {
                (0..area.width)
                    .map(|x| buffer[(x, y)].symbol())
                    .collect::<String>()
            })
            .collect()
    }

    #[test]
    fn renders_2024() {
        let rows = render_rows(&Footer::with_year(2024), 40, 1);
        assert!(rows[0].contains("© 2024. All rights reserved."));
    }

    #[test]
    fn renders_2030() {
        let rows = render_rows(&Footer::with_year(2030), 40, 1);
        assert!(rows[0].contains("© 2030. All rights reserved."));
    }

    #[test]
    fn deterministic_for_fixed_year() {
        let footer = Footer::with_year(2026);
        assert_eq!(footer.text(), "© 2026. All rights reserved.");
        assert_eq!(
            render_rows(&footer, 40, 1),
            render_rows(&footer, 40, 1)
        );
    }

    #[test]
    fn single_line_in_container() {
        // Rendered into a taller area, only one row carries text.
        let rows = render_rows(&Footer::with_year(2024), 40, 3);
        let non_empty: Vec<&String> = rows
            .iter()
            .filter(|row| !row.trim().is_empty())
            .collect();
        assert_eq!(non_empty.len(), 1);
        assert_eq!(non_empty[0].trim(), "© 2024. All rights reserved.");
    }

    #[test]
    fn line_is_centered() {
        let rows = render_rows(&Footer::with_year(2024), 40, 1);
        let row = &rows[0];
        let leading = row.len() - row.trim_start().len();
        let trailing = row.trim_end().len();
        let right_pad = row.len() - trailing;
        assert!(leading > 0);
        assert!(leading.abs_diff(right_pad) <= 1);
    }

    #[test]
    fn current_year_constructor_matches_clock() {
        use chrono::Datelike;
        let year = chrono::Local::now().year();
        assert_eq!(Footer::new().text(), format!("© {year}. All rights reserved."));
    }
}
